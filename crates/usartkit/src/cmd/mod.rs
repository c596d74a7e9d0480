use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use usartkit_channel::{Channel, ChannelConfig};
use usartkit_line::{FrameFormat, LineDriver, PortId};

use crate::exit::{channel_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod baud;
pub mod monitor;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Receive from a line and print each message.
    Monitor(MonitorArgs),
    /// Transmit one message.
    Send(SendArgs),
    /// Show the baud divisor table or check one combination.
    Baud(BaudArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Baud(args) => baud::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LineKind {
    /// Serial device (termios).
    Tty,
    /// Unix domain socket peer.
    Uds,
}

/// Line and channel options shared by `monitor` and `send`.
#[derive(Args, Debug)]
pub struct LineArgs {
    /// What PATH refers to.
    #[arg(long = "line", value_enum, default_value = "tty")]
    pub kind: LineKind,
    /// Port number reported in logs and output.
    #[arg(long, default_value = "0")]
    pub port: u8,
    /// Channel configuration file (JSON). Flags override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Line speed.
    #[arg(long)]
    pub baud: Option<u32>,
    /// CPU clock feeding the baud generator, in Hz.
    #[arg(long)]
    pub clock: Option<u32>,
    /// Character frame format (e.g. 8N1, 7E2).
    #[arg(long, value_name = "FORMAT")]
    pub frame: Option<FrameFormat>,
    /// Message terminator: a character, an escape (\n, \r, \0) or a number (10, 0x0a).
    #[arg(long, value_parser = parse_terminator)]
    pub terminator: Option<u8>,
    /// Receive buffer size in bytes.
    #[arg(long)]
    pub capacity: Option<usize>,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Serial device or socket path.
    pub path: PathBuf,
    #[command(flatten)]
    pub line: LineArgs,
    /// Exit after printing N messages (or blocks with --unframed).
    #[arg(long)]
    pub count: Option<usize>,
    /// Print raw blocks as they arrive instead of whole messages.
    #[arg(long)]
    pub unframed: bool,
    /// How long to sleep when nothing is buffered (e.g. 10ms).
    #[arg(long, default_value = "10ms")]
    pub poll_interval: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Serial device or socket path.
    pub path: PathBuf,
    #[command(flatten)]
    pub line: LineArgs,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Do not append the terminator.
    #[arg(long)]
    pub no_terminator: bool,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct BaudArgs {
    /// CPU clock in Hz. Checks a single combination when given.
    #[arg(long)]
    pub clock: Option<u32>,
    /// Line speed. Checks a single combination when given.
    #[arg(long)]
    pub baud: Option<u32>,
    /// Check the normal-speed divisor instead of double speed (U2X).
    #[arg(long)]
    pub normal_speed: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Resolve the channel configuration: file (or defaults), then flags.
pub fn channel_config(args: &LineArgs) -> CliResult<ChannelConfig> {
    let mut config = match &args.config {
        Some(path) => ChannelConfig::from_json_file(path).map_err(|err| {
            channel_error(&format!("failed loading {}", path.display()), err)
        })?,
        None => ChannelConfig::default(),
    };

    if let Some(baud) = args.baud {
        config.line.baud = baud;
    }
    if let Some(clock) = args.clock {
        config.line.clock_hz = clock;
    }
    if let Some(frame) = args.frame {
        config.line.format = frame;
    }
    if let Some(terminator) = args.terminator {
        config.terminator = terminator;
    }
    if let Some(capacity) = args.capacity {
        config.capacity = capacity;
        config.max_message_size = capacity;
    }

    config
        .validate()
        .map_err(|err| channel_error("invalid configuration", err))?;
    Ok(config)
}

/// Open the line at `path` and wrap it in a suspended channel.
pub fn open_channel(
    path: &Path,
    args: &LineArgs,
    config: ChannelConfig,
) -> CliResult<Channel<Box<dyn LineDriver>>> {
    let line = open_line(path, args.kind, PortId(args.port))?;
    Channel::new(line, config).map_err(|err| channel_error("channel setup failed", err))
}

#[cfg(unix)]
fn open_line(path: &Path, kind: LineKind, port: PortId) -> CliResult<Box<dyn LineDriver>> {
    use usartkit_line::{StreamLine, TtyPort, UdsLine};

    use crate::exit::line_error;

    let line: Box<dyn LineDriver> = match kind {
        LineKind::Tty => Box::new(
            StreamLine::<TtyPort>::open_tty(port, path)
                .map_err(|err| line_error("open failed", err))?,
        ),
        LineKind::Uds => Box::new(
            UdsLine::connect_uds(port, path).map_err(|err| line_error("connect failed", err))?,
        ),
    };
    Ok(line)
}

#[cfg(not(unix))]
fn open_line(path: &Path, kind: LineKind, port: PortId) -> CliResult<Box<dyn LineDriver>> {
    let _ = (kind, port);
    Err(CliError::new(
        USAGE,
        format!("{}: hosted lines require a Unix platform", path.display()),
    ))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

fn parse_terminator(input: &str) -> Result<u8, String> {
    match input {
        "\\n" => return Ok(b'\n'),
        "\\r" => return Ok(b'\r'),
        "\\0" => return Ok(0),
        _ => {}
    }
    if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        return u8::from_str_radix(hex, 16).map_err(|err| format!("invalid hex byte: {err}"));
    }
    if input.len() > 1 && input.bytes().all(|b| b.is_ascii_digit()) {
        return input
            .parse::<u8>()
            .map_err(|err| format!("invalid byte value: {err}"));
    }
    match input.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(format!("terminator must be a single byte, got {input:?}")),
    }
}
