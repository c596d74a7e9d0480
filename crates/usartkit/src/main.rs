mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "usartkit", version, about = "USART channel CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::LineKind;

    #[test]
    fn parses_monitor_subcommand() {
        let cli = Cli::try_parse_from([
            "usartkit",
            "monitor",
            "/dev/ttyUSB0",
            "--baud",
            "115200",
            "--frame",
            "8E1",
            "--count",
            "3",
        ])
        .expect("monitor args should parse");

        match cli.command {
            Command::Monitor(args) => {
                assert_eq!(args.line.kind, LineKind::Tty);
                assert_eq!(args.line.baud, Some(115_200));
                assert_eq!(args.count, Some(3));
                assert!(!args.unframed);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_send_over_socket() {
        let cli = Cli::try_parse_from([
            "usartkit",
            "send",
            "/tmp/test.sock",
            "--line",
            "uds",
            "--data",
            "hello",
            "--terminator",
            "\\r",
            "--wait",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.line.kind, LineKind::Uds);
                assert_eq!(args.line.terminator, Some(b'\r'));
                assert!(args.wait);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "usartkit",
            "send",
            "/tmp/test.sock",
            "--file",
            "payload.bin",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_malformed_frame_format() {
        let err = Cli::try_parse_from(["usartkit", "monitor", "/dev/ttyS0", "--frame", "9X1"])
            .expect_err("bad frame format should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_baud_subcommand() {
        let cli = Cli::try_parse_from(["usartkit", "baud", "--clock", "8000000", "--normal-speed"])
            .expect("baud args should parse");
        assert!(matches!(cli.command, Command::Baud(_)));
    }
}
