use std::fs;
use std::time::{Duration, Instant};

use tracing::debug;
use usartkit_channel::Channel;
use usartkit_line::LineDriver;

use crate::cmd::{channel_config, open_channel, parse_duration, SendArgs};
use crate::exit::{
    channel_error, io_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS, TIMEOUT,
};
use crate::output::{print_received, OutputFormat, Received};

const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let config = channel_config(&args.line)?;
    let terminator = config.terminator;
    let payload = resolve_payload(&args, terminator)?;
    let mut reply = vec![0u8; config.max_message_size];

    let mut channel = open_channel(&args.path, &args.line, config)?;
    // Resume before transmitting so an early reply is already buffered.
    channel
        .resume()
        .map_err(|err| channel_error("resume failed", err))?;
    channel
        .put_all(&payload)
        .map_err(|err| channel_error("send failed", err))?;
    debug!(port = %channel.port(), bytes = payload.len(), "message sent");

    if args.wait {
        let n = wait_for_reply(&mut channel, &mut reply, wait_timeout)?;
        let received = Received {
            port: channel.port(),
            data: &reply[..n],
            terminator: Some(terminator),
        };
        print_received(&received, format);
    }

    channel
        .suspend()
        .map_err(|err| channel_error("suspend failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs, terminator: u8) -> CliResult<Vec<u8>> {
    let mut payload = if let Some(data) = &args.data {
        data.as_bytes().to_vec()
    } else if let Some(path) = &args.file {
        fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?
    } else {
        Vec::new()
    };

    if !args.no_terminator {
        if payload.contains(&terminator) {
            return Err(CliError::new(
                DATA_INVALID,
                format!(
                    "payload contains the terminator byte 0x{terminator:02x}; \
                     use --no-terminator to send it verbatim"
                ),
            ));
        }
        payload.push(terminator);
    }
    Ok(payload)
}

fn wait_for_reply<L: LineDriver>(
    channel: &mut Channel<L>,
    buf: &mut [u8],
    timeout: Duration,
) -> CliResult<usize> {
    let deadline = Instant::now() + timeout;
    loop {
        let open = channel.line().is_open();
        let n = channel
            .get_message(buf)
            .map_err(|err| channel_error("receive failed", err))?;
        if n > 0 {
            return Ok(n);
        }
        if !open {
            return Err(CliError::new(FAILURE, "line closed before a reply arrived"));
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("no reply within {timeout:?}"),
            ));
        }
        std::thread::sleep(REPLY_POLL_INTERVAL);
    }
}
