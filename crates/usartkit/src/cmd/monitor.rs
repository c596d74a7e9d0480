use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cmd::{channel_config, open_channel, parse_duration, MonitorArgs};
use crate::exit::{channel_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_received, OutputFormat, Received};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let poll_interval = parse_duration(&args.poll_interval)?;
    let config = channel_config(&args.line)?;
    let terminator = config.terminator;
    let window = if args.unframed {
        config.capacity
    } else {
        config.max_message_size
    };
    let mut buf = vec![0u8; window];

    let mut channel = open_channel(&args.path, &args.line, config)?;
    channel
        .resume()
        .map_err(|err| channel_error("resume failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        // Sample before draining: once the line reports closed, every byte
        // it delivered is already buffered.
        let open = channel.line().is_open();
        let n = if args.unframed {
            channel.get(&mut buf)
        } else {
            channel.get_message(&mut buf)
        }
        .map_err(|err| channel_error("receive failed", err))?;

        if n == 0 {
            if !open {
                info!(port = %channel.port(), "line closed");
                break;
            }
            std::thread::sleep(poll_interval);
            continue;
        }

        let received = Received {
            port: channel.port(),
            data: &buf[..n],
            terminator: (!args.unframed).then_some(terminator),
        };
        print_received(&received, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    let leftover = channel.buffered();
    if leftover > 0 {
        debug!(port = %channel.port(), leftover, "discarding incomplete message");
    }
    let stats = channel.stats();
    channel
        .suspend()
        .map_err(|err| channel_error("suspend failed", err))?;
    info!(
        port = %channel.port(),
        printed,
        received = stats.received,
        dropped = stats.dropped,
        "monitor stopped"
    );

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
