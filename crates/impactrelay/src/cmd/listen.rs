use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use impactrelay_relay::RelayStreamDecoder;
use impactrelay_transport::{read_available, SerialLink};
use tracing::{debug, info};

use crate::cmd::ListenArgs;
use crate::exit::{io_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut decoder = RelayStreamDecoder::new();
    let mut printed = 0usize;

    if let Some(path) = &args.file {
        let capture =
            fs::read(path).map_err(|err| io_error(&format!("cannot read {}", path.display()), err))?;
        decoder.push(&capture);
        print_until_limit(&mut decoder, &mut printed, args.count, format);
        debug!(leftover = decoder.buffered_len(), "capture decoded");
        return Ok(SUCCESS);
    }

    let mut link = SerialLink::open(&args.port, args.baud)
        .map_err(|err| transport_error("relay port open failed", err))?;
    info!(port = %args.port, baud = args.baud, "listening on relay link");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    while running.load(Ordering::SeqCst) {
        let bytes =
            read_available(&mut link).map_err(|err| transport_error("relay read failed", err))?;
        if bytes.is_empty() {
            std::thread::sleep(POLL_INTERVAL);
            continue;
        }

        decoder.push(&bytes);
        if print_until_limit(&mut decoder, &mut printed, args.count, format) {
            break;
        }
    }

    Ok(SUCCESS)
}

/// Print decoded messages; returns true once `limit` messages were printed.
fn print_until_limit(
    decoder: &mut RelayStreamDecoder,
    printed: &mut usize,
    limit: Option<usize>,
    format: OutputFormat,
) -> bool {
    while let Some(message) = decoder.next_message() {
        print_message(&message, format);
        *printed = printed.saturating_add(1);
        if limit.is_some_and(|limit| *printed >= limit) {
            return true;
        }
    }
    false
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
