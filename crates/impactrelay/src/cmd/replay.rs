use std::fs;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use impactrelay_acquire::{AcquisitionConfig, AcquisitionLoop};
use impactrelay_relay::{RelayConfig, RelayLink};
use impactrelay_transport::MemoryLink;
use tracing::info;

use crate::cmd::ReplayArgs;
use crate::exit::{io_error, relay_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_event, print_session, OutputFormat};

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk == 0 {
        return Err(CliError::new(USAGE, "--chunk must be at least 1"));
    }

    let capture = fs::read(&args.file)
        .map_err(|err| io_error(&format!("cannot read {}", args.file.display()), err))?;

    let config = AcquisitionConfig {
        threshold: args.detect.threshold,
        min_gap: args.detect.min_gap,
        relay: RelayConfig {
            pre_send_delay: Duration::ZERO,
            ..RelayConfig::default()
        },
        ..AcquisitionConfig::default()
    };

    let relay_sink = MemoryLink::new();
    let relay = match args.relay_out {
        Some(_) => Some(Arc::new(
            RelayLink::with_config(Box::new(relay_sink.clone()), config.relay)
                .map_err(|err| relay_error("relay sink setup failed", err))?,
        )),
        None => None,
    };

    let mut acquisition = AcquisitionLoop::new(MemoryLink::new(), relay, config);
    for chunk in capture.chunks(args.chunk) {
        for outcome in acquisition.process_bytes(chunk) {
            for record in &outcome.accepted {
                print_event(record, format);
            }
        }
    }

    let summary = acquisition.summary();
    info!(
        bytes = capture.len(),
        packets = summary.total_packets,
        "replay finished"
    );
    {
        let state = acquisition.state();
        let state = state.lock().unwrap_or_else(PoisonError::into_inner);
        print_session(&summary, state.events().last(args.detect.last), format);
    }

    if let Some(path) = &args.relay_out {
        fs::write(path, relay_sink.take_written())
            .map_err(|err| io_error(&format!("cannot write {}", path.display()), err))?;
    }

    if summary.total_packets == 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("no packets decoded from {}", args.file.display()),
        ));
    }
    Ok(SUCCESS)
}
