use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use impactrelay_acquire::{AcquisitionConfig, AcquisitionLoop};
use impactrelay_relay::{RelayConfig, RelayLink};
use impactrelay_transport::SerialLink;
use tracing::{info, warn};

use crate::cmd::{parse_duration, RunArgs};
use crate::exit::{acquire_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_session, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = AcquisitionConfig {
        threshold: args.detect.threshold,
        min_gap: args.detect.min_gap,
        idle_sleep: parse_duration(&args.idle_sleep)?,
        relay: RelayConfig {
            pre_send_delay: parse_duration(&args.relay_delay)?,
            ..RelayConfig::default()
        },
        ..AcquisitionConfig::default()
    };

    let link = SerialLink::open(&args.port, args.baud)
        .map_err(|err| transport_error("acquisition port open failed", err))?;
    if let Err(err) = link.clear_buffers() {
        warn!(port = %args.port, %err, "could not discard stale acquisition bytes");
    }
    let relay = if args.no_relay {
        None
    } else {
        open_relay(&args.relay_port, args.relay_baud, config.relay)
    };

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(Arc::clone(&stop))?;

    let mut acquisition = AcquisitionLoop::new(link, relay, config);
    let state = acquisition.state();
    let result = acquisition.run(&stop);

    let summary = acquisition.summary();
    {
        let state = state.lock().unwrap_or_else(PoisonError::into_inner);
        print_session(&summary, state.events().last(args.detect.last), format);
    }

    result.map_err(|err| acquire_error("acquisition failed", err))?;
    Ok(SUCCESS)
}

/// Open the relay link; acquisition runs without it when that fails.
fn open_relay(port: &str, baud: u32, config: RelayConfig) -> Option<Arc<RelayLink>> {
    let link = match SerialLink::open(port, baud) {
        Ok(link) => link,
        Err(err) => {
            warn!(port, %err, "relay port unavailable, running without relay");
            return None;
        }
    };
    match RelayLink::with_config(Box::new(link), config) {
        Ok(relay) => {
            info!(relay = relay.name(), "relaying accepted events");
            Some(Arc::new(relay))
        }
        Err(err) => {
            warn!(port, %err, "relay link setup failed, running without relay");
            None
        }
    }
}

fn install_ctrlc_handler(stop: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        info!("interrupt received, stopping acquisition");
        stop.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
