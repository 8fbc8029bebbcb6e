use std::time::{Duration, Instant};

use impactrelay_relay::{RelayMessage, RelayStreamDecoder, RelayWriter, ThresholdCommand};
use impactrelay_transport::{read_available, SerialLink};
use tracing::{debug, info};

use crate::cmd::{parse_duration, SetThresholdArgs};
use crate::exit::{relay_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SetThresholdArgs, format: OutputFormat) -> CliResult<i32> {
    let command = ThresholdCommand::from_multiplier(args.multiplier).ok_or_else(|| {
        CliError::new(USAGE, format!("multiplier out of range: {}", args.multiplier))
    })?;
    let wait = args.wait.as_deref().map(parse_duration).transpose()?;

    let link = SerialLink::open(&args.port, args.baud)
        .map_err(|err| transport_error("relay port open failed", err))?;
    let mut writer = RelayWriter::new(link);
    writer
        .send_raw(command.encode().as_bytes())
        .map_err(|err| relay_error("send failed", err))?;
    info!(%command, threshold = command.threshold(), "threshold command sent");

    let Some(wait) = wait else {
        return Ok(SUCCESS);
    };

    let deadline = Instant::now() + wait;
    let mut decoder = RelayStreamDecoder::new();
    while Instant::now() < deadline {
        let bytes = read_available(writer.get_mut())
            .map_err(|err| transport_error("relay read failed", err))?;
        if bytes.is_empty() {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        }
        decoder.push(&bytes);
        while let Some(message) = decoder.next_message() {
            if let RelayMessage::Threshold(threshold) = &message {
                if *threshold != command.threshold() {
                    debug!(
                        expected = command.threshold(),
                        threshold, "acknowledged a different threshold"
                    );
                }
                print_message(&message, format);
                return Ok(SUCCESS);
            }
        }
    }

    Err(CliError::new(
        TIMEOUT,
        format!("no THRESHOLD= acknowledgement within {wait:?}"),
    ))
}
