use chrono::{DateTime, Local};
use impactrelay_detect::{peak_abs, remove_baseline, segment, Validator};
use impactrelay_frame::{decode_payload, ByteFrame};
use impactrelay_relay::{build_relay_frame, format_timestamp, RelayConfig, RelayFrame, StatusLine};
use tracing::{debug, info, warn};

use crate::config::AcquisitionConfig;
use crate::error::Result;
use crate::state::{PacketInfo, PeakRecord, SessionState};

/// What to send on the relay link for one accepted event.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    /// `None` when the excerpt could not be built; the status line still goes out.
    pub frame: Option<RelayFrame>,
    pub status: StatusLine,
}

/// Result of running one packet through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketOutcome {
    pub info: PacketInfo,
    /// Threshold the packet was segmented with.
    pub threshold: i64,
    /// Windows found by the segmenter.
    pub detected: usize,
    /// Windows that failed validation.
    pub rejected: usize,
    /// Accepted events, already appended to the session log.
    pub accepted: Vec<PeakRecord>,
    pub transmissions: Vec<Transmission>,
}

/// Decode, segment, validate and package one packet.
#[derive(Debug, Clone)]
pub struct PacketProcessor {
    validator: Validator,
    relay: RelayConfig,
    min_gap: usize,
}

impl PacketProcessor {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            validator: Validator::new(config.validator),
            relay: config.relay,
            min_gap: config.min_gap,
        }
    }

    /// Run `frame` through the pipeline, recording it in `state`.
    ///
    /// Packets that fail to decode consume no sequence number and leave
    /// `state` untouched.
    pub fn process(
        &self,
        frame: &ByteFrame,
        state: &mut SessionState,
        timestamp: DateTime<Local>,
    ) -> Result<PacketOutcome> {
        let samples = decode_payload(frame.as_bytes())?;
        let centered = remove_baseline(&samples);

        let seq = state.next_seq();
        let info = state.record_packet(seq, timestamp, frame.len(), samples);
        let threshold = state.threshold();
        let time_label = format_timestamp(&timestamp);

        let windows = segment(&centered, threshold, self.min_gap);
        debug!(
            seq,
            bytes = frame.len(),
            samples = centered.len(),
            windows = windows.len(),
            "packet decoded"
        );
        if !windows.is_empty() {
            info!(seq, events = windows.len(), threshold, "detected events");
        }

        let total = windows.len();
        let mut outcome = PacketOutcome {
            info,
            threshold,
            detected: total,
            rejected: 0,
            accepted: Vec::new(),
            transmissions: Vec::new(),
        };

        for (i, window) in windows.into_iter().enumerate() {
            let event_index = i + 1;
            if let Err(rejection) = self.validator.check_event(&centered, window) {
                warn!(seq, event = event_index, %rejection, "event skipped");
                outcome.rejected += 1;
                continue;
            }

            let peak = peak_abs(window.slice(&centered));
            let record = PeakRecord {
                timestamp,
                seq,
                event_index,
                event_total: total,
                start: window.start,
                end: window.end,
                peak,
                duration: window.len(),
            };
            info!(
                seq,
                event = event_index,
                start = window.start,
                end = window.end,
                peak,
                "event accepted"
            );

            let relay_frame = match build_relay_frame(
                seq,
                &centered,
                window,
                self.relay.compression,
                self.relay.context,
            ) {
                Ok(relay_frame) => Some(relay_frame),
                Err(err) => {
                    warn!(seq, event = event_index, %err, "relay frame not built");
                    None
                }
            };

            outcome.transmissions.push(Transmission {
                frame: relay_frame,
                status: StatusLine::new(time_label.clone(), seq, event_index, total, peak),
            });
            state.events_mut().push(record.clone());
            outcome.accepted.push(record);
        }

        Ok(outcome)
    }
}
