use std::fmt;
use std::str::FromStr;

use chrono::Timelike;

/// Peaks are reported as a fraction of full scale, 2^31.
pub const LOUDNESS_SCALE: f64 = 2_147_483_648.0;

/// Prefix of the acknowledgement sent after a threshold change.
pub const THRESHOLD_ACK_PREFIX: &str = "THRESHOLD=";

/// Terminator for every text line on the relay link.
pub const LINE_END: &str = "\r\n";

/// Format a wall-clock time as `HH:MM:SS.ffff` (tenths of a millisecond).
pub fn format_timestamp<T: Timelike>(time: &T) -> String {
    let fraction = (time.nanosecond() / 100_000).min(9999);
    format!(
        "{:02}:{:02}:{:02}.{:04}",
        time.hour(),
        time.minute(),
        time.second(),
        fraction
    )
}

/// Peak magnitude as a fraction of full scale.
pub fn loudness(peak: u64) -> f64 {
    peak as f64 / LOUDNESS_SCALE
}

/// Human-readable summary of one transmitted event.
///
/// Renders as `HH:MM:SS.ffff | Pack #<seq> | Event <i>/<n> | Loud=<x.xxxx>`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub timestamp: String,
    pub seq: u32,
    /// 1-based position of the event within its packet.
    pub event_index: usize,
    pub event_total: usize,
    pub loudness: f64,
}

impl StatusLine {
    pub fn new(timestamp: String, seq: u32, event_index: usize, event_total: usize, peak: u64) -> Self {
        Self {
            timestamp,
            seq,
            event_index,
            event_total,
            loudness: loudness(peak),
        }
    }

    /// The line as sent on the wire, CRLF included.
    pub fn render(&self) -> String {
        format!("{self}{LINE_END}")
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | Pack #{} | Event {}/{} | Loud={:.4}",
            self.timestamp, self.seq, self.event_index, self.event_total, self.loudness
        )
    }
}

/// Error returned when a line is not a status line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a status line: {0:?}")]
pub struct ParseStatusError(pub String);

impl FromStr for StatusLine {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseStatusError(s.to_string());
        let mut fields = s.trim().split(" | ");

        let timestamp = fields.next().ok_or_else(err)?.to_string();
        let seq = fields
            .next()
            .and_then(|f| f.strip_prefix("Pack #"))
            .and_then(|f| f.parse().ok())
            .ok_or_else(err)?;
        let (event_index, event_total) = fields
            .next()
            .and_then(|f| f.strip_prefix("Event "))
            .and_then(|f| f.split_once('/'))
            .and_then(|(i, n)| Some((i.parse().ok()?, n.parse().ok()?)))
            .ok_or_else(err)?;
        let loudness = fields
            .next()
            .and_then(|f| f.strip_prefix("Loud="))
            .and_then(|f| f.parse().ok())
            .ok_or_else(err)?;
        if fields.next().is_some() {
            return Err(err());
        }

        Ok(Self {
            timestamp,
            seq,
            event_index,
            event_total,
            loudness,
        })
    }
}

/// Acknowledgement line for an applied threshold, CRLF included.
pub fn threshold_ack_line(threshold: i64) -> String {
    format!("{THRESHOLD_ACK_PREFIX}{threshold}{LINE_END}")
}

/// Parse a `THRESHOLD=<n>` acknowledgement (without terminator).
pub fn parse_threshold_ack(line: &str) -> Option<i64> {
    line.trim().strip_prefix(THRESHOLD_ACK_PREFIX)?.parse().ok()
}
