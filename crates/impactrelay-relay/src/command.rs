use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::RelayError;
use crate::line::LINE_END;

/// Prefix of a threshold command.
pub const COMMAND_PREFIX: &str = "SET:";

/// Threshold units per multiplier step.
pub const THRESHOLD_STEP: i64 = 10_000_000;

/// Letters `a` through `t` map to multipliers 1 through 20.
pub const MAX_MULTIPLIER: u8 = 20;

/// Scan buffer length above which stale text is trimmed.
pub const SCAN_BUFFER_LIMIT: usize = 50;

/// Characters kept when the scan buffer is trimmed.
pub const SCAN_BUFFER_KEEP: usize = 20;

/// A `SET:<letter>` request to change the detection threshold.
///
/// The letter `a` is multiplier 1, `t` is multiplier 20; the threshold is
/// `multiplier * 10,000,000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThresholdCommand {
    letter: u8,
}

impl ThresholdCommand {
    /// Command for a letter in `a..=t`.
    pub fn from_letter(letter: char) -> Option<Self> {
        ('a'..='t')
            .contains(&letter)
            .then_some(Self { letter: letter as u8 })
    }

    /// Command for a multiplier in `1..=20`.
    pub fn from_multiplier(multiplier: u8) -> Option<Self> {
        (1..=MAX_MULTIPLIER)
            .contains(&multiplier)
            .then(|| Self {
                letter: b'a' + multiplier - 1,
            })
    }

    pub fn letter(&self) -> char {
        char::from(self.letter)
    }

    pub fn multiplier(&self) -> u8 {
        self.letter - b'a' + 1
    }

    /// New threshold requested by this command.
    pub fn threshold(&self) -> i64 {
        i64::from(self.multiplier()) * THRESHOLD_STEP
    }

    /// Wire form, CRLF included.
    pub fn encode(&self) -> String {
        format!("{self}{LINE_END}")
    }
}

impl fmt::Display for ThresholdCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{COMMAND_PREFIX}{}", self.letter())
    }
}

impl FromStr for ThresholdCommand {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s
            .trim()
            .strip_prefix(COMMAND_PREFIX)
            .ok_or_else(|| RelayError::InvalidCommand(s.to_string()))?
            .chars();
        match (rest.next().and_then(Self::from_letter), rest.next()) {
            (Some(command), None) => Ok(command),
            _ => Err(RelayError::InvalidCommand(s.to_string())),
        }
    }
}

/// Finds threshold commands in text arriving in arbitrary fragments.
///
/// Incoming bytes are decoded as ASCII (other bytes are dropped) and
/// appended to a rolling buffer. When the buffer holds one or more
/// commands, the last one wins and the buffer is cleared. Otherwise a
/// buffer over 50 characters is trimmed to its last 20.
#[derive(Debug, Default, Clone)]
pub struct CommandScanner {
    buf: String,
}

impl CommandScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return the newest complete command, if any.
    pub fn push(&mut self, bytes: &[u8]) -> Option<ThresholdCommand> {
        self.buf
            .extend(bytes.iter().filter(|b| b.is_ascii()).map(|&b| char::from(b)));

        let found = self
            .buf
            .match_indices(COMMAND_PREFIX)
            .filter_map(|(idx, _)| {
                self.buf[idx + COMMAND_PREFIX.len()..]
                    .chars()
                    .next()
                    .and_then(ThresholdCommand::from_letter)
            })
            .last();

        match found {
            Some(command) => {
                debug!(%command, "threshold command received");
                self.buf.clear();
                Some(command)
            }
            None => {
                if self.buf.len() > SCAN_BUFFER_LIMIT {
                    let cut = self.buf.len() - SCAN_BUFFER_KEEP;
                    self.buf.drain(..cut);
                }
                None
            }
        }
    }

    /// Text currently held while waiting for a complete command.
    pub fn buffered(&self) -> &str {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
