use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::codec::{decode_relay_frame, RelayFrame, FRAME_TAG, HEADER_SIZE, SAMPLE_SIZE};
use crate::line::{parse_threshold_ack, StatusLine};

/// Frames larger than this are treated as a corrupted header.
pub const MAX_CLIENT_FRAME: usize = 200_000;

/// Lines longer than this must be at least 30% alphanumeric.
const SHORT_LINE: usize = 5;

/// One message received from the relay link.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    /// A binary event excerpt.
    Event(RelayFrame),
    /// A well-formed status line.
    Status(StatusLine),
    /// A threshold acknowledgement.
    Threshold(i64),
    /// Any other text line that passed the noise filter.
    Text(String),
}

/// Splits a mixed binary/text relay stream back into messages.
///
/// Whichever comes first in the buffer, a `PKT` tag or a line terminator,
/// decides how the next bytes are read. A frame header claiming an
/// implausible size is skipped one byte at a time. Text lines are dropped
/// when they hold non-ASCII bytes, are shorter than 2 characters, or (past
/// 5 characters) are less than 30% alphanumeric.
#[derive(Debug, Default)]
pub struct RelayStreamDecoder {
    buf: BytesMut,
}

impl RelayStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes waiting for more input.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Decode every complete message currently buffered.
    pub fn drain(&mut self) -> Vec<RelayMessage> {
        std::iter::from_fn(|| self.next_message()).collect()
    }

    /// Decode the next complete message, if any.
    pub fn next_message(&mut self) -> Option<RelayMessage> {
        loop {
            if self.buf.is_empty() {
                return None;
            }

            let tag = find(&self.buf, &FRAME_TAG);
            let newline = self.buf.iter().position(|&b| b == b'\r' || b == b'\n');

            match (tag, newline) {
                (Some(tag), nl) if nl.is_none_or(|nl| tag < nl) => {
                    if tag > 0 {
                        trace!(skipped = tag, "bytes before frame tag");
                        self.buf.advance(tag);
                    }
                    match self.try_frame() {
                        Step::Message(message) => return Some(message),
                        Step::Skip => continue,
                        Step::Wait => return None,
                    }
                }
                (_, Some(nl)) => {
                    if let Some(message) = self.take_line(nl) {
                        return Some(message);
                    }
                }
                _ => return None,
            }
        }
    }

    fn try_frame(&mut self) -> Step {
        if self.buf.len() < HEADER_SIZE {
            return Step::Wait;
        }

        let count = usize::from(u16::from_be_bytes([self.buf[13], self.buf[14]]));
        let total = HEADER_SIZE + count * SAMPLE_SIZE;
        if total <= HEADER_SIZE || total > MAX_CLIENT_FRAME {
            debug!(total, "implausible frame header, resyncing");
            self.buf.advance(1);
            return Step::Skip;
        }
        if self.buf.len() < total {
            return Step::Wait;
        }

        match decode_relay_frame(&mut self.buf) {
            Ok(Some(frame)) => Step::Message(RelayMessage::Event(frame)),
            Ok(None) => Step::Wait,
            Err(err) => {
                debug!(%err, "frame decode failed, resyncing");
                self.buf.advance(1);
                Step::Skip
            }
        }
    }

    fn take_line(&mut self, nl: usize) -> Option<RelayMessage> {
        let pair = matches!(
            (self.buf.get(nl), self.buf.get(nl + 1)),
            (Some(b'\r'), Some(b'\n')) | (Some(b'\n'), Some(b'\r'))
        );
        let raw = self.buf.split_to(nl);
        self.buf.advance(if pair { 2 } else { 1 });

        let line = filter_line(&raw)?;
        if let Some(threshold) = parse_threshold_ack(&line) {
            return Some(RelayMessage::Threshold(threshold));
        }
        match line.parse::<StatusLine>() {
            Ok(status) => Some(RelayMessage::Status(status)),
            Err(_) => Some(RelayMessage::Text(line)),
        }
    }
}

enum Step {
    Message(RelayMessage),
    Skip,
    Wait,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn filter_line(raw: &[u8]) -> Option<String> {
    if !raw.is_ascii() {
        return None;
    }
    let line = std::str::from_utf8(raw).ok()?.trim();
    let len = line.chars().count();
    if len < 2 {
        return None;
    }
    if len > SHORT_LINE {
        let alnum = line.chars().filter(char::is_ascii_alphanumeric).count();
        if (alnum as f64) < len as f64 * 0.3 {
            return None;
        }
    }
    Some(line.to_string())
}
