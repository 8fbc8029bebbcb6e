use bytes::{Buf, Bytes, BytesMut};
use tracing::warn;

use crate::error::{FrameError, Result};

/// Length of each boundary marker.
pub const MARKER_LEN: usize = 10;

/// Byte repeated to form the start marker.
pub const START_BYTE: u8 = 0xB6;

/// Byte repeated to form the end marker.
pub const END_BYTE: u8 = 0x49;

/// Start marker: `0xB6` x10.
pub const START_MARKER: [u8; MARKER_LEN] = [START_BYTE; MARKER_LEN];

/// End marker: `0x49` x10.
pub const END_MARKER: [u8; MARKER_LEN] = [END_BYTE; MARKER_LEN];

/// Bytes per encoded sample.
pub const SAMPLE_SIZE: usize = 4;

/// One complete marker-delimited packet, markers included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteFrame {
    bytes: Bytes,
}

impl ByteFrame {
    /// Wrap raw packet bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Raw packet bytes, markers included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total packet length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the packet holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes between the markers, if the packet is long enough to hold both.
    pub fn payload(&self) -> Option<&[u8]> {
        if self.bytes.len() < 2 * MARKER_LEN {
            return None;
        }
        Some(&self.bytes[MARKER_LEN..self.bytes.len() - MARKER_LEN])
    }
}

/// Outcome of one marker search over the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// A complete packet was cut from the buffer.
    ///
    /// `discarded` counts leading bytes before the start marker that were
    /// dropped along with it.
    Frame { frame: ByteFrame, discarded: usize },
    /// An end marker had no start marker before it; this many bytes
    /// (through the end marker) were dropped.
    Garbage(usize),
    /// No end marker is buffered yet.
    Incomplete,
}

/// Position of the first occurrence of `marker` in `haystack`.
pub fn find_marker(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || haystack.len() < marker.len() {
        return None;
    }
    haystack
        .windows(marker.len())
        .position(|window| window == marker)
}

/// Position of the last occurrence of `marker` in `haystack`.
pub fn rfind_marker(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || haystack.len() < marker.len() {
        return None;
    }
    haystack
        .windows(marker.len())
        .rposition(|window| window == marker)
}

/// Cut the next packet out of `src`.
///
/// The end marker is located first, starting the search at `search_from`.
/// The start marker is then searched backwards from the end marker, so a
/// packet always uses the start marker nearest to its end marker. Consumed
/// bytes (leading garbage, the packet itself, or an orphaned span) are
/// removed from `src`; on [`Scan::Incomplete`] the buffer is untouched.
pub fn scan_frame(src: &mut BytesMut, search_from: usize) -> Scan {
    let from = search_from.min(src.len());
    let Some(rel_end) = find_marker(&src[from..], &END_MARKER) else {
        return Scan::Incomplete;
    };
    let idx_end = from + rel_end;
    let end_pos = idx_end + MARKER_LEN;

    match rfind_marker(&src[..idx_end], &START_MARKER) {
        Some(idx_start) => {
            src.advance(idx_start);
            let frame = src.split_to(end_pos - idx_start).freeze();
            Scan::Frame {
                frame: ByteFrame::new(frame),
                discarded: idx_start,
            }
        }
        None => {
            src.advance(end_pos);
            Scan::Garbage(end_pos)
        }
    }
}

/// Decode a packet into its samples.
///
/// The packet must begin with the start marker and end with the end marker.
/// The payload between them is trimmed down to a whole number of samples
/// (the remainder is dropped with a warning) and decoded as big-endian
/// two's-complement `i32`, preserving order.
pub fn decode_payload(frame: &[u8]) -> Result<Vec<i32>> {
    if frame.is_empty() {
        return Err(FrameError::EmptyFrame);
    }
    if !frame.starts_with(&START_MARKER) {
        return Err(FrameError::MissingStartMarker);
    }
    if frame.len() < 2 * MARKER_LEN || !frame.ends_with(&END_MARKER) {
        return Err(FrameError::MissingEndMarker);
    }

    let payload = &frame[MARKER_LEN..frame.len() - MARKER_LEN];
    let remainder = payload.len() % SAMPLE_SIZE;
    if remainder != 0 {
        warn!(
            payload_len = payload.len(),
            discarded = remainder,
            "payload length not a multiple of 4, trimming"
        );
    }

    let trimmed = &payload[..payload.len() - remainder];
    if trimmed.is_empty() {
        return Err(FrameError::EmptyPayload {
            payload_len: payload.len(),
        });
    }

    Ok(trimmed
        .chunks_exact(SAMPLE_SIZE)
        .map(|chunk| i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
