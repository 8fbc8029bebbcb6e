use bytes::{Buf, BufMut, BytesMut};
use impactrelay_detect::{padded_range, EventWindow};

use crate::error::{RelayError, Result};

/// Tag opening every binary relay frame.
pub const FRAME_TAG: [u8; 3] = *b"PKT";

/// Tag + seq (u32) + offset (u32) + compression (u16) + count (u16).
pub const HEADER_SIZE: usize = 15;

/// Bytes per encoded sample.
pub const SAMPLE_SIZE: usize = 4;

/// Keep every 4th sample of the context window.
pub const DEFAULT_COMPRESSION: u16 = 4;

/// Samples of context on each side of an event.
pub const DEFAULT_CONTEXT: usize = 300;

/// Most samples a single frame can carry.
pub const MAX_SAMPLES: usize = u16::MAX as usize;

/// An event excerpt as it travels over the radio link.
///
/// Wire layout, all integers big-endian:
///
/// ```text
/// +-------+---------+------------+-----------------+------------+-----------------+
/// | "PKT" | seq u32 | offset u32 | compression u16 | count u16  | count x i32     |
/// +-------+---------+------------+-----------------+------------+-----------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFrame {
    /// Sequence number of the packet the event came from.
    pub seq: u32,
    /// Index of the first excerpt sample within that packet.
    pub offset: u32,
    /// Decimation factor: one sample kept out of every `compression`.
    pub compression: u16,
    /// Decimated samples.
    pub samples: Vec<i32>,
}

impl RelayFrame {
    /// Encoded size in bytes.
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.samples.len() * SAMPLE_SIZE
    }

    /// Approximate the original excerpt by repeating each sample
    /// `compression` times.
    pub fn expand(&self) -> Vec<i32> {
        let factor = usize::from(self.compression.max(1));
        self.samples
            .iter()
            .flat_map(|&sample| std::iter::repeat(sample).take(factor))
            .collect()
    }
}

/// Encode a relay frame into `dst`.
pub fn encode_relay_frame(frame: &RelayFrame, dst: &mut BytesMut) -> Result<()> {
    let count = u16::try_from(frame.samples.len()).map_err(|_| RelayError::TooManySamples {
        count: frame.samples.len(),
        max: MAX_SAMPLES,
    })?;

    dst.reserve(frame.wire_len());
    dst.put_slice(&FRAME_TAG);
    dst.put_u32(frame.seq);
    dst.put_u32(frame.offset);
    dst.put_u16(frame.compression);
    dst.put_u16(count);
    for &sample in &frame.samples {
        dst.put_i32(sample);
    }
    Ok(())
}

/// Decode one relay frame from the front of `src`.
///
/// Returns `Ok(None)` until the whole frame is buffered. Consumes the frame
/// bytes on success and nothing otherwise.
pub fn decode_relay_frame(src: &mut BytesMut) -> Result<Option<RelayFrame>> {
    if src.len() < FRAME_TAG.len() {
        return Ok(None);
    }
    if src[..FRAME_TAG.len()] != FRAME_TAG {
        return Err(RelayError::InvalidTag);
    }
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let count = usize::from(u16::from_be_bytes([src[13], src[14]]));
    let total = HEADER_SIZE + count * SAMPLE_SIZE;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(FRAME_TAG.len());
    let seq = src.get_u32();
    let offset = src.get_u32();
    let compression = src.get_u16();
    let _count = src.get_u16();
    let samples = (0..count).map(|_| src.get_i32()).collect();

    Ok(Some(RelayFrame {
        seq,
        offset,
        compression,
        samples,
    }))
}

/// Cut the relay excerpt for `window` out of a packet's samples.
///
/// The window is widened by `context` samples on each side, clipped to the
/// packet, then decimated by keeping every `compression`-th sample starting
/// at the first. Samples outside the `i32` range saturate.
pub fn build_relay_frame(
    seq: u32,
    samples: &[i64],
    window: EventWindow,
    compression: u16,
    context: usize,
) -> Result<RelayFrame> {
    let range = padded_range(window, context, samples.len());
    if range.is_empty() {
        return Err(RelayError::EmptyWindow {
            start: window.start,
            end: window.end,
            len: samples.len(),
        });
    }

    let offset = u32::try_from(range.start).map_err(|_| RelayError::OffsetOutOfRange(range.start))?;
    let step = usize::from(compression.max(1));
    let decimated: Vec<i32> = samples[range]
        .iter()
        .step_by(step)
        .map(|&sample| saturate(sample))
        .collect();

    if decimated.len() > MAX_SAMPLES {
        return Err(RelayError::TooManySamples {
            count: decimated.len(),
            max: MAX_SAMPLES,
        });
    }

    Ok(RelayFrame {
        seq,
        offset,
        compression,
        samples: decimated,
    })
}

fn saturate(sample: i64) -> i32 {
    sample.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
