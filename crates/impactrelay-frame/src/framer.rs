use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use crate::codec::{rfind_marker, scan_frame, ByteFrame, Scan, MARKER_LEN, START_MARKER};
use crate::error::FrameError;

const INITIAL_BUFFER_CAPACITY: usize = 32 * 1024;

/// Packets must be strictly larger than this to be decoded.
pub const DEFAULT_MIN_FRAME_LEN: usize = 19_000;

/// Receive buffer cap while waiting for an end marker: 1 MiB.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 1024 * 1024;

/// Configuration for the stream framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerConfig {
    /// Completed packets of this length or less are rejected. Default: 19,000.
    pub min_frame_len: usize,
    /// Maximum bytes retained while no end marker has arrived. Default: 1 MiB.
    pub max_buffer_len: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            min_frame_len: DEFAULT_MIN_FRAME_LEN,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
        }
    }
}

/// Running counters for one framer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    /// Packets emitted.
    pub frames: u64,
    /// Completed packets rejected by the minimum size gate.
    pub undersized: u64,
    /// Bytes dropped as leading garbage or orphaned end-marker spans.
    pub garbage_bytes: u64,
    /// Bytes evicted by the buffer cap.
    pub evicted_bytes: u64,
}

/// Cuts marker-delimited packets out of a byte stream.
///
/// Owns the growing receive buffer. Callers feed whatever bytes arrived and
/// get back every packet completed by them; partial packets stay buffered
/// for the next call.
#[derive(Debug)]
pub struct StreamFramer {
    buf: BytesMut,
    // No end marker starts before this offset in `buf`.
    search_from: usize,
    config: FramerConfig,
    stats: FramerStats,
}

impl StreamFramer {
    /// Create a framer with default configuration.
    pub fn new() -> Self {
        Self::with_config(FramerConfig::default())
    }

    /// Create a framer with explicit configuration.
    pub fn with_config(config: FramerConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            search_from: 0,
            config,
            stats: FramerStats::default(),
        }
    }

    /// Append `bytes` and return every packet that is now complete.
    pub fn ingest(&mut self, bytes: &[u8]) -> Vec<ByteFrame> {
        self.buf.extend_from_slice(bytes);

        let mut frames = Vec::new();
        loop {
            match scan_frame(&mut self.buf, self.search_from) {
                Scan::Frame { frame, discarded } => {
                    self.search_from = 0;
                    if discarded > 0 {
                        debug!(discarded, "dropped bytes before start marker");
                        self.stats.garbage_bytes += discarded as u64;
                    }
                    if frame.len() <= self.config.min_frame_len {
                        let err = FrameError::Undersized {
                            len: frame.len(),
                            min: self.config.min_frame_len,
                        };
                        warn!(len = frame.len(), "{err}");
                        self.stats.undersized += 1;
                        continue;
                    }
                    self.stats.frames += 1;
                    frames.push(frame);
                }
                Scan::Garbage(dropped) => {
                    self.search_from = 0;
                    debug!(dropped, "dropped end marker without start marker");
                    self.stats.garbage_bytes += dropped as u64;
                }
                Scan::Incomplete => {
                    self.search_from = self.buf.len().saturating_sub(MARKER_LEN - 1);
                    break;
                }
            }
        }

        self.enforce_cap();
        frames
    }

    /// Bytes currently held while waiting for an end marker.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.search_from = 0;
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Current framer configuration.
    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    // Called only when the buffer holds no end marker. Prefer keeping the
    // newest start marker; otherwise keep a tail that may hold a partial one.
    fn enforce_cap(&mut self) {
        if self.buf.len() <= self.config.max_buffer_len {
            return;
        }

        let before = self.buf.len();
        if let Some(idx_start) = rfind_marker(&self.buf, &START_MARKER) {
            self.drop_front(idx_start);
        }
        if self.buf.len() > self.config.max_buffer_len {
            let keep = MARKER_LEN - 1;
            let excess = self.buf.len() - keep;
            self.drop_front(excess);
        }

        let evicted = before - self.buf.len();
        warn!(
            evicted,
            retained = self.buf.len(),
            cap = self.config.max_buffer_len,
            "receive buffer over cap without end marker, evicting"
        );
        self.stats.evicted_bytes += evicted as u64;
    }

    fn drop_front(&mut self, n: usize) {
        self.buf.advance(n);
        self.search_from = self.search_from.saturating_sub(n);
    }
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;
    use proptest::prelude::*;

    use super::*;
    use crate::codec::END_MARKER;

    fn packet(samples: &[i32]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(&START_MARKER);
        for sample in samples {
            buf.put_i32(*sample);
        }
        buf.put_slice(&END_MARKER);
        buf.to_vec()
    }

    fn permissive() -> StreamFramer {
        StreamFramer::with_config(FramerConfig {
            min_frame_len: 0,
            ..FramerConfig::default()
        })
    }

    #[test]
    fn emits_single_frame() {
        let wire = packet(&[1, 2, 3]);
        let mut framer = permissive();

        let frames = framer.ingest(&wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), wire.as_slice());
        assert_eq!(framer.buffered_len(), 0);
        assert_eq!(framer.stats().frames, 1);
    }

    #[test]
    fn emits_multiple_frames_from_one_chunk() {
        let mut wire = packet(&[1]);
        wire.extend_from_slice(&packet(&[2]));
        wire.extend_from_slice(&packet(&[3]));

        let frames = permissive().ingest(&wire);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].as_bytes(), packet(&[3]).as_slice());
    }

    #[test]
    fn byte_by_byte_delivery() {
        let wire = packet(&[10, -10, 20]);
        let mut framer = permissive();

        let mut frames = Vec::new();
        for byte in &wire {
            frames.extend(framer.ingest(std::slice::from_ref(byte)));
        }

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), wire.as_slice());
    }

    #[test]
    fn end_marker_split_across_ingests() {
        let wire = packet(&[99]);
        let split = wire.len() - 4;
        let mut framer = permissive();

        assert!(framer.ingest(&wire[..split]).is_empty());
        let frames = framer.ingest(&wire[split..]);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn undersized_frame_is_rejected_and_consumed() {
        let small = packet(&[1, 2]);
        let mut framer = StreamFramer::with_config(FramerConfig {
            min_frame_len: small.len(),
            ..FramerConfig::default()
        });

        assert!(framer.ingest(&small).is_empty());
        assert_eq!(framer.buffered_len(), 0);
        assert_eq!(framer.stats().undersized, 1);

        let big = packet(&[1, 2, 3]);
        assert_eq!(framer.ingest(&big).len(), 1);
    }

    #[test]
    fn default_gate_rejects_exactly_minimum_length() {
        let samples = vec![0i32; (DEFAULT_MIN_FRAME_LEN - 2 * MARKER_LEN) / 4];
        let exact = packet(&samples);
        assert_eq!(exact.len(), DEFAULT_MIN_FRAME_LEN);

        let mut framer = StreamFramer::new();
        assert!(framer.ingest(&exact).is_empty());

        let mut longer = samples.clone();
        longer.push(0);
        assert_eq!(framer.ingest(&packet(&longer)).len(), 1);
    }

    #[test]
    fn orphaned_end_marker_is_dropped() {
        let mut wire = vec![0x10, 0x20];
        wire.extend_from_slice(&END_MARKER);
        let good = packet(&[4]);
        wire.extend_from_slice(&good);

        let mut framer = permissive();
        let frames = framer.ingest(&wire);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), good.as_slice());
        assert_eq!(framer.stats().garbage_bytes, (2 + MARKER_LEN) as u64);
    }

    #[test]
    fn cap_keeps_latest_start_marker() {
        let mut framer = StreamFramer::with_config(FramerConfig {
            min_frame_len: 0,
            max_buffer_len: 64,
        });

        assert!(framer.ingest(&[0x01; 60]).is_empty());
        let mut partial = START_MARKER.to_vec();
        partial.extend_from_slice(&[0, 0, 0, 7]);
        assert!(framer.ingest(&partial).is_empty());

        assert_eq!(framer.buffered_len(), partial.len());
        assert_eq!(framer.stats().evicted_bytes, 60);

        let frames = framer.ingest(&END_MARKER);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), Some(&[0, 0, 0, 7][..]));
    }

    #[test]
    fn cap_without_start_marker_keeps_short_tail() {
        let mut framer = StreamFramer::with_config(FramerConfig {
            min_frame_len: 0,
            max_buffer_len: 32,
        });

        framer.ingest(&[0x02; 100]);
        assert_eq!(framer.buffered_len(), MARKER_LEN - 1);

        let mut tail = START_MARKER.to_vec();
        tail.extend_from_slice(&[0, 0, 0, 1]);
        tail.extend_from_slice(&END_MARKER);
        assert_eq!(framer.ingest(&tail).len(), 1);
    }

    #[test]
    fn clear_resets_buffer() {
        let mut framer = permissive();
        framer.ingest(&START_MARKER);
        framer.clear();
        assert_eq!(framer.buffered_len(), 0);
    }

    proptest! {
        #[test]
        fn frame_followed_by_trailing_bytes(
            payload in proptest::collection::vec(0u8..=0x48, 0..256),
            trailing in proptest::collection::vec(0u8..=0x48, 0..64),
        ) {
            let mut wire = START_MARKER.to_vec();
            wire.extend_from_slice(&payload);
            wire.extend_from_slice(&END_MARKER);

            let mut input = wire.clone();
            input.extend_from_slice(&trailing);

            let mut framer = permissive();
            let frames = framer.ingest(&input);
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(frames[0].as_bytes(), wire.as_slice());
            prop_assert_eq!(framer.buffered_len(), trailing.len());
        }
    }
}
