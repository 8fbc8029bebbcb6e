use std::collections::VecDeque;

use chrono::{DateTime, Local};
use impactrelay_relay::{format_timestamp, loudness};

use crate::config::AcquisitionConfig;

/// One accepted event. Never mutated once logged.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakRecord {
    pub timestamp: DateTime<Local>,
    /// Sequence number of the packet holding the event.
    pub seq: u32,
    /// 1-based index of the event within its packet.
    pub event_index: usize,
    /// Events detected in the packet, valid or not.
    pub event_total: usize,
    /// First sample above the threshold.
    pub start: usize,
    /// Last sample above the threshold.
    pub end: usize,
    /// Largest absolute amplitude inside `[start, end]`.
    pub peak: u64,
    /// Samples in `[start, end]`.
    pub duration: usize,
}

impl PeakRecord {
    /// Peak as a fraction of full scale.
    pub fn loudness(&self) -> f64 {
        loudness(self.peak)
    }

    /// `HH:MM:SS.ffff` capture time.
    pub fn time_label(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// Bookkeeping for one decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketInfo {
    pub seq: u32,
    pub timestamp: DateTime<Local>,
    /// Packet length in bytes, markers included.
    pub byte_len: usize,
    /// History length right after this packet was pushed.
    pub ring_position: usize,
}

/// The most recent decoded packets, oldest evicted first.
#[derive(Debug, Clone)]
pub struct PacketHistory {
    ring: VecDeque<Vec<i32>>,
    capacity: usize,
}

impl PacketHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a packet, evicting the oldest when full. Returns the new length.
    pub fn push(&mut self, samples: Vec<i32>) -> usize {
        if self.capacity == 0 {
            return 0;
        }
        if self.ring.len() == self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(samples);
        self.ring.len()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Packets from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &[i32]> {
        self.ring.iter().map(Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

/// Aggregate statistics over an event log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventSummary {
    pub total: usize,
    pub max_peak: u64,
    pub min_peak: u64,
    pub avg_peak: f64,
    pub avg_duration: f64,
}

/// Append-only log of accepted events.
///
/// Unbounded: the owner decides when to export or clear it.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<PeakRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: PeakRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[PeakRecord] {
        &self.records
    }

    /// The newest `n` records, oldest first.
    pub fn last(&self, n: usize) -> &[PeakRecord] {
        &self.records[self.records.len().saturating_sub(n)..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove and return every record.
    pub fn take(&mut self) -> Vec<PeakRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Statistics over all records, `None` when empty.
    pub fn summary(&self) -> Option<EventSummary> {
        let total = self.records.len();
        if total == 0 {
            return None;
        }

        let peaks = self.records.iter().map(|r| r.peak);
        let max_peak = peaks.clone().max().unwrap_or(0);
        let min_peak = peaks.clone().min().unwrap_or(0);
        let avg_peak = peaks.map(|p| p as f64).sum::<f64>() / total as f64;
        let avg_duration =
            self.records.iter().map(|r| r.duration as f64).sum::<f64>() / total as f64;

        Some(EventSummary {
            total,
            max_peak,
            min_peak,
            avg_peak,
            avg_duration,
        })
    }
}

/// Mutable state of one acquisition session.
#[derive(Debug, Clone)]
pub struct SessionState {
    threshold: i64,
    initial_threshold: i64,
    last_seq: u32,
    history: PacketHistory,
    packets: Vec<PacketInfo>,
    events: EventLog,
}

impl SessionState {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            threshold: config.threshold,
            initial_threshold: config.threshold,
            last_seq: 0,
            history: PacketHistory::new(config.history_capacity),
            packets: Vec::new(),
            events: EventLog::new(),
        }
    }

    /// Clear history, packet list, event log and sequence counter, and
    /// restore the configured threshold.
    pub fn reset(&mut self) {
        self.threshold = self.initial_threshold;
        self.last_seq = 0;
        self.history.clear();
        self.packets.clear();
        self.events.clear();
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: i64) {
        self.threshold = threshold;
    }

    /// Claim the next packet sequence number, starting at 1.
    pub fn next_seq(&mut self) -> u32 {
        self.last_seq = self.last_seq.wrapping_add(1);
        self.last_seq
    }

    /// Packets decoded so far this session.
    pub fn total_packets(&self) -> usize {
        self.packets.len()
    }

    /// Record a decoded packet and return its bookkeeping entry.
    pub fn record_packet(
        &mut self,
        seq: u32,
        timestamp: DateTime<Local>,
        byte_len: usize,
        samples: Vec<i32>,
    ) -> PacketInfo {
        let ring_position = self.history.push(samples);
        let info = PacketInfo {
            seq,
            timestamp,
            byte_len,
            ring_position,
        };
        self.packets.push(info.clone());
        info
    }

    pub fn history(&self) -> &PacketHistory {
        &self.history
    }

    pub fn packets(&self) -> &[PacketInfo] {
        &self.packets
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(peak: u64, duration: usize) -> PeakRecord {
        PeakRecord {
            timestamp: Local::now(),
            seq: 1,
            event_index: 1,
            event_total: 1,
            start: 0,
            end: duration.saturating_sub(1),
            peak,
            duration,
        }
    }

    #[test]
    fn history_evicts_oldest() {
        let mut history = PacketHistory::new(3);
        for i in 0..5 {
            history.push(vec![i]);
        }
        assert_eq!(history.len(), 3);
        let firsts: Vec<i32> = history.iter().map(|p| p[0]).collect();
        assert_eq!(firsts, vec![2, 3, 4]);
        assert_eq!(history.iter().last(), Some(&[4][..]));
    }

    #[test]
    fn zero_capacity_history_keeps_nothing() {
        let mut history = PacketHistory::new(0);
        assert_eq!(history.push(vec![1]), 0);
        assert!(history.is_empty());
    }

    #[test]
    fn summary_statistics() {
        let mut log = EventLog::new();
        assert_eq!(log.summary(), None);

        log.push(record(1000, 10));
        log.push(record(3000, 30));
        log.push(record(2000, 20));

        let summary = log.summary().unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.max_peak, 3000);
        assert_eq!(summary.min_peak, 1000);
        assert!((summary.avg_peak - 2000.0).abs() < 1e-9);
        assert!((summary.avg_duration - 20.0).abs() < 1e-9);
    }

    #[test]
    fn last_records() {
        let mut log = EventLog::new();
        for peak in 1..=5 {
            log.push(record(peak, 1));
        }
        let peaks: Vec<u64> = log.last(2).iter().map(|r| r.peak).collect();
        assert_eq!(peaks, vec![4, 5]);
        assert_eq!(log.last(99).len(), 5);

        assert_eq!(log.take().len(), 5);
        assert!(log.is_empty());
    }

    #[test]
    fn sequence_and_reset() {
        let mut state = SessionState::new(&AcquisitionConfig::default());
        assert_eq!(state.next_seq(), 1);
        assert_eq!(state.next_seq(), 2);

        let info = state.record_packet(2, Local::now(), 19_004, vec![1, 2]);
        assert_eq!(info.ring_position, 1);
        state.set_threshold(10_000_000);
        state.events_mut().push(record(5000, 5));

        state.reset();
        assert_eq!(state.next_seq(), 1);
        assert_eq!(state.threshold(), 150_000_000);
        assert_eq!(state.total_packets(), 0);
        assert!(state.history().is_empty());
        assert!(state.events().is_empty());
    }

    #[test]
    fn ring_position_saturates_at_capacity() {
        let config = AcquisitionConfig {
            history_capacity: 2,
            ..AcquisitionConfig::default()
        };
        let mut state = SessionState::new(&config);
        let positions: Vec<usize> = (1..=4)
            .map(|seq| state.record_packet(seq, Local::now(), 0, vec![]).ring_position)
            .collect();
        assert_eq!(positions, vec![1, 2, 2, 2]);
        assert_eq!(state.total_packets(), 4);
    }
}
