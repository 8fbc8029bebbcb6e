use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use impactrelay_frame::{FramerStats, StreamFramer};
use impactrelay_relay::RelayLink;
use impactrelay_transport::{read_available, Link};
use tracing::{debug, error, info, warn};

use crate::config::AcquisitionConfig;
use crate::error::{AcquireError, Result};
use crate::pipeline::{PacketOutcome, PacketProcessor};
use crate::state::{EventSummary, SessionState};

/// Session state shared between the loop and observers.
pub type SharedState = Arc<Mutex<SessionState>>;

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No bytes were pending.
    Idle,
    /// Bytes were read and this many packets were decoded.
    Processed { bytes: usize, packets: usize },
}

/// Totals reported when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub total_packets: usize,
    /// Threshold in effect at the end of the session.
    pub threshold: i64,
    /// `None` when no events were accepted.
    pub events: Option<EventSummary>,
    pub framer: FramerStats,
}

/// Drives one acquisition session.
///
/// Owns the acquisition link, the framer and the session state. Each
/// iteration first applies any pending threshold command from the relay
/// link, then reads whatever the acquisition link has buffered and runs
/// every completed packet through the pipeline. Accepted events are relayed
/// fire-and-forget.
pub struct AcquisitionLoop<L> {
    link: L,
    relay: Option<Arc<RelayLink>>,
    framer: StreamFramer,
    processor: PacketProcessor,
    state: SharedState,
    config: AcquisitionConfig,
}

impl<L: Link> AcquisitionLoop<L> {
    pub fn new(link: L, relay: Option<Arc<RelayLink>>, config: AcquisitionConfig) -> Self {
        Self {
            link,
            relay,
            framer: StreamFramer::with_config(config.framer),
            processor: PacketProcessor::new(&config),
            state: Arc::new(Mutex::new(SessionState::new(&config))),
            config,
        }
    }

    /// Handle onto the session state for observers.
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Whether accepted events are still being relayed.
    pub fn is_relaying(&self) -> bool {
        self.relay.is_some()
    }

    /// Reset the session and tell the ADC to start streaming.
    pub fn start(&mut self) -> Result<()> {
        self.lock_state().reset();
        self.framer.clear();
        self.write_control(self.config.start_byte)?;
        info!(
            link = %self.link.describe(),
            threshold = self.config.threshold,
            relay = self.relay.is_some(),
            "acquisition started"
        );
        Ok(())
    }

    /// Tell the ADC to stop streaming.
    pub fn stop(&mut self) -> Result<()> {
        self.write_control(self.config.stop_byte)?;
        info!(link = %self.link.describe(), "stop byte sent");
        Ok(())
    }

    /// Run one loop iteration without blocking.
    pub fn step(&mut self) -> Result<Step> {
        self.poll_threshold();

        let bytes = read_available(&mut self.link)?;
        if bytes.is_empty() {
            return Ok(Step::Idle);
        }

        let packets = self.process_bytes(&bytes).len();
        Ok(Step::Processed {
            bytes: bytes.len(),
            packets,
        })
    }

    /// Feed raw acquisition bytes through the framer and pipeline.
    ///
    /// Used by [`step`](Self::step) and for replaying captured streams.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Vec<PacketOutcome> {
        let frames = self.framer.ingest(bytes);
        let mut outcomes = Vec::with_capacity(frames.len());

        for frame in frames {
            let result = {
                let mut state = self.lock_state();
                self.processor.process(&frame, &mut state, Local::now())
            };
            match result {
                Ok(outcome) => {
                    self.relay_outcome(&outcome);
                    outcomes.push(outcome);
                }
                Err(err) => warn!(bytes = frame.len(), %err, "packet discarded"),
            }
        }
        outcomes
    }

    /// Loop until `stop` is set or the acquisition link fails.
    ///
    /// Starts the session first and always sends the stop byte on the way
    /// out. The flag is checked once per iteration.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<SessionSummary> {
        self.start()?;

        let result = loop {
            if stop.load(Ordering::SeqCst) {
                break Ok(());
            }
            match self.step() {
                Ok(Step::Idle) => std::thread::sleep(self.config.idle_sleep),
                Ok(Step::Processed { .. }) => {}
                Err(err) => {
                    error!(%err, "acquisition link failed, stopping");
                    break Err(err);
                }
            }
        };

        if let Err(err) = self.stop() {
            error!(%err, "failed to send stop byte");
        }

        result.map(|()| self.summary())
    }

    /// Totals for the current session.
    pub fn summary(&self) -> SessionSummary {
        let state = self.lock_state();
        SessionSummary {
            total_packets: state.total_packets(),
            threshold: state.threshold(),
            events: state.events().summary(),
            framer: self.framer.stats(),
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    fn poll_threshold(&mut self) {
        let Some(relay) = self.relay.clone() else {
            return;
        };

        let command = match relay.poll_command() {
            Ok(Some(command)) => command,
            Ok(None) => return,
            Err(err) => {
                self.drop_relay(&err);
                return;
            }
        };

        let threshold = command.threshold();
        self.lock_state().set_threshold(threshold);
        info!(%command, threshold, "threshold updated");

        if let Err(err) = relay.send_threshold_ack(threshold) {
            self.drop_relay(&err);
        }
    }

    fn relay_outcome(&mut self, outcome: &PacketOutcome) {
        let Some(relay) = self.relay.clone() else {
            return;
        };

        for tx in &outcome.transmissions {
            let sent = match &tx.frame {
                Some(frame) => relay.send_event(frame, &tx.status),
                None => relay.send_line(&tx.status.render()),
            };
            if let Err(err) = sent {
                self.drop_relay(&err);
                return;
            }
            debug!(seq = tx.status.seq, event = tx.status.event_index, "event relayed");
        }
    }

    fn drop_relay(&mut self, err: &dyn std::error::Error) {
        error!(%err, "relay link failed, continuing without relay");
        self.relay = None;
    }

    fn write_control(&mut self, byte: u8) -> Result<()> {
        self.link.write_all(&[byte]).map_err(AcquireError::Io)?;
        self.link.flush().map_err(AcquireError::Io)
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L: Link> std::fmt::Debug for AcquisitionLoop<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionLoop")
            .field("link", &self.link.describe())
            .field("relay", &self.relay)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::{BufMut, BytesMut};
    use impactrelay_frame::{END_MARKER, START_MARKER};
    use impactrelay_relay::{RelayConfig, RelayMessage, RelayStreamDecoder};
    use impactrelay_transport::MemoryLink;

    use super::*;

    fn packet(samples: &[i32]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(&START_MARKER);
        for sample in samples {
            buf.put_i32(*sample);
        }
        buf.put_slice(&END_MARKER);
        buf.to_vec()
    }

    fn burst_packet(level: i32) -> Vec<u8> {
        let mut samples = vec![0i32; 5000];
        for sample in &mut samples[2000..2100] {
            *sample = level;
        }
        packet(&samples)
    }

    fn config() -> AcquisitionConfig {
        AcquisitionConfig {
            threshold: 1000,
            idle_sleep: Duration::from_millis(1),
            relay: RelayConfig {
                pre_send_delay: Duration::ZERO,
                ..RelayConfig::default()
            },
            ..AcquisitionConfig::default()
        }
    }

    fn relay(memory: &MemoryLink) -> Arc<RelayLink> {
        Arc::new(RelayLink::with_config(Box::new(memory.clone()), config().relay).unwrap())
    }

    #[test]
    fn start_resets_and_sends_start_byte() {
        let adc = MemoryLink::new();
        let mut acq = AcquisitionLoop::new(adc.clone(), None, config());

        acq.process_bytes(&burst_packet(5000));
        assert_eq!(acq.summary().total_packets, 1);

        acq.start().unwrap();
        assert_eq!(adc.take_written(), vec![0x11]);
        assert_eq!(acq.summary().total_packets, 0);
        assert_eq!(acq.summary().events, None);
    }

    #[test]
    fn step_processes_pending_bytes() {
        let adc = MemoryLink::new();
        let radio = MemoryLink::new();
        let mut acq = AcquisitionLoop::new(adc.clone(), Some(relay(&radio)), config());
        acq.start().unwrap();

        assert_eq!(acq.step().unwrap(), Step::Idle);

        let wire = burst_packet(7000);
        adc.inject(&wire);
        assert_eq!(
            acq.step().unwrap(),
            Step::Processed {
                bytes: wire.len(),
                packets: 1
            }
        );

        let mut decoder = RelayStreamDecoder::new();
        decoder.push(&radio.take_written());
        let messages = decoder.drain();
        assert_eq!(messages.len(), 2);
        assert!(matches!(&messages[0], RelayMessage::Event(frame) if frame.seq == 1));
        assert!(matches!(&messages[1], RelayMessage::Status(line) if line.seq == 1));
    }

    #[test]
    fn packet_split_across_reads() {
        let adc = MemoryLink::new();
        let mut acq = AcquisitionLoop::new(adc.clone(), None, config());
        let wire = burst_packet(5000);

        let (head, tail) = wire.split_at(wire.len() / 2);
        adc.inject(head);
        assert!(matches!(acq.step().unwrap(), Step::Processed { packets: 0, .. }));
        adc.inject(tail);
        assert!(matches!(acq.step().unwrap(), Step::Processed { packets: 1, .. }));

        let state = acq.state();
        let state = state.lock().unwrap();
        assert_eq!(state.events().len(), 1);
        assert_eq!(state.packets()[0].byte_len, wire.len());
    }

    #[test]
    fn relay_command_changes_threshold_and_is_acknowledged() {
        let adc = MemoryLink::new();
        let radio = MemoryLink::new();
        let mut acq = AcquisitionLoop::new(adc.clone(), Some(relay(&radio)), config());

        radio.inject(b"SET:a\r\n");
        acq.step().unwrap();
        assert_eq!(radio.take_written(), b"THRESHOLD=10000000\r\n");
        assert_eq!(acq.summary().threshold, 10_000_000);

        // 5000 no longer crosses the raised threshold.
        adc.inject(&burst_packet(5000));
        acq.step().unwrap();
        assert_eq!(acq.summary().events, None);
        assert!(radio.take_written().is_empty());
    }

    #[test]
    fn failed_relay_is_dropped_and_acquisition_continues() {
        let adc = MemoryLink::new();
        let radio = MemoryLink::new();
        let mut acq = AcquisitionLoop::new(adc.clone(), Some(relay(&radio)), config());
        radio.close();

        adc.inject(&burst_packet(5000));
        acq.step().unwrap();

        assert!(!acq.is_relaying());
        assert_eq!(acq.summary().events.map(|e| e.total), Some(1));
    }

    #[test]
    fn run_stops_on_flag_and_sends_stop_byte() {
        let adc = MemoryLink::new();
        adc.inject(&burst_packet(5000));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let adc = adc.clone();
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut acq = AcquisitionLoop::new(adc, None, config());
                acq.run(&stop)
            })
        };

        while !adc.written().contains(&0x11) {
            std::thread::sleep(Duration::from_millis(1));
        }
        std::thread::sleep(Duration::from_millis(20));
        stop.store(true, Ordering::SeqCst);

        let summary = handle.join().unwrap().unwrap();
        assert_eq!(summary.total_packets, 1);
        assert_eq!(summary.events.map(|e| e.total), Some(1));
        assert_eq!(adc.take_written(), vec![0x11, 0x01]);
    }

    #[test]
    fn run_ends_with_stop_byte_on_link_failure() {
        let mut acq = AcquisitionLoop::new(Unplugged::default(), None, config());
        let stop = AtomicBool::new(false);

        let err = acq.run(&stop).unwrap_err();
        assert!(matches!(err, AcquireError::Transport(_)));
        assert_eq!(acq.link().written, vec![0x11, 0x01]);
    }

    #[test]
    fn run_fails_fast_when_start_byte_cannot_be_written() {
        let adc = MemoryLink::new();
        adc.close();
        let mut acq = AcquisitionLoop::new(adc.clone(), None, config());

        assert!(matches!(
            acq.run(&AtomicBool::new(false)),
            Err(AcquireError::Io(_))
        ));
    }

    // Accepts writes, fails every read.
    #[derive(Default)]
    struct Unplugged {
        written: Vec<u8>,
    }

    impl std::io::Read for Unplugged {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("unplugged"))
        }
    }

    impl Write for Unplugged {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Link for Unplugged {
        fn bytes_available(&mut self) -> impactrelay_transport::Result<usize> {
            Err(std::io::Error::other("unplugged").into())
        }

        fn try_clone_link(&self) -> impactrelay_transport::Result<Box<dyn Link>> {
            Err(impactrelay_transport::TransportError::Closed)
        }

        fn describe(&self) -> String {
            "unplugged".to_string()
        }
    }

    #[test]
    fn garbage_between_packets_is_skipped() {
        let adc = MemoryLink::new();
        let mut acq = AcquisitionLoop::new(adc, None, config());

        let mut stream = b"boot noise".to_vec();
        stream.extend(burst_packet(5000));
        stream.extend([0x49; 10]);
        stream.extend(burst_packet(6000));

        let outcomes = acq.process_bytes(&stream);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].info.seq, 2);
        assert!(acq.summary().framer.garbage_bytes > 0);
    }
}
