//! Acquisition sessions for impactrelay.
//!
//! An [`AcquisitionLoop`] reads the ADC link, cuts packets with the stream
//! framer, runs each one through the [`PacketProcessor`] (baseline removal,
//! segmentation, validation) and relays accepted events. Session state
//! (threshold, recent packets, packet list, event log) lives in a
//! [`SessionState`] shared behind a mutex so observers can read it while the
//! loop runs.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod state;

pub use acquisition::{AcquisitionLoop, SessionSummary, SharedState, Step};
pub use config::{
    AcquisitionConfig, DEFAULT_ACQUISITION_BAUD, DEFAULT_ACQUISITION_PORT, DEFAULT_HISTORY_CAPACITY,
    DEFAULT_IDLE_SLEEP, SESSION_START_BYTE, SESSION_STOP_BYTE,
};
pub use error::{AcquireError, Result};
pub use pipeline::{PacketOutcome, PacketProcessor, Transmission};
pub use state::{EventLog, EventSummary, PacketHistory, PacketInfo, PeakRecord, SessionState};
