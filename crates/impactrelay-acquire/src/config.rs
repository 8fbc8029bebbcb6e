use std::time::Duration;

use impactrelay_detect::{ValidatorConfig, DEFAULT_MIN_GAP, DEFAULT_THRESHOLD};
use impactrelay_frame::FramerConfig;
use impactrelay_relay::RelayConfig;

/// Default acquisition serial device.
pub const DEFAULT_ACQUISITION_PORT: &str = "/dev/serial0";

/// Default acquisition baud rate.
pub const DEFAULT_ACQUISITION_BAUD: u32 = 256_000;

/// Byte written once to the ADC to start streaming.
pub const SESSION_START_BYTE: u8 = 0x11;

/// Byte written to the ADC to stop streaming.
pub const SESSION_STOP_BYTE: u8 = 0x01;

/// Sleep when no bytes are pending.
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Recent decoded packets kept for inspection.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Everything an acquisition session needs besides its links.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionConfig {
    /// Initial detection threshold. Default: 150,000,000.
    pub threshold: i64,
    /// Events closer than this many samples are merged. Default: 1000.
    pub min_gap: usize,
    pub start_byte: u8,
    pub stop_byte: u8,
    /// Default: 2 ms.
    pub idle_sleep: Duration,
    /// Default: 10.
    pub history_capacity: usize,
    pub framer: FramerConfig,
    pub validator: ValidatorConfig,
    pub relay: RelayConfig,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_gap: DEFAULT_MIN_GAP,
            start_byte: SESSION_START_BYTE,
            stop_byte: SESSION_STOP_BYTE,
            idle_sleep: DEFAULT_IDLE_SLEEP,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            framer: FramerConfig::default(),
            validator: ValidatorConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}
