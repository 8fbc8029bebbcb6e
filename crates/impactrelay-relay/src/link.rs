use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use impactrelay_transport::{read_available, Link};
use tracing::{debug, info};

use crate::codec::{RelayFrame, DEFAULT_COMPRESSION, DEFAULT_CONTEXT};
use crate::command::{CommandScanner, ThresholdCommand};
use crate::error::Result;
use crate::line::{threshold_ack_line, StatusLine};
use crate::writer::RelayWriter;

/// Default relay serial device.
pub const DEFAULT_RELAY_PORT: &str = "/dev/ttyUSB0";

/// Default relay baud rate.
pub const DEFAULT_RELAY_BAUD: u32 = 9600;

/// Pause before each binary frame.
pub const DEFAULT_PRE_SEND_DELAY: Duration = Duration::from_millis(10);

/// Relay transmission settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Decimation factor for event excerpts. Default: 4.
    pub compression: u16,
    /// Samples of context on each side of an event. Default: 300.
    pub context: usize,
    /// Byte sent right before each binary frame. Default: `\r`.
    pub lead_in: Option<u8>,
    /// Pause before each binary frame. Default: 10 ms.
    pub pre_send_delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION,
            context: DEFAULT_CONTEXT,
            lead_in: Some(b'\r'),
            pre_send_delay: DEFAULT_PRE_SEND_DELAY,
        }
    }
}

struct CommandReader {
    link: Box<dyn Link>,
    scanner: CommandScanner,
}

/// Outbound event relay and inbound command channel over one link.
///
/// The link is split into a write half and a read half, each behind its own
/// lock. Every transmission holds the write lock for its whole duration, so
/// frames and lines from concurrent senders never interleave on the wire.
/// `RelayLink` is `Sync`; share it with `Arc`.
pub struct RelayLink {
    writer: Mutex<RelayWriter<Box<dyn Link>>>,
    reader: Mutex<CommandReader>,
    config: RelayConfig,
    name: String,
}

impl RelayLink {
    pub fn new(link: Box<dyn Link>) -> Result<Self> {
        Self::with_config(link, RelayConfig::default())
    }

    pub fn with_config(link: Box<dyn Link>, config: RelayConfig) -> Result<Self> {
        let read_half = link.try_clone_link()?;
        let name = link.describe();
        info!(link = %name, compression = config.compression, "relay link ready");

        Ok(Self {
            writer: Mutex::new(RelayWriter::with_lead_in(link, config.lead_in)),
            reader: Mutex::new(CommandReader {
                link: read_half,
                scanner: CommandScanner::new(),
            }),
            config,
            name,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Name of the underlying link.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send an event frame followed by its status line, as one unit.
    pub fn send_event(&self, frame: &RelayFrame, status: &StatusLine) -> Result<()> {
        let mut writer = self.lock_writer();
        std::thread::sleep(self.config.pre_send_delay);
        writer.send_frame(frame)?;
        writer.send_line(&status.render())?;
        debug!(seq = frame.seq, samples = frame.samples.len(), "relayed event");
        Ok(())
    }

    /// Send one text line; CRLF is appended when missing.
    pub fn send_line(&self, line: &str) -> Result<()> {
        self.lock_writer().send_line(line)
    }

    /// Acknowledge an applied threshold with `THRESHOLD=<n>`.
    pub fn send_threshold_ack(&self, threshold: i64) -> Result<()> {
        self.send_line(&threshold_ack_line(threshold))
    }

    /// Read whatever is pending and return the newest threshold command.
    ///
    /// Never blocks on an idle link.
    pub fn poll_command(&self) -> Result<Option<ThresholdCommand>> {
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        let bytes = read_available(&mut reader.link)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(reader.scanner.push(&bytes))
    }

    fn lock_writer(&self) -> MutexGuard<'_, RelayWriter<Box<dyn Link>>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RelayLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayLink")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}
