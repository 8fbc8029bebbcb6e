use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Link;

/// Read timeout applied to opened ports.
///
/// Reads are gated on [`Link::bytes_available`], so this only bounds the
/// rare read issued while the driver is still filling its buffer.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial port link (8N1, no flow control).
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    path: String,
    baud_rate: u32,
}

impl SerialLink {
    /// Open a serial port with the default read timeout.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        Self::open_with_timeout(path, baud_rate, DEFAULT_READ_TIMEOUT)
    }

    /// Open a serial port with an explicit read timeout.
    pub fn open_with_timeout(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|source| TransportError::Open {
                port: path.to_string(),
                source,
            })?;

        info!(port = path, baud_rate, "opened serial port");

        Ok(Self {
            port,
            path: path.to_string(),
            baud_rate,
        })
    }

    /// The device path this link was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Discard anything the driver has buffered in either direction.
    pub fn clear_buffers(&self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        debug!(port = %self.path, "cleared serial buffers");
        Ok(())
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl Link for SerialLink {
    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn try_clone_link(&self) -> Result<Box<dyn Link>> {
        let port = self.port.try_clone()?;
        Ok(Box::new(Self {
            port,
            path: self.path.clone(),
            baud_rate: self.baud_rate,
        }))
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.path, self.baud_rate)
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .finish()
    }
}

/// A serial port found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescription {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub name: String,
    /// Port kind: `usb`, `pci`, `bluetooth` or `unknown`.
    pub kind: &'static str,
    /// USB product string when known.
    pub product: Option<String>,
}

/// Enumerate serial ports available on this host.
pub fn available_ports() -> Result<Vec<PortDescription>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, product) = match port.port_type {
                SerialPortType::UsbPort(usb) => ("usb", usb.product),
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortDescription {
                name: port.port_name,
                kind,
                product,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_port_reports_path() {
        let err = SerialLink::open("/dev/impactrelay-does-not-exist", 9600).unwrap_err();
        match err {
            TransportError::Open { port, .. } => {
                assert_eq!(port, "/dev/impactrelay-does-not-exist")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
