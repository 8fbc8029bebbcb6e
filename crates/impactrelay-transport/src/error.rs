/// Errors that can occur on a link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the named serial port.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    /// The serial driver reported an error after the port was opened.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on the link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link has been closed.
    #[error("link closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Whether the OS refused access to the device.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Open { source, .. } | Self::Serial(source) => {
                source.kind() == serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied)
            }
            Self::Io(err) => err.kind() == std::io::ErrorKind::PermissionDenied,
            Self::Closed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_is_detected_through_open() {
        let err = TransportError::Open {
            port: "/dev/ttyS0".to_string(),
            source: serialport::Error::new(
                serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
                "denied",
            ),
        };
        assert!(err.is_permission_denied());
        assert!(!TransportError::Closed.is_permission_denied());
    }
}
