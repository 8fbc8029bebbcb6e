use impactrelay_frame::FrameError;
use impactrelay_relay::RelayError;
use impactrelay_transport::TransportError;

/// Errors that can occur while running an acquisition session.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// The acquisition link failed.
    #[error("acquisition link error: {0}")]
    Transport(#[from] TransportError),

    /// Writing a control byte failed.
    #[error("acquisition I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A packet could not be decoded.
    #[error("packet decode failed: {0}")]
    Frame(#[from] FrameError),

    /// The relay link failed.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),
}

pub type Result<T> = std::result::Result<T, AcquireError>;
