/// Errors that can occur while validating or decoding a packet.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// The packet contains no bytes at all.
    #[error("empty packet")]
    EmptyFrame,

    /// The packet does not begin with the exact start marker run.
    #[error("packet does not start with the start marker (0xB6 x10)")]
    MissingStartMarker,

    /// The packet does not end with the exact end marker run.
    #[error("packet does not end with the end marker (0x49 x10)")]
    MissingEndMarker,

    /// Nothing is left between the markers once trimmed to whole samples.
    #[error("payload is empty after trimming ({payload_len} bytes between markers)")]
    EmptyPayload { payload_len: usize },

    /// The packet is not larger than the configured minimum size.
    #[error("packet too small ({len} bytes, must exceed {min})")]
    Undersized { len: usize, min: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
