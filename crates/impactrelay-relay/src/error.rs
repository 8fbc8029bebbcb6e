use impactrelay_transport::TransportError;

/// Errors that can occur while encoding, decoding or sending relay traffic.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The context window around an event is empty after clipping.
    #[error("empty relay window (event {start}..={end}, {len} samples)")]
    EmptyWindow { start: usize, end: usize, len: usize },

    /// The decimated window does not fit the 16-bit sample count.
    #[error("too many samples for one relay frame ({count}, max {max})")]
    TooManySamples { count: usize, max: usize },

    /// The window offset does not fit the 32-bit offset field.
    #[error("window offset {0} does not fit in 32 bits")]
    OffsetOutOfRange(usize),

    /// The buffer does not start with the `PKT` tag.
    #[error("invalid relay frame tag (expected \"PKT\")")]
    InvalidTag,

    /// Text that is not a `SET:<a-t>` command.
    #[error("invalid threshold command: {0:?}")]
    InvalidCommand(String),

    /// An I/O error occurred while writing to the relay link.
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying link failed.
    #[error("relay transport error: {0}")]
    Transport(#[from] TransportError),

    /// The link accepted zero bytes.
    #[error("relay link closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, RelayError>;
