//! Radio relay protocol for impactrelay.
//!
//! Validated events are forwarded over a low-bandwidth serial radio as a
//! binary `PKT` frame (a decimated excerpt around the event) followed by a
//! human-readable status line. The same link carries `SET:<a-t>` threshold
//! commands back from the operator, answered with `THRESHOLD=<n>`.
//!
//! [`RelayLink`] is the sending side; [`RelayStreamDecoder`] splits a
//! captured or live relay stream back into [`RelayMessage`]s.

pub mod client;
pub mod codec;
pub mod command;
pub mod error;
pub mod line;
pub mod link;
pub mod writer;

pub use client::{RelayMessage, RelayStreamDecoder, MAX_CLIENT_FRAME};
pub use codec::{
    build_relay_frame, decode_relay_frame, encode_relay_frame, RelayFrame, DEFAULT_COMPRESSION,
    DEFAULT_CONTEXT, FRAME_TAG, HEADER_SIZE, MAX_SAMPLES,
};
pub use command::{CommandScanner, ThresholdCommand, COMMAND_PREFIX, THRESHOLD_STEP};
pub use error::{RelayError, Result};
pub use line::{
    format_timestamp, loudness, parse_threshold_ack, threshold_ack_line, ParseStatusError,
    StatusLine, LOUDNESS_SCALE, THRESHOLD_ACK_PREFIX,
};
pub use link::{
    RelayConfig, RelayLink, DEFAULT_PRE_SEND_DELAY, DEFAULT_RELAY_BAUD, DEFAULT_RELAY_PORT,
};
pub use writer::RelayWriter;
