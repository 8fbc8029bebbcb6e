//! Marker-delimited packet framing for the ADC acquisition stream.
//!
//! The ADC front end emits packets shaped as:
//! - A 10-byte start marker (`0xB6` repeated)
//! - A payload of big-endian signed 32-bit samples
//! - A 10-byte end marker (`0x49` repeated)
//!
//! There is no length prefix and no checksum. [`StreamFramer`] owns the
//! growing receive buffer and cuts complete packets out of it;
//! [`decode_payload`] turns a packet into its sample array.

pub mod codec;
pub mod error;
pub mod framer;

pub use codec::{
    decode_payload, find_marker, rfind_marker, scan_frame, ByteFrame, Scan, END_BYTE, END_MARKER,
    MARKER_LEN, SAMPLE_SIZE, START_BYTE, START_MARKER,
};
pub use error::{FrameError, Result};
pub use framer::{FramerConfig, FramerStats, StreamFramer, DEFAULT_MAX_BUFFER_LEN, DEFAULT_MIN_FRAME_LEN};
