//! Detect impact events on an ADC sample stream and relay them over a serial
//! radio.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte links (serial ports, in-memory duplex)
//! - [`frame`]: Marker-delimited packet framing and sample decoding
//! - [`detect`]: Threshold segmentation and event validation
//! - [`relay`]: Relay wire protocol, threshold commands, stream decoding
//! - [`acquire`]: Acquisition loop and session state (behind `acquire` feature)

/// Re-export transport types.
pub mod transport {
    pub use impactrelay_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use impactrelay_frame::*;
}

/// Re-export detection types.
pub mod detect {
    pub use impactrelay_detect::*;
}

/// Re-export relay protocol types.
pub mod relay {
    pub use impactrelay_relay::*;
}

/// Re-export acquisition types (requires `acquire` feature).
#[cfg(feature = "acquire")]
pub mod acquire {
    pub use impactrelay_acquire::*;
}
