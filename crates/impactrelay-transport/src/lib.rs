//! Link abstraction for impactrelay.
//!
//! Provides a unified interface over the byte links the relay talks to:
//! - Serial ports (the ADC acquisition link and the radio relay link)
//! - In-memory duplex links (offline replay, loopback testing)
//!
//! This is the lowest layer of impactrelay. Everything else builds on top of
//! the [`Link`] trait provided here.

pub mod error;
pub mod memory;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryLink;
pub use serial::{available_ports, PortDescription, SerialLink, DEFAULT_READ_TIMEOUT};
pub use traits::{read_available, Link};
