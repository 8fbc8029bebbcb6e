//! Event detection over decoded sample arrays.
//!
//! - [`segment`] finds windows whose magnitude crosses a threshold and merges
//!   windows separated by short gaps.
//! - [`Validator`] rejects windows that are too quiet, impossibly loud, or a
//!   single needle-like spike.
//!
//! Both are pure functions of their inputs; the active threshold is passed
//! in by the caller on every packet.

pub mod segment;
pub mod validate;

pub use segment::{
    merge_windows, padded_range, remove_baseline, segment, EventWindow, DEFAULT_MIN_GAP,
    DEFAULT_THRESHOLD,
};
pub use validate::{is_valid, peak_abs, Rejection, Validator, ValidatorConfig, DEFAULT_CONTEXT};
