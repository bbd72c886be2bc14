//! Operational-transform engine for concurrent plain-text edits.
//!
//! Pure and infallible: no I/O, no clocks, no allocation beyond the
//! returned values. Positions are UTF-16 code-unit offsets (the unit the
//! editor widget reports); out-of-range positions clamp rather than fail.

pub mod compose;
pub mod op;
pub mod transform;

pub use compose::compose;
pub use op::{apply, clamps, Operation};
pub use transform::{transform, transform_against};
