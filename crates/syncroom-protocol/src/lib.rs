//! Wire protocol for the session channel.
//!
//! Every frame is a JSON object `{ "event": ..., "data": ... }` with
//! kebab-case event names. Inbound and outbound shapes live here so the
//! gateway and the room hubs agree on a single source of truth.

pub mod frames;

pub use frames::{ClientFrame, ServerFrame};
