//! Room hubs: one task per room owning all of that room's state.
//!
//! Sessions never touch room state directly: they send [`HubMessage`]s
//! into the hub's bounded mailbox and receive server frames on their own
//! bounded outbound queue. The mailbox is the only lock-like construct;
//! FIFO processing is what linearizes concurrent edits.

pub mod colors;
pub mod hub;
pub mod manager;
pub mod messages;

pub use manager::RoomHubManager;
pub use messages::{HubMessage, SessionHandle};
