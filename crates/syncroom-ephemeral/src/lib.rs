//! Ephemeral per-room state: presence, operation-log windows, chat rings.
//!
//! Everything here is permissible data loss. A restart loses presence and
//! transform windows; stored file content stays authoritative, so missing
//! entries merely skip transformation.

pub mod chat;
pub mod kv;
pub mod oplog;
pub mod presence;

pub use chat::ChatRing;
pub use kv::EphemeralStore;
pub use oplog::OperationLog;
pub use presence::PresenceRegistry;
