use serde::{Deserialize, Serialize};

/// Immutable identity established by the identity gate. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub username: String,
}

/// A collaboration room. Owned by whichever hub task is currently serving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// Random URL-safe code handed out for joining.
    pub invite_code: String,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

/// A file inside a room. `content` is the canonical state; every edit
/// funnels through the single hub owning the room.
///
/// Positions inside `content` are UTF-16 code-unit offsets, matching the
/// editor widget semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomFile {
    pub id: String,
    pub room_id: String,
    pub name: String,
    pub content: String,
    pub language: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Append-only snapshot of a file's content *before* a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersion {
    pub id: String,
    pub file_id: String,
    pub content: String,
    pub user_id: String,
    pub created_at: String,
}

/// Ephemeral record that a user is connected to a room.
///
/// At most one entry exists per (room, user); a reconnect evicts the prior
/// session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: String,
    pub username: String,
    /// Stable cursor color assigned by the hub for this presence lifetime.
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<FileCursor>,
    pub session_id: String,
    /// Absolute expiry, milliseconds since epoch. Stamped by the presence
    /// registry and refreshed on any activity from the user.
    pub expires_at: i64,
}

/// A cursor pinned to a specific file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCursor {
    pub file_id: String,
    pub line: u32,
    pub column: u32,
}

/// One chat entry. Never transformed; delivery is plain fanout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    /// Server-assigned milliseconds since epoch.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
}
