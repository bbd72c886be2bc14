use serde::{Deserialize, Serialize};
use syncroom_core::types::{ChatMessage, PresenceEntry, RoomFile};
use syncroom_ot::Operation;

/// Client → Server frame.
/// Wire: `{ "event": "code-change", "data": { "file_id": ..., "operation": {...} } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientFrame {
    JoinRoom {
        room_id: String,
        /// Bearer token, required unless already presented on the upgrade.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    LeaveRoom,
    CodeChange {
        file_id: String,
        operation: Operation,
    },
    CursorPosition {
        file_id: String,
        line: u32,
        column: u32,
    },
    ChatMessage {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code_snippet: Option<String>,
    },
    GetChatHistory,
    CreateFile {
        name: String,
        language: String,
    },
    DeleteFile {
        file_id: String,
    },
}

impl ClientFrame {
    /// Parse one inbound text frame. A parse failure is a protocol
    /// violation — the session endpoint closes on it.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Server → Client frame. Event names mirror the inbound set plus the
/// snapshot/fanout events emitted by the room hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerFrame {
    RoomUsers {
        users: Vec<PresenceEntry>,
    },
    RoomFiles {
        files: Vec<RoomFile>,
    },
    UserJoined {
        user: PresenceEntry,
    },
    UserLeft {
        user_id: String,
    },
    CodeUpdate {
        file_id: String,
        operation: Operation,
        user_id: String,
    },
    CursorUpdate {
        user_id: String,
        file_id: String,
        line: u32,
        column: u32,
    },
    ChatMessage(ChatMessage),
    ChatHistory {
        messages: Vec<ChatMessage>,
    },
    FileCreated {
        file: RoomFile,
    },
    FileDeleted {
        file_id: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerFrame {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Serialize for the socket. Frame shapes contain no non-serializable
    /// values, so this is infallible in practice.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
