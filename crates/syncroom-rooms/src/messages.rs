use syncroom_core::types::UserIdentity;
use syncroom_ot::Operation;
use syncroom_protocol::ServerFrame;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// A connected session as the hub sees it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: String,
    pub user: UserIdentity,
    /// Bounded outbound queue drained by the session's writer task.
    pub tx: mpsc::Sender<ServerFrame>,
    /// Cancelled by the hub to force the socket closed (overload, eviction).
    pub cancel: CancellationToken,
}

/// Inbound mailbox messages, processed strictly FIFO by the owning hub.
#[derive(Debug)]
pub enum HubMessage {
    Join {
        session: SessionHandle,
        /// Resolves true only once the hub has admitted the session.
        /// Rejections (and their error frames) come from the hub itself.
        ack: oneshot::Sender<bool>,
    },
    Leave {
        session_id: String,
    },
    CodeChange {
        session_id: String,
        file_id: String,
        operation: Operation,
    },
    CursorPosition {
        session_id: String,
        file_id: String,
        line: u32,
        column: u32,
    },
    Chat {
        session_id: String,
        message: String,
        code_snippet: Option<String>,
    },
    GetChatHistory {
        session_id: String,
    },
    CreateFile {
        session_id: String,
        name: String,
        language: String,
    },
    DeleteFile {
        session_id: String,
        file_id: String,
    },
    /// Drain, announce departures, and stop the hub task.
    Shutdown,
}
