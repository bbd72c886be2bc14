use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use syncroom_core::config::{
    LimitsConfig, CHAT_HISTORY_LIMIT, HUB_DRAIN_TIMEOUT_MS, STORE_BACKOFF_MS, VERSION_COALESCE_MS,
};
use syncroom_core::types::{ChatMessage, FileCursor, PresenceEntry};
use syncroom_ephemeral::{ChatRing, OperationLog, PresenceRegistry};
use syncroom_ot::Operation;
use syncroom_protocol::ServerFrame;
use syncroom_store::{DocumentStore, StoreError};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout_at, Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::colors::ColorAllocator;
use crate::messages::{HubMessage, SessionHandle};

/// The serialization point for one room.
///
/// Owns membership fanout, the OT edit path, presence, and chat for its
/// room. Exactly one hub task runs per room; FIFO mailbox processing is
/// what makes two concurrent edits see each other through the log window.
pub struct RoomHub {
    room_id: String,
    store: Arc<DocumentStore>,
    presence: Arc<PresenceRegistry>,
    oplog: Arc<OperationLog>,
    chat: Arc<ChatRing>,
    limits: LimitsConfig,
    peers: HashMap<String, SessionHandle>,
    colors: ColorAllocator,
    /// Per-file timestamp (ms) of the last version snapshot, for coalescing.
    last_version_ms: HashMap<String, i64>,
}

enum Delivery {
    Sent,
    Dropped,
    Overloaded,
}

/// Push one frame into a session's bounded queue.
///
/// On a full queue, ephemeral frames (cursor moves, history replays) are
/// dropped; anything else marks the peer overloaded — a dropped
/// `code-update` must force a reconnect so the peer refetches canonical
/// content.
fn deliver(session: &SessionHandle, frame: ServerFrame) -> Delivery {
    use mpsc::error::TrySendError;
    match session.tx.try_send(frame) {
        Ok(()) => Delivery::Sent,
        Err(TrySendError::Full(frame)) => match frame {
            ServerFrame::CursorUpdate { .. } | ServerFrame::ChatHistory { .. } => {
                debug!(session_id = %session.session_id, "queue full, dropping ephemeral frame");
                Delivery::Dropped
            }
            _ => Delivery::Overloaded,
        },
        Err(TrySendError::Closed(_)) => Delivery::Overloaded,
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn wire_code(e: &StoreError) -> &'static str {
    match e {
        StoreError::NotFound { .. } => "NOT_FOUND",
        _ => "TRANSIENT",
    }
}

impl RoomHub {
    pub fn new(
        room_id: String,
        store: Arc<DocumentStore>,
        presence: Arc<PresenceRegistry>,
        oplog: Arc<OperationLog>,
        chat: Arc<ChatRing>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            room_id,
            store,
            presence,
            oplog,
            chat,
            limits,
            peers: HashMap::new(),
            colors: ColorAllocator::new(),
            last_version_ms: HashMap::new(),
        }
    }

    /// Hub task body — runs until `Shutdown` or until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<HubMessage>) {
        info!(room_id = %self.room_id, "room hub started");
        while let Some(msg) = rx.recv().await {
            if matches!(msg, HubMessage::Shutdown) {
                self.shutdown(&mut rx).await;
                break;
            }
            self.handle(msg).await;
        }
        info!(room_id = %self.room_id, "room hub stopped");
    }

    async fn handle(&mut self, msg: HubMessage) {
        match msg {
            HubMessage::Join { session, ack } => self.handle_join(session, ack).await,
            HubMessage::Leave { session_id } => self.handle_leave(&session_id),
            HubMessage::CodeChange {
                session_id,
                file_id,
                operation,
            } => self.handle_code_change(&session_id, &file_id, operation).await,
            HubMessage::CursorPosition {
                session_id,
                file_id,
                line,
                column,
            } => self.handle_cursor(&session_id, file_id, line, column),
            HubMessage::Chat {
                session_id,
                message,
                code_snippet,
            } => self.handle_chat(&session_id, message, code_snippet),
            HubMessage::GetChatHistory { session_id } => self.handle_chat_history(&session_id),
            HubMessage::CreateFile {
                session_id,
                name,
                language,
            } => self.handle_create_file(&session_id, &name, &language).await,
            HubMessage::DeleteFile {
                session_id,
                file_id,
            } => self.handle_delete_file(&session_id, &file_id).await,
            // Handled by the run loop before dispatch.
            HubMessage::Shutdown => {}
        }
    }

    // ── join / leave ─────────────────────────────────────────────────────

    async fn handle_join(&mut self, session: SessionHandle, ack: oneshot::Sender<bool>) {
        let user = session.user.clone();

        // Authoritative permission check on every join.
        let member = self
            .with_retry("room_member", || {
                self.store.room_member(&self.room_id, &user.user_id)
            })
            .await;
        match member {
            Ok(true) => {}
            Ok(false) => {
                info!(room_id = %self.room_id, user_id = %user.user_id, "join rejected: not a member");
                let _ = deliver(
                    &session,
                    ServerFrame::error("FORBIDDEN", "not a member of this room"),
                );
                let _ = ack.send(false);
                return;
            }
            Err(e) => {
                let _ = deliver(&session, ServerFrame::error(wire_code(&e), e.to_string()));
                let _ = ack.send(false);
                return;
            }
        }

        let files = match self
            .with_retry("list_files", || self.store.list_files(&self.room_id))
            .await
        {
            Ok(files) => files,
            Err(e) => {
                let _ = deliver(&session, ServerFrame::error(wire_code(&e), e.to_string()));
                let _ = ack.send(false);
                return;
            }
        };

        // A reconnect from the same user displaces the previous session.
        let stale: Option<String> = self
            .peers
            .values()
            .find(|p| p.user.user_id == user.user_id)
            .map(|p| p.session_id.clone());
        if let Some(stale_id) = stale {
            info!(room_id = %self.room_id, user_id = %user.user_id, "evicting prior session");
            if let Some(prev) = self.peers.remove(&stale_id) {
                prev.cancel.cancel();
            }
        }

        let entry = PresenceEntry {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            color: self.colors.assign(&user.user_id),
            cursor: None,
            session_id: session.session_id.clone(),
            expires_at: 0, // stamped by the registry
        };
        let entry = self.presence.put(&self.room_id, &entry);

        // Snapshots for the joiner, then announce to everyone else.
        let users = self.presence.room(&self.room_id);
        if matches!(
            deliver(&session, ServerFrame::RoomUsers { users }),
            Delivery::Overloaded
        ) || matches!(
            deliver(&session, ServerFrame::RoomFiles { files }),
            Delivery::Overloaded
        ) {
            warn!(room_id = %self.room_id, session_id = %session.session_id, "joiner overloaded during snapshot");
            session.cancel.cancel();
            PresenceRegistry::drop(&self.presence, &self.room_id, &user.user_id);
            self.colors.release(&user.user_id);
            let _ = ack.send(false);
            return;
        }

        self.broadcast(&ServerFrame::UserJoined { user: entry }, None);
        info!(room_id = %self.room_id, user_id = %user.user_id, session_id = %session.session_id, "user joined");
        self.peers.insert(session.session_id.clone(), session);
        let _ = ack.send(true);
    }

    fn handle_leave(&mut self, session_id: &str) {
        if let Some(session) = self.peers.remove(session_id) {
            let user_id = session.user.user_id.clone();
            PresenceRegistry::drop(&self.presence, &self.room_id, &user_id);
            self.colors.release(&user_id);
            info!(room_id = %self.room_id, user_id = %user_id, "user left");
            self.broadcast(&ServerFrame::UserLeft { user_id }, None);
        }
    }

    // ── edits ────────────────────────────────────────────────────────────

    async fn handle_code_change(&mut self, session_id: &str, file_id: &str, operation: Operation) {
        let Some(origin) = self.peers.get(session_id) else {
            return; // raced with a disconnect
        };
        let user_id = origin.user.user_id.clone();
        self.presence.touch(&self.room_id, &user_id);

        // The session identity is authoritative for attribution.
        let mut operation = operation;
        match &mut operation {
            Operation::Insert { user_id: uid, .. } | Operation::Delete { user_id: uid, .. } => {
                *uid = user_id.clone();
            }
        }

        // Rebase onto everything this client has not seen yet.
        let window = self.oplog.list(file_id);
        let transformed = syncroom_ot::transform_against(&operation, &window);

        let file = match self
            .with_retry("load_file", || self.store.load_file(file_id))
            .await
        {
            Ok(file) => file,
            Err(e) => {
                self.reply_error(session_id, wire_code(&e), e.to_string());
                return;
            }
        };
        if file.room_id != self.room_id {
            self.reply_error(session_id, "NOT_FOUND", format!("file not found: {file_id}"));
            return;
        }

        if syncroom_ot::clamps(&file.content, &transformed) {
            warn!(room_id = %self.room_id, file_id, op = ?transformed, "operation out of bounds, clamping");
        }
        let updated = syncroom_ot::apply(&file.content, &transformed);

        // Version snapshot first (pre-save content), coalesced per file.
        let now = now_ms();
        let due = self
            .last_version_ms
            .get(file_id)
            .is_none_or(|last| now - last >= VERSION_COALESCE_MS);
        if due {
            let version = self
                .with_retry("append_version", || {
                    self.store.append_version(file_id, &file.content, &user_id)
                })
                .await;
            if let Err(e) = version {
                self.reply_error(session_id, wire_code(&e), e.to_string());
                return;
            }
            self.last_version_ms.insert(file_id.to_string(), now);
        }

        if let Err(e) = self
            .with_retry("save_content", || self.store.save_content(file_id, &updated))
            .await
        {
            self.reply_error(session_id, wire_code(&e), e.to_string());
            return;
        }

        self.oplog.push(file_id, &transformed);

        self.broadcast(
            &ServerFrame::CodeUpdate {
                file_id: file_id.to_string(),
                operation: transformed,
                user_id,
            },
            Some(session_id),
        );
    }

    // ── presence & chat ──────────────────────────────────────────────────

    fn handle_cursor(&mut self, session_id: &str, file_id: String, line: u32, column: u32) {
        let Some(origin) = self.peers.get(session_id) else {
            return;
        };
        let user_id = origin.user.user_id.clone();

        if let Some(mut entry) = self.presence.get(&self.room_id, &user_id) {
            entry.cursor = Some(FileCursor {
                file_id: file_id.clone(),
                line,
                column,
            });
            self.presence.put(&self.room_id, &entry);
        }

        self.broadcast(
            &ServerFrame::CursorUpdate {
                user_id,
                file_id,
                line,
                column,
            },
            Some(session_id),
        );
    }

    fn handle_chat(&mut self, session_id: &str, message: String, code_snippet: Option<String>) {
        let Some(origin) = self.peers.get(session_id) else {
            return;
        };
        let user = origin.user.clone();
        self.presence.touch(&self.room_id, &user.user_id);

        // Server stamp is authoritative; the sender receives this copy too.
        let entry = ChatMessage {
            id: Uuid::new_v4().to_string(),
            user_id: user.user_id,
            username: user.username,
            message,
            timestamp: now_ms(),
            code_snippet,
        };
        self.chat.push(&self.room_id, &entry);
        self.broadcast(&ServerFrame::ChatMessage(entry), None);
    }

    fn handle_chat_history(&mut self, session_id: &str) {
        let messages = self.chat.recent(&self.room_id, CHAT_HISTORY_LIMIT);
        self.reply(session_id, ServerFrame::ChatHistory { messages });
    }

    // ── file lifecycle ───────────────────────────────────────────────────

    async fn handle_create_file(&mut self, session_id: &str, name: &str, language: &str) {
        // Same admission gate as the edit path: only joined peers mutate.
        if !self.peers.contains_key(session_id) {
            return;
        }
        let created = self
            .with_retry("create_file", || {
                self.store.create_file(&self.room_id, name, language)
            })
            .await;
        match created {
            Ok(file) => {
                info!(room_id = %self.room_id, file_id = %file.id, name, "file created");
                self.broadcast(&ServerFrame::FileCreated { file }, None);
            }
            Err(e) => self.reply_error(session_id, wire_code(&e), e.to_string()),
        }
    }

    async fn handle_delete_file(&mut self, session_id: &str, file_id: &str) {
        if !self.peers.contains_key(session_id) {
            return;
        }
        // Scope check: never delete through a foreign room's hub.
        match self
            .with_retry("load_file", || self.store.load_file(file_id))
            .await
        {
            Ok(file) if file.room_id == self.room_id => {}
            Ok(_) => {
                self.reply_error(session_id, "NOT_FOUND", format!("file not found: {file_id}"));
                return;
            }
            Err(e) => {
                self.reply_error(session_id, wire_code(&e), e.to_string());
                return;
            }
        }

        if let Err(e) = self
            .with_retry("delete_file", || self.store.delete_file(file_id))
            .await
        {
            self.reply_error(session_id, wire_code(&e), e.to_string());
            return;
        }
        self.oplog.clear(file_id);
        self.last_version_ms.remove(file_id);
        info!(room_id = %self.room_id, file_id, "file deleted");
        self.broadcast(
            &ServerFrame::FileDeleted {
                file_id: file_id.to_string(),
            },
            None,
        );
    }

    // ── fanout & teardown ────────────────────────────────────────────────

    /// Deliver to every peer (minus `except`), disconnecting any peer whose
    /// queue cannot absorb a must-deliver frame.
    fn broadcast(&mut self, frame: &ServerFrame, except: Option<&str>) {
        let mut overloaded = Vec::new();
        for (id, session) in &self.peers {
            if Some(id.as_str()) == except {
                continue;
            }
            if matches!(deliver(session, frame.clone()), Delivery::Overloaded) {
                overloaded.push(id.clone());
            }
        }
        for id in overloaded {
            self.disconnect(&id, "outbound queue full");
        }
    }

    fn disconnect(&mut self, session_id: &str, reason: &str) {
        if let Some(session) = self.peers.remove(session_id) {
            warn!(room_id = %self.room_id, session_id, user_id = %session.user.user_id, reason, "disconnecting peer");
            session.cancel.cancel();
            let user_id = session.user.user_id;
            PresenceRegistry::drop(&self.presence, &self.room_id, &user_id);
            self.colors.release(&user_id);
            self.broadcast(&ServerFrame::UserLeft { user_id }, None);
        }
    }

    fn reply(&mut self, session_id: &str, frame: ServerFrame) {
        let Some(session) = self.peers.get(session_id) else {
            return;
        };
        if matches!(deliver(session, frame), Delivery::Overloaded) {
            self.disconnect(session_id, "outbound queue full");
        }
    }

    fn reply_error(&mut self, session_id: &str, code: &str, message: impl Into<String>) {
        self.reply(session_id, ServerFrame::error(code, message));
    }

    /// Drain the mailbox for up to the configured budget, then announce
    /// every departure and close the peers.
    async fn shutdown(&mut self, rx: &mut mpsc::Receiver<HubMessage>) {
        info!(room_id = %self.room_id, peers = self.peers.len(), "room hub shutting down");
        let deadline = Instant::now() + Duration::from_millis(HUB_DRAIN_TIMEOUT_MS);
        while let Ok(Some(msg)) = timeout_at(deadline, rx.recv()).await {
            if matches!(msg, HubMessage::Shutdown) {
                continue;
            }
            self.handle(msg).await;
        }

        let departed: Vec<String> = self
            .peers
            .values()
            .map(|s| s.user.user_id.clone())
            .collect();
        for user_id in departed {
            self.broadcast(&ServerFrame::UserLeft { user_id: user_id.clone() }, None);
            PresenceRegistry::drop(&self.presence, &self.room_id, &user_id);
        }
        for (_, session) in self.peers.drain() {
            session.cancel.cancel();
        }
    }

    /// Run a store call with bounded retries and exponential backoff on
    /// transient failures. Non-transient errors surface immediately.
    async fn with_retry<T>(
        &self,
        what: &'static str,
        mut f: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let attempts = self.limits.store_retry_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            match f() {
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    let backoff =
                        STORE_BACKOFF_MS[(attempt as usize).min(STORE_BACKOFF_MS.len() - 1)];
                    warn!(
                        room_id = %self.room_id,
                        what,
                        attempt,
                        backoff_ms = backoff,
                        error = %e,
                        "transient store failure, retrying"
                    );
                    sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
