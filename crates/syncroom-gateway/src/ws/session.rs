use std::sync::Arc;

use syncroom_core::types::UserIdentity;
use syncroom_protocol::{ClientFrame, ServerFrame};
use syncroom_rooms::{HubMessage, SessionHandle};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::AppState;

/// Connection lifecycle. `Closed` is implicit: the reader loop ends and
/// [`Session::close`] notifies the hub.
enum SessionState {
    Connecting,
    Authenticated {
        user: UserIdentity,
    },
    InRoom {
        user: UserIdentity,
        room_id: String,
        hub: mpsc::Sender<HubMessage>,
    },
}

/// Per-connection state machine bridging inbound frames and the room hub.
pub struct Session {
    app: Arc<AppState>,
    session_id: String,
    tx: mpsc::Sender<ServerFrame>,
    cancel: CancellationToken,
    state: SessionState,
}

impl Session {
    pub fn new(
        app: Arc<AppState>,
        session_id: String,
        tx: mpsc::Sender<ServerFrame>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            app,
            session_id,
            tx,
            cancel,
            state: SessionState::Connecting,
        }
    }

    /// Verify an upgrade-time token. False means the connection must close.
    pub async fn authenticate(&mut self, token: &str) -> bool {
        match self.app.verifier.verify(token) {
            Ok(user) => {
                info!(session_id = %self.session_id, user_id = %user.user_id, "session authenticated");
                self.state = SessionState::Authenticated { user };
                true
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "authentication failed");
                self.send(ServerFrame::error(e.code(), e.to_string())).await;
                false
            }
        }
    }

    /// Process one inbound text frame. Returns false when the session must
    /// close (protocol violation or failed authentication).
    pub async fn handle_text(&mut self, text: &str) -> bool {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "malformed frame, closing");
                self.send(ServerFrame::error("PROTOCOL_ERROR", "malformed frame"))
                    .await;
                return false;
            }
        };

        match frame {
            ClientFrame::JoinRoom { room_id, token } => self.handle_join(room_id, token).await,
            ClientFrame::LeaveRoom => self.handle_leave().await,
            ClientFrame::CodeChange { file_id, operation } => {
                let msg = HubMessage::CodeChange {
                    session_id: self.session_id.clone(),
                    file_id,
                    operation,
                };
                self.forward(msg).await
            }
            ClientFrame::CursorPosition {
                file_id,
                line,
                column,
            } => {
                let msg = HubMessage::CursorPosition {
                    session_id: self.session_id.clone(),
                    file_id,
                    line,
                    column,
                };
                self.forward(msg).await
            }
            ClientFrame::ChatMessage {
                message,
                code_snippet,
            } => {
                let msg = HubMessage::Chat {
                    session_id: self.session_id.clone(),
                    message,
                    code_snippet,
                };
                self.forward(msg).await
            }
            ClientFrame::GetChatHistory => {
                let msg = HubMessage::GetChatHistory {
                    session_id: self.session_id.clone(),
                };
                self.forward(msg).await
            }
            ClientFrame::CreateFile { name, language } => {
                let msg = HubMessage::CreateFile {
                    session_id: self.session_id.clone(),
                    name,
                    language,
                };
                self.forward(msg).await
            }
            ClientFrame::DeleteFile { file_id } => {
                let msg = HubMessage::DeleteFile {
                    session_id: self.session_id.clone(),
                    file_id,
                };
                self.forward(msg).await
            }
        }
    }

    /// Notify the hub on teardown, whatever the cause.
    pub async fn close(&mut self) {
        if let SessionState::InRoom { hub, room_id, .. } = &self.state {
            info!(session_id = %self.session_id, room_id = %room_id, "session leaving room");
            let _ = hub
                .send(HubMessage::Leave {
                    session_id: self.session_id.clone(),
                })
                .await;
        }
        self.state = SessionState::Connecting;
    }

    async fn handle_join(&mut self, room_id: String, token: Option<String>) -> bool {
        if matches!(self.state, SessionState::InRoom { .. }) {
            self.invalid_state().await;
            return true;
        }

        // The gate runs again on every join when a token is attached.
        let user = match token {
            Some(token) => match self.app.verifier.verify(&token) {
                Ok(user) => user,
                Err(e) => {
                    warn!(session_id = %self.session_id, error = %e, "join authentication failed");
                    self.send(ServerFrame::error(e.code(), e.to_string())).await;
                    return false;
                }
            },
            None => match &self.state {
                SessionState::Authenticated { user } => user.clone(),
                _ => {
                    self.send(ServerFrame::error("UNAUTHENTICATED", "missing bearer token"))
                        .await;
                    return false;
                }
            },
        };

        if !self.app.rooms.room_exists(&room_id) {
            self.send(ServerFrame::error(
                "NOT_FOUND",
                format!("room not found: {room_id}"),
            ))
            .await;
            self.state = SessionState::Authenticated { user };
            return true;
        }

        // Keep the users table current for this identity.
        if let Err(e) = self
            .app
            .rooms
            .store()
            .upsert_user(&user.user_id, &user.username)
        {
            warn!(session_id = %self.session_id, error = %e, "user upsert failed");
        }

        let hub = self.app.rooms.hub(&room_id);
        let handle = SessionHandle {
            session_id: self.session_id.clone(),
            user: user.clone(),
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        };
        let (ack_tx, ack_rx) = oneshot::channel();
        if hub
            .send(HubMessage::Join {
                session: handle,
                ack: ack_tx,
            })
            .await
            .is_err()
        {
            self.send(ServerFrame::error("TRANSIENT", "room is shutting down"))
                .await;
            self.state = SessionState::Authenticated { user };
            return true;
        }

        // InRoom only once the hub has admitted us. On rejection the hub
        // has already delivered the error frame.
        match ack_rx.await {
            Ok(true) => {
                self.state = SessionState::InRoom { user, room_id, hub };
            }
            Ok(false) => {
                self.state = SessionState::Authenticated { user };
            }
            Err(_) => {
                self.send(ServerFrame::error("TRANSIENT", "room is shutting down"))
                    .await;
                self.state = SessionState::Authenticated { user };
            }
        }
        true
    }

    async fn handle_leave(&mut self) -> bool {
        match std::mem::replace(&mut self.state, SessionState::Connecting) {
            SessionState::InRoom { user, room_id, hub } => {
                info!(session_id = %self.session_id, room_id = %room_id, "session leaving room");
                let _ = hub
                    .send(HubMessage::Leave {
                        session_id: self.session_id.clone(),
                    })
                    .await;
                self.state = SessionState::Authenticated { user };
            }
            other => {
                self.state = other;
                self.invalid_state().await;
            }
        }
        true
    }

    /// Forward a room-scoped message; outside a room it is an error reply.
    async fn forward(&mut self, msg: HubMessage) -> bool {
        let (hub, user) = match &self.state {
            SessionState::InRoom { hub, user, .. } => (hub.clone(), user.clone()),
            _ => {
                self.invalid_state().await;
                return true;
            }
        };
        if hub.send(msg).await.is_err() {
            // Hub gone: the room was deleted or the server is draining.
            self.send(ServerFrame::error("NOT_FOUND", "room closed"))
                .await;
            self.state = SessionState::Authenticated { user };
        }
        true
    }

    async fn invalid_state(&self) {
        self.send(ServerFrame::error("PROTOCOL_ERROR", "invalid state"))
            .await;
    }

    async fn send(&self, frame: ServerFrame) {
        let _ = self.tx.send(frame).await;
    }
}
