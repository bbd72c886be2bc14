use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use syncroom_core::config::{MAX_PAYLOAD_BYTES, SESSION_QUEUE_DEPTH};
use syncroom_protocol::ServerFrame;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::AppState;
use crate::ws::session::Session;

/// Axum handler — upgrades HTTP to WebSocket at GET /ws.
///
/// The bearer token may arrive on the upgrade (`Authorization: Bearer`
/// header or `?token=`) or later inside the first `join-room` frame.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let token = bearer_token(&headers).or_else(|| query.get("token").cloned());
    ws.on_upgrade(move |socket| handle_connection(socket, state, token))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Per-connection task — lives for the entire session.
///
/// Splits into a reader half (this function's loop) and a writer task
/// draining the bounded outbound queue the room hub pushes into. The
/// cancellation token ties the halves together: whoever fails first
/// cancels, and the hub uses the same token to force-close overloaded
/// peers.
async fn handle_connection(socket: WebSocket, app: Arc<AppState>, token: Option<String>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!(session_id = %session_id, "new session");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(SESSION_QUEUE_DEPTH);
    let cancel = CancellationToken::new();

    let writer_cancel = cancel.clone();
    let mut writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => break,
                frame = rx.recv() => match frame {
                    Some(frame) => {
                        if sink.send(Message::Text(frame.to_json().into())).await.is_err() {
                            writer_cancel.cancel();
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        let _ = sink.close().await;
    });

    let mut session = Session::new(app.clone(), session_id.clone(), tx, cancel.clone());

    // A token on the upgrade authenticates before any frame is read.
    let authed = match token {
        Some(token) => session.authenticate(&token).await,
        None => true,
    };

    if authed {
        let idle = Duration::from_secs(app.config.limits.idle_timeout_seconds);
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => break,
                msg = timeout(idle, stream.next()) => match msg {
                    Err(_) => {
                        info!(session_id = %session_id, "idle timeout, closing session");
                        break;
                    }
                    Ok(None) | Ok(Some(Err(_))) => break,
                    Ok(Some(Ok(msg))) => msg,
                },
            };

            match msg {
                Message::Text(text) => {
                    let text: &str = &text;
                    if text.len() > MAX_PAYLOAD_BYTES {
                        warn!(session_id = %session_id, size = text.len(), "payload too large, closing");
                        break;
                    }
                    if !session.handle_text(text).await {
                        break;
                    }
                }
                Message::Close(_) => break,
                // Ping/Pong are answered by the socket layer.
                _ => {}
            }
        }
    }

    session.close().await;
    // Dropping the session releases the last local sender; the writer
    // drains whatever is queued (terminal error frames included) and
    // exits once the hub lets go of its clone. A slow socket gets a
    // bounded grace period before the hard cancel.
    drop(session);
    if timeout(Duration::from_secs(5), &mut writer).await.is_err() {
        cancel.cancel();
        let _ = writer.await;
    }
    info!(session_id = %session_id, "session closed");
}
