use std::sync::Arc;

use dashmap::DashMap;
use syncroom_core::config::{LimitsConfig, HUB_MAILBOX_DEPTH};
use syncroom_ephemeral::{ChatRing, EphemeralStore, OperationLog, PresenceRegistry};
use syncroom_store::DocumentStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::hub::RoomHub;
use crate::messages::HubMessage;

struct HubHandle {
    tx: mpsc::Sender<HubMessage>,
    task: JoinHandle<()>,
}

/// In-process room ownership: at most one hub task is authoritative for a
/// given room at a given time. Hubs spawn lazily on first use and live
/// until the room is dropped or the manager shuts down.
pub struct RoomHubManager {
    store: Arc<DocumentStore>,
    presence: Arc<PresenceRegistry>,
    oplog: Arc<OperationLog>,
    chat: Arc<ChatRing>,
    limits: LimitsConfig,
    hubs: DashMap<String, HubHandle>,
}

impl RoomHubManager {
    pub fn new(store: Arc<DocumentStore>, kv: Arc<EphemeralStore>, limits: LimitsConfig) -> Self {
        Self {
            presence: Arc::new(PresenceRegistry::new(
                kv.clone(),
                limits.presence_ttl_seconds,
            )),
            oplog: Arc::new(OperationLog::new(
                kv.clone(),
                limits.op_log_window,
                limits.op_log_ttl_seconds,
            )),
            chat: Arc::new(ChatRing::new(
                kv,
                limits.chat_ring_size,
                limits.chat_ttl_seconds,
            )),
            store,
            limits,
            hubs: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    /// True when the room exists in the durable store. Checked before a
    /// hub is spawned so bogus room ids never allocate one.
    pub fn room_exists(&self, room_id: &str) -> bool {
        matches!(self.store.get_room(room_id), Ok(Some(_)))
    }

    /// Mailbox of the hub owning `room_id`, spawning the hub on first use.
    pub fn hub(&self, room_id: &str) -> mpsc::Sender<HubMessage> {
        self.hubs
            .entry(room_id.to_string())
            .or_insert_with(|| self.spawn_hub(room_id))
            .tx
            .clone()
    }

    fn spawn_hub(&self, room_id: &str) -> HubHandle {
        let (tx, rx) = mpsc::channel(HUB_MAILBOX_DEPTH);
        let hub = RoomHub::new(
            room_id.to_string(),
            self.store.clone(),
            self.presence.clone(),
            self.oplog.clone(),
            self.chat.clone(),
            self.limits.clone(),
        );
        let task = tokio::spawn(hub.run(rx));
        HubHandle { tx, task }
    }

    /// Revoke the hub for a deleted room: announce departures, stop the
    /// task. Safe to call for rooms that never had a hub.
    pub async fn drop_room(&self, room_id: &str) {
        if let Some((_, handle)) = self.hubs.remove(room_id) {
            info!(room_id, "dropping room hub");
            if handle.tx.send(HubMessage::Shutdown).await.is_err() {
                warn!(room_id, "hub already stopped");
            }
            // Dropping our sender lets the drain loop finish as soon as the
            // last session sender goes away.
            drop(handle.tx);
            let _ = handle.task.await;
        }
    }

    /// Graceful stop of every hub: each drains its mailbox briefly and
    /// broadcasts `user-left` for its participants.
    pub async fn shutdown_all(&self) {
        let handles: Vec<(String, HubHandle)> = {
            let keys: Vec<String> = self.hubs.iter().map(|e| e.key().clone()).collect();
            keys.into_iter()
                .filter_map(|k| self.hubs.remove(&k))
                .collect()
        };
        for (room_id, handle) in handles {
            info!(room_id = %room_id, "stopping room hub");
            let _ = handle.tx.send(HubMessage::Shutdown).await;
            drop(handle.tx);
            let _ = handle.task.await;
        }
    }
}
