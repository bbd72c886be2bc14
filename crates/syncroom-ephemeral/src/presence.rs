use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use syncroom_core::types::PresenceEntry;
use tracing::warn;

use crate::kv::EphemeralStore;

/// Per-room set of active participants.
///
/// One entry per (room, user): an upsert from a new session id evicts the
/// previous one, which is how reconnects displace stale connections.
/// Every write stamps the entry's `expires_at`, so readers (and the wire
/// snapshots built from them) see when a participant goes stale.
pub struct PresenceRegistry {
    kv: Arc<EphemeralStore>,
    ttl: Duration,
}

fn key(room_id: &str, user_id: &str) -> String {
    format!("presence:{room_id}:{user_id}")
}

fn room_prefix(room_id: &str) -> String {
    format!("presence:{room_id}:")
}

impl PresenceRegistry {
    pub fn new(kv: Arc<EphemeralStore>, ttl_seconds: u64) -> Self {
        Self {
            kv,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Upsert a presence entry and return the stored copy, `expires_at`
    /// stamped.
    pub fn put(&self, room_id: &str, entry: &PresenceEntry) -> PresenceEntry {
        let mut entry = entry.clone();
        entry.expires_at = self.expiry_ms();
        self.write(room_id, &entry);
        entry
    }

    pub fn get(&self, room_id: &str, user_id: &str) -> Option<PresenceEntry> {
        let json = self.kv.get(&key(room_id, user_id))?;
        serde_json::from_str(&json).ok()
    }

    /// Everyone currently present in the room. Undecodable entries are
    /// dropped rather than surfaced.
    pub fn room(&self, room_id: &str) -> Vec<PresenceEntry> {
        self.kv
            .list_by_prefix(&room_prefix(room_id))
            .into_iter()
            .filter_map(|(_, json)| serde_json::from_str(&json).ok())
            .collect()
    }

    pub fn drop(&self, room_id: &str, user_id: &str) {
        self.kv.delete(&key(room_id, user_id));
    }

    /// Refresh the TTL (and the stored `expires_at`) on any activity from
    /// this user.
    pub fn touch(&self, room_id: &str, user_id: &str) {
        if let Some(mut entry) = self.get(room_id, user_id) {
            entry.expires_at = self.expiry_ms();
            self.write(room_id, &entry);
        }
    }

    fn expiry_ms(&self) -> i64 {
        Utc::now().timestamp_millis() + self.ttl.as_millis() as i64
    }

    fn write(&self, room_id: &str, entry: &PresenceEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.kv.set_with_ttl(&key(room_id, &entry.user_id), &json, self.ttl),
            Err(e) => warn!(room_id, user_id = %entry.user_id, error = %e, "presence encode failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user_id: &str, session_id: &str) -> PresenceEntry {
        PresenceEntry {
            user_id: user_id.to_string(),
            username: user_id.to_string(),
            color: "#e06c75".to_string(),
            cursor: None,
            session_id: session_id.to_string(),
            expires_at: 0,
        }
    }

    #[test]
    fn one_entry_per_room_user() {
        let registry = PresenceRegistry::new(Arc::new(EphemeralStore::new()), 3600);
        registry.put("r1", &entry("u1", "s-old"));
        registry.put("r1", &entry("u1", "s-new"));

        let room = registry.room("r1");
        assert_eq!(room.len(), 1);
        assert_eq!(room[0].session_id, "s-new");
    }

    #[test]
    fn rooms_are_isolated() {
        let registry = PresenceRegistry::new(Arc::new(EphemeralStore::new()), 3600);
        registry.put("r1", &entry("u1", "s1"));
        registry.put("r2", &entry("u2", "s2"));

        assert_eq!(registry.room("r1").len(), 1);
        assert_eq!(registry.room("r1")[0].user_id, "u1");
    }

    #[test]
    fn drop_removes_presence() {
        let registry = PresenceRegistry::new(Arc::new(EphemeralStore::new()), 3600);
        registry.put("r1", &entry("u1", "s1"));
        registry.drop("r1", "u1");
        assert!(registry.room("r1").is_empty());
        assert!(registry.get("r1", "u1").is_none());
    }

    #[test]
    fn put_stamps_expiry() {
        let registry = PresenceRegistry::new(Arc::new(EphemeralStore::new()), 3600);
        let stamped = registry.put("r1", &entry("u1", "s1"));
        let now = Utc::now().timestamp_millis();
        assert!(stamped.expires_at > now);
        assert!(stamped.expires_at <= now + 3_600_000);
        // The stored copy carries the same stamp.
        assert_eq!(registry.get("r1", "u1").unwrap().expires_at, stamped.expires_at);
    }

    #[test]
    fn touch_refreshes_expiry() {
        let registry = PresenceRegistry::new(Arc::new(EphemeralStore::new()), 3600);
        let stamped = registry.put("r1", &entry("u1", "s1"));
        std::thread::sleep(Duration::from_millis(5));
        registry.touch("r1", "u1");
        assert!(registry.get("r1", "u1").unwrap().expires_at > stamped.expires_at);
    }

    #[test]
    fn touch_on_absent_user_is_a_noop() {
        let registry = PresenceRegistry::new(Arc::new(EphemeralStore::new()), 3600);
        registry.touch("r1", "ghost");
        assert!(registry.get("r1", "ghost").is_none());
    }
}
