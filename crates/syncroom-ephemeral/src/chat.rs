use std::sync::Arc;
use std::time::Duration;

use syncroom_core::types::ChatMessage;
use tracing::warn;

use crate::kv::EphemeralStore;

/// Per-room ring of recent chat messages. Plain fanout data — never
/// transformed, bounded, and expired after a day of silence.
pub struct ChatRing {
    kv: Arc<EphemeralStore>,
    ring: usize,
    ttl: Duration,
}

fn key(room_id: &str) -> String {
    format!("chat:{room_id}")
}

impl ChatRing {
    pub fn new(kv: Arc<EphemeralStore>, ring: usize, ttl_seconds: u64) -> Self {
        Self {
            kv,
            ring,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    pub fn push(&self, room_id: &str, message: &ChatMessage) {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                warn!(room_id, error = %e, "chat encode failed");
                return;
            }
        };
        let key = key(room_id);
        self.kv.right_push(&key, &json);
        self.kv.trim(&key, self.ring);
        self.kv.expire(&key, self.ttl);
    }

    /// The most recent `limit` messages in send order (oldest first).
    pub fn recent(&self, room_id: &str, limit: usize) -> Vec<ChatMessage> {
        let items = self.kv.range(&key(room_id));
        let skip = items.len().saturating_sub(limit);
        items[skip..]
            .iter()
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(i: i64) -> ChatMessage {
        ChatMessage {
            id: format!("m-{i}"),
            user_id: "u1".to_string(),
            username: "ada".to_string(),
            message: format!("hello {i}"),
            timestamp: i,
            code_snippet: None,
        }
    }

    #[test]
    fn recent_returns_send_order() {
        let ring = ChatRing::new(Arc::new(EphemeralStore::new()), 100, 86_400);
        for i in 0..5 {
            ring.push("r1", &msg(i));
        }
        let recent = ring.recent("r1", 50);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].timestamp, 0);
        assert_eq!(recent[4].timestamp, 4);
    }

    #[test]
    fn recent_limit_takes_the_newest() {
        let ring = ChatRing::new(Arc::new(EphemeralStore::new()), 100, 86_400);
        for i in 0..80 {
            ring.push("r1", &msg(i));
        }
        let recent = ring.recent("r1", 50);
        assert_eq!(recent.len(), 50);
        assert_eq!(recent[0].timestamp, 30);
        assert_eq!(recent[49].timestamp, 79);
    }

    #[test]
    fn ring_is_bounded() {
        let ring = ChatRing::new(Arc::new(EphemeralStore::new()), 100, 86_400);
        for i in 0..130 {
            ring.push("r1", &msg(i));
        }
        let all = ring.recent("r1", usize::MAX);
        assert_eq!(all.len(), 100);
        assert_eq!(all[0].timestamp, 30);
    }
}
