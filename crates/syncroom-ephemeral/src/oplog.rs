use std::sync::Arc;
use std::time::Duration;

use syncroom_ot::Operation;
use tracing::warn;

use crate::kv::EphemeralStore;

/// Per-file window of recently applied operations, the transform basis
/// for late-arriving concurrent edits.
///
/// Bounded to the last `window` entries and expired after `ttl` of
/// inactivity. Losing the window is safe: stored content is always
/// current, so an empty window just means nothing to transform against.
pub struct OperationLog {
    kv: Arc<EphemeralStore>,
    window: usize,
    ttl: Duration,
}

fn key(file_id: &str) -> String {
    format!("pending:{file_id}")
}

impl OperationLog {
    pub fn new(kv: Arc<EphemeralStore>, window: usize, ttl_seconds: u64) -> Self {
        Self {
            kv,
            window,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Append an applied (already transformed) operation, trim to the
    /// window, and refresh the inactivity TTL.
    pub fn push(&self, file_id: &str, op: &Operation) {
        let json = match serde_json::to_string(op) {
            Ok(json) => json,
            Err(e) => {
                warn!(file_id, error = %e, "operation encode failed");
                return;
            }
        };
        let key = key(file_id);
        self.kv.right_push(&key, &json);
        self.kv.trim(&key, self.window);
        self.kv.expire(&key, self.ttl);
    }

    /// The current window, oldest first.
    pub fn list(&self, file_id: &str) -> Vec<Operation> {
        self.kv
            .range(&key(file_id))
            .iter()
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect()
    }

    pub fn clear(&self, file_id: &str) {
        self.kv.delete(&key(file_id));
    }
}
