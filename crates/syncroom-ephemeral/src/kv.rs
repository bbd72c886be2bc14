use std::time::{Duration, Instant};

use dashmap::DashMap;

/// In-process expiring key–value store.
///
/// Two keyspaces: scalar strings and string lists. Every operation is
/// single-key atomic (one DashMap shard lock) and idempotent under retry.
/// Expiry is lazy: reads drop dead entries, writes replace them. Key
/// shapes (`presence:{room}:{user}`, `pending:{file}`, `chat:{room}`)
/// match a networked list/KV store so one can substitute later.
#[derive(Default)]
pub struct EphemeralStore {
    values: DashMap<String, Scalar>,
    lists: DashMap<String, ListValue>,
}

struct Scalar {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct ListValue {
    items: Vec<String>,
    expires_at: Option<Instant>,
}

fn dead(expires_at: &Option<Instant>) -> bool {
    expires_at.is_some_and(|at| Instant::now() >= at)
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // Read guard must drop before the expired-entry removal below.
        let expired = match self.values.get(key) {
            Some(entry) if !dead(&entry.expires_at) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.values.remove(key);
        }
        None
    }

    pub fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        self.values.insert(
            key.to_string(),
            Scalar {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    pub fn delete(&self, key: &str) {
        self.values.remove(key);
        self.lists.remove(key);
    }

    /// All live scalar entries whose key starts with `prefix`.
    pub fn list_by_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut expired = Vec::new();
        for entry in self.values.iter() {
            if !entry.key().starts_with(prefix) {
                continue;
            }
            if dead(&entry.value().expires_at) {
                expired.push(entry.key().clone());
            } else {
                out.push((entry.key().clone(), entry.value().value.clone()));
            }
        }
        for key in expired {
            self.values.remove(&key);
        }
        out
    }

    /// Append to the list at `key`, creating it if absent.
    pub fn right_push(&self, key: &str, value: &str) {
        let mut entry = self.lists.entry(key.to_string()).or_default();
        if dead(&entry.expires_at) {
            entry.items.clear();
            entry.expires_at = None;
        }
        entry.items.push(value.to_string());
    }

    /// Keep only the last `keep` items of the list at `key`.
    pub fn trim(&self, key: &str, keep: usize) {
        if let Some(mut entry) = self.lists.get_mut(key) {
            let len = entry.items.len();
            if len > keep {
                entry.items.drain(..len - keep);
            }
        }
    }

    /// The full live list at `key`, oldest first.
    pub fn range(&self, key: &str) -> Vec<String> {
        let expired = match self.lists.get(key) {
            Some(entry) if !dead(&entry.expires_at) => return entry.items.clone(),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.lists.remove(key);
        }
        Vec::new()
    }

    /// Set or refresh the TTL on a scalar or list key.
    pub fn expire(&self, key: &str, ttl: Duration) {
        let at = Instant::now() + ttl;
        if let Some(mut entry) = self.values.get_mut(key) {
            entry.expires_at = Some(at);
        }
        if let Some(mut entry) = self.lists.get_mut(key) {
            entry.expires_at = Some(at);
        }
    }
}
