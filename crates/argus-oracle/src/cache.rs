use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    value: Value,
    inserted_at: Instant,
}

/// TTL cache for ground-truth lookups. Expired entries are retained so the
/// client can serve stale data while the circuit is open; `get_fresh` never
/// returns them.
pub struct TtlCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn get_fresh(&self, key: &str) -> Option<Value> {
        self.entries
            .get(key)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    /// Any cached value regardless of age. Only for degraded serving.
    pub fn get_stale(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries older than the TTL by the given factor; keeps the map
    /// bounded without losing recently expired stale-serving candidates.
    pub fn evict_older_than(&mut self, factor: u32) {
        let horizon = self.ttl * factor;
        self.entries.retain(|_, e| e.inserted_at.elapsed() < horizon);
    }
}
