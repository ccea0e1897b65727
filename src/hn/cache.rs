//! Short-lived response cache for one ingestion pass.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct Entry {
    value: serde_json::Value,
    inserted_at: Instant,
}

/// URL-keyed response cache with time-based expiry.
///
/// Scoped to a single ingestion pass: the orchestrator clears it at the start
/// of every run. Only expiry-based eviction is implemented; callers go through
/// `get`/`put` so a size bound can be added here without touching them.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Look up a cached response. Expired entries are dropped and reported as
    /// absent.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a response.
    pub async fn put(&self, key: &str, value: serde_json::Value) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry. Called at the start of each run so nothing leaks
    /// across passes.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of live entries (expired entries may still be counted until
    /// their next lookup).
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
