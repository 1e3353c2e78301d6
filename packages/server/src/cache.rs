//! TTL cache for expensive read endpoints.
//!
//! Callers key entries by request path plus the dataset's `updated_at`,
//! so a dataset change naturally invalidates its cached views without
//! any explicit eviction call.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// In-process response cache with a fixed per-entry TTL.
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl ResponseCache {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the cached value for `key`, if it has not expired.
    ///
    /// Expired entries, whichever key they belong to, are pruned on
    /// every lookup.
    ///
    /// # Panics
    ///
    /// Panics if the `Mutex` is poisoned.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("response cache mutex poisoned");
        entries.retain(|_, entry| entry.expires_at > now);
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// # Panics
    ///
    /// Panics if the `Mutex` is poisoned.
    pub fn put(&self, key: &str, value: Value) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        let mut entries = self.entries.lock().expect("response cache mutex poisoned");
        entries.insert(key.to_string(), entry);
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use serde_json::json;

    use super::*;

    #[test]
    fn entries_expire_after_the_ttl() {
        let cache = ResponseCache::new(Duration::from_millis(40));
        cache.put("report", json!({"n": 1}));
        assert_eq!(cache.get("report"), Some(json!({"n": 1})));

        sleep(Duration::from_millis(60));
        assert_eq!(cache.get("report"), None);
    }

    #[test]
    fn lookups_prune_expired_entries_under_other_keys() {
        let cache = ResponseCache::new(Duration::from_millis(40));
        cache.put("stale", json!(1));
        sleep(Duration::from_millis(60));

        cache.put("fresh", json!(2));
        assert_eq!(cache.get("fresh"), Some(json!(2)));
        assert_eq!(cache.entries.lock().unwrap().len(), 1);
    }

    #[test]
    fn put_overwrites_and_get_misses_unknown_keys() {
        let cache = ResponseCache::default();
        assert_eq!(cache.get("missing"), None);

        cache.put("key", json!(1));
        cache.put("key", json!(2));
        assert_eq!(cache.get("key"), Some(json!(2)));
    }
}
