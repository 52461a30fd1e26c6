use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Notified after any mutation that affects a list or detail view.
///
/// Keys are plain strings (`resource:<id>`); patterns end in `*` and match
/// every key sharing the prefix (`resources:*`).
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, key: &str);
    fn invalidate_pattern(&self, pattern: &str);
}

pub fn resource_key(id: &str) -> String {
    format!("resource:{}", id)
}

pub fn suggestion_key(id: &str) -> String {
    format!("suggestion:{}", id)
}

pub const RESOURCES_PATTERN: &str = "resources:*";
pub const SUGGESTIONS_PATTERN: &str = "suggestions:*";

struct CachedEntry {
    value: Value,
    stored_at: Instant,
}

/// In-process TTL cache for JSON responses.
pub struct MemoryCache {
    entries: DashMap<String, CachedEntry>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        {
            let entry = self.entries.get(key)?;
            if entry.stored_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    pub fn put(&self, key: impl Into<String>, value: Value) {
        self.entries.insert(
            key.into(),
            CachedEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheInvalidator for MemoryCache {
    fn invalidate(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            debug!("🧹 Cache entry invalidated: {}", key);
        }
    }

    fn invalidate_pattern(&self, pattern: &str) {
        match pattern.strip_suffix('*') {
            Some(prefix) => {
                let before = self.entries.len();
                self.entries.retain(|k, _| !k.starts_with(prefix));
                let removed = before.saturating_sub(self.entries.len());
                if removed > 0 {
                    debug!("🧹 {} cache entries invalidated by {}", removed, pattern);
                }
            }
            None => self.invalidate(pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_get_and_invalidate() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.put("suggestion:1", json!({"name": "rust"}));
        assert_eq!(cache.get("suggestion:1"), Some(json!({"name": "rust"})));

        cache.invalidate("suggestion:1");
        assert!(cache.get("suggestion:1").is_none());
    }

    #[test]
    fn test_pattern_only_touches_prefix() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.put("suggestions:list:a", json!(1));
        cache.put("suggestions:list:b", json!(2));
        cache.put("resources:list:a", json!(3));

        cache.invalidate_pattern(SUGGESTIONS_PATTERN);

        assert_eq!(cache.len(), 1);
        assert!(cache.get("resources:list:a").is_some());
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = MemoryCache::new(Duration::ZERO);
        cache.put("k", json!(true));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }
}
