use chrono::{DateTime, Duration, Utc};
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

pub mod key;

/// In-memory cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries kept
    pub max_entries: usize,
    /// Fixed expiry measured from insertion
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 32,
            ttl: Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Bounded LRU whose entries expire after a fixed TTL
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<LruCache<String, Entry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl,
        }
    }

    /// Fresh value for `key`; stale entries are dropped
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                debug!("Cache entry expired: {}", key);
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        self.put_at(key.into(), value, Utc::now());
    }

    fn put_at(&self, key: String, value: V, now: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key,
                Entry {
                    value,
                    expires_at: now + self.ttl,
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry_is_returned() {
        let cache = TtlCache::default();
        cache.put("k", 1u32);
        assert_eq!(cache.get("k"), Some(1));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_stale_entry_is_evicted() {
        let cache: TtlCache<u32> = TtlCache::default();
        let then = Utc::now() - Duration::hours(2);
        cache.put_at("k".to_string(), 1, then);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let cache = TtlCache::new(CacheConfig {
            max_entries: 2,
            ttl: Duration::hours(1),
        });
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
    }
}
