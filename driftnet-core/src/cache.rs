//! Bounded TTL cache for collaborator lookups.
//!
//! The upstream lookup services (TMDB, the alias index, token validation)
//! answer the same queries over and over during a browsing session. Each
//! client owns explicit `TtlCache` instances constructed once per process;
//! `clear` exists so tests can reset state without process-global registries.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

struct Entry<V> {
    inserted_at: Instant,
    value: V,
}

/// LRU cache whose entries also expire after a fixed time-to-live.
pub struct TtlCache<K, V> {
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("len", &self.inner.lock().len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    /// Creates a cache holding at most `capacity` entries, each valid for `ttl`.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("cache capacity must be non-zero");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns the cached value for `key` if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        match inner.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                inner.pop(key);
                None
            }
            None => None,
        }
    }

    /// Inserts `value`, evicting the least recently used entry when full.
    pub fn insert(&self, key: K, value: V) {
        self.inner.lock().put(
            key,
            Entry {
                inserted_at: Instant::now(),
                value,
            },
        );
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Number of live entries, expired or not.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Fetches through the cache: returns the cached value or runs `load`,
    /// caching its success.
    pub async fn get_or_try_insert<F, Fut, E>(&self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = load().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let cache = TtlCache::new(4, Duration::from_secs(60));
        assert_eq!(cache.get(&"a"), None);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn test_expiry() {
        let cache = TtlCache::new(4, Duration::from_millis(0));
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), None, "zero ttl entries expire immediately");
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.get(&"a"), None, "oldest entry evicted");
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_clear() {
        let cache = TtlCache::new(4, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_get_or_try_insert_loads_once() {
        let cache: TtlCache<&str, u32> = TtlCache::new(4, Duration::from_secs(60));
        let loaded = cache
            .get_or_try_insert("a", || async { Ok::<_, ()>(7) })
            .await
            .unwrap();
        assert_eq!(loaded, 7);

        // Second lookup must come from the cache, not the loader.
        let loaded = cache
            .get_or_try_insert("a", || async { Err(()) })
            .await
            .unwrap();
        assert_eq!(loaded, 7);
    }
}
