//! In-memory response cache with a fixed time-to-live.
//!
//! Expiry is lazy: a stale entry is only noticed (and dropped) when its key is
//! read again. Keys that are never requested again keep their last entry
//! until the process exits.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// How long an aggregated result is served before it is rebuilt.
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry<V> {
    stored_at: Instant,
    value: V,
}

/// A thread-safe map from key to `(timestamp, value)`.
///
/// `get` clones the value out so the lock is never held across an `.await`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use pass_proxy::cache::TtlCache;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let cache = TtlCache::new(Duration::from_secs(60));
/// cache.put(42_u64, vec!["vip"]);
/// assert_eq!(cache.get(&42), Some(vec!["vip"]));
/// assert_eq!(cache.get(&7), None);
/// # });
/// ```
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the value for `key` if it was stored less than one TTL ago.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let fresh = entries
            .get(key)
            .map(|entry| entry.stored_at.elapsed() < self.ttl)?;

        if fresh {
            entries.get(key).map(|entry| entry.value.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    /// Stores `value` stamped with the current time, replacing any previous entry.
    pub fn put(&self, key: K, value: V) {
        self.entries.lock().insert(
            key,
            Entry {
                stored_at: Instant::now(),
                value,
            },
        );
    }

    /// Number of entries currently held, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_is_served() {
        let cache = TtlCache::default();
        cache.put(1_u64, vec![1, 2, 3]);

        tokio::time::advance(CACHE_TTL - Duration::from_secs(1)).await;
        assert_eq!(cache.get(&1), Some(vec![1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_at_ttl() {
        let cache = TtlCache::default();
        cache.put(1_u64, "items");

        tokio::time::advance(CACHE_TTL).await;
        assert_eq!(cache.get(&1), None);
        // Dropped on read.
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_linger_until_read() {
        let cache = TtlCache::new(Duration::from_secs(1));
        cache.put("a", 1);
        cache.put("b", 2);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn put_overwrites_and_restamps() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.put(5_u64, "old");
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.put(5_u64, "new");
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get(&5), Some("new"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_lose_nothing() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let tasks: Vec<_> = (0..64_u64)
            .map(|key| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.put(key, key * 2) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(cache.len(), 64);
        assert!((0..64_u64).all(|key| cache.get(&key) == Some(key * 2)));
    }
}
