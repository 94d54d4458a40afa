//! Cache-fronted aggregation with per-user single-flight.
//!
//! Flow for one request: validate the user id, serve a fresh cache entry if
//! there is one, otherwise take the user's in-flight slot, look at the cache
//! again (a concurrent request may have just filled it), run the pipeline and
//! store the result. Failed runs store nothing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::aggregate::Aggregator;
use crate::cache::TtlCache;
use crate::error::{ProxyError, ProxyResult};
use crate::upstream::{Item, Upstream};

/// A cached, shareable pass list.
pub type PassList = Arc<Vec<Item>>;

/// Parses a user id: non-empty, ASCII digits only, fits in `u64`.
///
/// # Errors
///
/// [`ProxyError::InvalidInput`] for anything else, including signs,
/// whitespace and overflow.
///
/// # Examples
///
/// ```
/// use pass_proxy::service::parse_user_id;
///
/// assert_eq!(parse_user_id("261").unwrap(), 261);
/// assert!(parse_user_id("-1").is_err());
/// assert!(parse_user_id("12a").is_err());
/// ```
pub fn parse_user_id(raw: &str) -> ProxyResult<u64> {
    let invalid = || ProxyError::InvalidInput {
        input: raw.to_owned(),
    };
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    raw.parse().map_err(|_| invalid())
}

type FlightMap = Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>;

// Holds a reference to one user's in-flight lock and unregisters it when the
// last holder goes away, cancellation included.
struct FlightSlot {
    map: Arc<FlightMap>,
    user_id: u64,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl FlightSlot {
    fn enter(map: &Arc<FlightMap>, user_id: u64) -> Self {
        let lock = Arc::clone(map.lock().entry(user_id).or_default());
        Self {
            map: Arc::clone(map),
            user_id,
            lock,
        }
    }
}

impl Drop for FlightSlot {
    fn drop(&mut self) {
        let mut map = self.map.lock();
        // Only the map and this slot still reference the lock.
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.user_id);
        }
    }
}

/// Serves pass lists for user ids, building them on cache misses.
pub struct PassService<U> {
    aggregator: Aggregator<U>,
    cache: TtlCache<u64, PassList>,
    in_flight: Arc<FlightMap>,
}

impl<U: Upstream> PassService<U> {
    /// Uses the default five-minute cache.
    pub fn new(aggregator: Aggregator<U>) -> Self {
        Self::with_cache(aggregator, TtlCache::default())
    }

    pub fn with_cache(aggregator: Aggregator<U>, cache: TtlCache<u64, PassList>) -> Self {
        Self {
            aggregator,
            cache,
            in_flight: Arc::default(),
        }
    }

    pub fn cache(&self) -> &TtlCache<u64, PassList> {
        &self.cache
    }

    /// Returns the pass list for the raw `userId` path segment.
    ///
    /// # Errors
    ///
    /// [`ProxyError::InvalidInput`] before any other work, or the upstream
    /// failure that aborted the pipeline.
    pub async fn passes_for(&self, raw_user_id: &str) -> ProxyResult<PassList> {
        let user_id = parse_user_id(raw_user_id)?;

        if let Some(hit) = self.cache.get(&user_id) {
            debug!(user_id, "cache hit");
            return Ok(hit);
        }

        let slot = FlightSlot::enter(&self.in_flight, user_id);
        let _running = slot.lock.lock().await;

        if let Some(hit) = self.cache.get(&user_id) {
            debug!(user_id, "cache filled while waiting");
            return Ok(hit);
        }

        debug!(user_id, "cache miss, aggregating");
        let items: PassList = Arc::new(self.aggregator.aggregate(user_id).await?);
        self.cache.put(user_id, Arc::clone(&items));
        Ok(items)
    }

    /// Number of users with a pipeline run in progress or queued.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::FakeUpstream;
    use crate::cache::CACHE_TTL;
    use crate::upstream::{Collection, ItemRecord, Page};
    use std::time::Duration;

    fn service(fake: &Arc<FakeUpstream>) -> PassService<FakeUpstream> {
        PassService::new(Aggregator::new(Arc::clone(fake)))
    }

    fn item(id: i64) -> Item {
        Item {
            id,
            name: format!("cached {id}"),
            price: 5,
            icon_image_url: String::new(),
        }
    }

    #[tokio::test]
    async fn non_numeric_ids_never_reach_upstream() {
        let fake = Arc::new(FakeUpstream::with_universes(&[(1, &[10])]));
        let service = service(&fake);

        for bad in ["", "abc", "12a", "-5", " 7", "1.5", "99999999999999999999999"] {
            let err = service.passes_for(bad).await.unwrap_err();
            assert!(matches!(err, ProxyError::InvalidInput { .. }), "{bad:?}");
        }
        assert_eq!(fake.total_calls(), 0);
        assert!(service.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cached_entry_is_served_without_upstream() {
        let fake = Arc::new(FakeUpstream::with_universes(&[(1, &[10])]));
        let service = service(&fake);
        service.cache().put(42, Arc::new(vec![item(1), item(2)]));

        let items = service.passes_for("42").await.unwrap();
        assert_eq!(*items, vec![item(1), item(2)]);
        assert_eq!(fake.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_triggers_fresh_run() {
        let fake = Arc::new(FakeUpstream::with_universes(&[(1, &[10])]));
        let service = service(&fake);
        service.cache().put(42, Arc::new(vec![item(1)]));

        tokio::time::advance(CACHE_TTL).await;
        let items = service.passes_for("42").await.unwrap();

        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![10]);
        assert_eq!(*fake.owner_calls.lock(), 1);
        assert_eq!(service.cache().get(&42), Some(items));
    }

    #[tokio::test]
    async fn second_request_hits_cache() {
        let fake = Arc::new(FakeUpstream::with_universes(&[(1, &[10, 11])]));
        let service = service(&fake);

        let first = service.passes_for("7").await.unwrap();
        let calls = fake.total_calls();
        let second = service.passes_for("7").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fake.total_calls(), calls);
        assert_eq!(service.in_flight(), 0);
    }

    #[tokio::test]
    async fn failed_run_caches_nothing() {
        let mut fake = FakeUpstream::with_universes(&[(1, &[10]), (2, &[20])]);
        fake.fail_universe = Some((2, ProxyError::failure("game-passes", "status 500")));
        let fake = Arc::new(fake);
        let service = service(&fake);
        service.cache().put(99, Arc::new(vec![item(1)]));

        assert!(service.passes_for("7").await.is_err());
        assert_eq!(service.cache().get(&7), None);
        // Other users' entries are untouched.
        assert_eq!(service.cache().get(&99), Some(Arc::new(vec![item(1)])));
        assert_eq!(service.in_flight(), 0);
    }

    /// Delays the owner listing so concurrent callers overlap.
    struct SlowUpstream(FakeUpstream);

    impl Upstream for SlowUpstream {
        async fn list_owner_collections(&self, user_id: u64) -> ProxyResult<Vec<Collection>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.list_owner_collections(user_id).await
        }

        async fn list_sub_items(&self, collection_id: i64, cursor: &str) -> ProxyResult<Page<ItemRecord>> {
            self.0.list_sub_items(collection_id, cursor).await
        }

        async fn batch_lookup_icons(&self, ids: &[i64]) -> ProxyResult<HashMap<i64, String>> {
            self.0.batch_lookup_icons(ids).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_run() {
        let slow = Arc::new(SlowUpstream(FakeUpstream::with_universes(&[(1, &[10])])));
        let service = Arc::new(PassService::new(Aggregator::new(Arc::clone(&slow))));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.passes_for("7").await })
            })
            .collect();
        for task in tasks {
            let items = task.await.unwrap().unwrap();
            assert_eq!(items.len(), 1);
        }

        assert_eq!(*slow.0.owner_calls.lock(), 1);
        assert_eq!(service.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn different_users_do_not_wait_on_each_other() {
        let slow = Arc::new(SlowUpstream(FakeUpstream::with_universes(&[(1, &[10])])));
        let service = Arc::new(PassService::new(Aggregator::new(Arc::clone(&slow))));

        let a = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.passes_for("1").await }
        });
        let b = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.passes_for("2").await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(*slow.0.owner_calls.lock(), 2);
    }
}
