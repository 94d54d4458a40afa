//! The aggregation pipeline: universes → game passes → icons.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ProxyResult;
use crate::paginate::{MAX_PAGES, paginate};
use crate::upstream::{ICON_BATCH_SIZE, Item, Upstream};

/// Builds the flattened, icon-enriched pass list for one user.
///
/// Work is strictly sequential: one universe at a time, one icon batch at a
/// time. Any failed upstream call aborts the run and nothing partial escapes.
#[derive(Debug)]
pub struct Aggregator<U> {
    upstream: Arc<U>,
    max_pages: usize,
}

impl<U> Clone for Aggregator<U> {
    fn clone(&self) -> Self {
        Self {
            upstream: Arc::clone(&self.upstream),
            max_pages: self.max_pages,
        }
    }
}

impl<U: Upstream> Aggregator<U> {
    pub fn new(upstream: Arc<U>) -> Self {
        Self {
            upstream,
            max_pages: MAX_PAGES,
        }
    }

    /// Overrides the per-universe page cap.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Runs the full pipeline for `user_id`.
    ///
    /// Result order is universes in listing order, then passes in pagination
    /// order within each universe.
    ///
    /// # Errors
    ///
    /// The first upstream failure, with its classification intact.
    pub async fn aggregate(&self, user_id: u64) -> ProxyResult<Vec<Item>> {
        let collections = self.upstream.list_owner_collections(user_id).await?;
        debug!(user_id, universes = collections.len(), "owner listing fetched");

        let mut items: Vec<Item> = Vec::new();
        for collection in &collections {
            let upstream = &self.upstream;
            let records = paginate("game-passes", self.max_pages, |cursor| async move {
                upstream.list_sub_items(collection.id, &cursor).await
            })
            .await?;
            items.extend(records.into_iter().map(Item::from));
        }

        self.enrich_icons(&mut items).await?;

        info!(user_id, universes = collections.len(), passes = items.len(), "aggregation complete");
        Ok(items)
    }

    // Fills `icon_image_url` in place, one lookup per chunk of ids. Ids the
    // lookup does not mention keep their empty URL.
    async fn enrich_icons(&self, items: &mut [Item]) -> ProxyResult<()> {
        let ids: Vec<i64> = items.iter().map(|item| item.id).collect();

        for chunk in ids.chunks(ICON_BATCH_SIZE) {
            let icons = self.upstream.batch_lookup_icons(chunk).await?;
            for (id, url) in icons {
                if let Some(item) = items.iter_mut().find(|item| item.id == id) {
                    item.icon_image_url = url;
                }
            }
        }
        Ok(())
    }
}
