//! Upstream client — the three calls the aggregation pipeline makes.
//!
//! - owner listing: the public games (universes) a user owns, one bounded page
//! - sub-item listing: one cursor page of game passes for a universe
//! - icon lookup: thumbnail URLs for up to [`ICON_BATCH_SIZE`] pass ids
//!
//! [`Upstream`] is the seam the aggregator is written against;
//! [`RobloxClient`] is the production implementation over `reqwest`.

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::ProxyResult;

mod client;

pub use client::RobloxClient;

/// Largest id list a single icon lookup accepts.
pub const ICON_BATCH_SIZE: usize = 100;

/// A universe owned by the requested user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Collection {
    pub id: i64,
}

/// A game pass as listed upstream, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemRecord {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
}

/// The unit returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub icon_image_url: String,
}

impl From<ItemRecord> for Item {
    fn from(record: ItemRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.unwrap_or_default(),
            price: record.price.unwrap_or(0),
            icon_image_url: String::new(),
        }
    }
}

/// One page of a cursor-paginated listing.
///
/// `next_cursor` of `None` or `Some("")` means the listing is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    pub fn with_next(items: Vec<T>, cursor: impl Into<String>) -> Self {
        Self {
            items,
            next_cursor: Some(cursor.into()),
        }
    }
}

/// The upstream API as seen by the aggregator.
///
/// Each method performs exactly one network call. A 403 surfaces as
/// [`ProxyError::UpstreamForbidden`](crate::error::ProxyError::UpstreamForbidden),
/// everything else that goes wrong as
/// [`ProxyError::UpstreamFailure`](crate::error::ProxyError::UpstreamFailure).
/// A well-formed body that lacks the expected list is an empty result, and
/// list entries without an id are skipped.
pub trait Upstream: Send + Sync + 'static {
    /// Public universes owned by `user_id`, in upstream order.
    fn list_owner_collections(
        &self,
        user_id: u64,
    ) -> impl Future<Output = ProxyResult<Vec<Collection>>> + Send;

    /// One page of game passes for `collection_id`. `cursor` is empty for the first page.
    fn list_sub_items(
        &self,
        collection_id: i64,
        cursor: &str,
    ) -> impl Future<Output = ProxyResult<Page<ItemRecord>>> + Send;

    /// Icon URLs for at most [`ICON_BATCH_SIZE`] pass ids. Ids without an
    /// icon are simply absent from the map.
    fn batch_lookup_icons(
        &self,
        ids: &[i64],
    ) -> impl Future<Output = ProxyResult<HashMap<i64, String>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_price_and_name_default() {
        let record: ItemRecord = serde_json::from_str(r#"{"id": 7, "price": null}"#).unwrap();
        let item = Item::from(record);
        assert_eq!(item.price, 0);
        assert_eq!(item.name, "");
        assert_eq!(item.icon_image_url, "");
    }

    #[test]
    fn item_serializes_camel_case() {
        let item = Item {
            id: 1,
            name: "VIP".into(),
            price: 250,
            icon_image_url: "https://t.rbxcdn.com/x".into(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1,
                "name": "VIP",
                "price": 250,
                "iconImageUrl": "https://t.rbxcdn.com/x"
            })
        );
    }
}
