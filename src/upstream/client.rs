//! `reqwest` implementation of [`Upstream`] against the Roblox web APIs.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Collection, ICON_BATCH_SIZE, ItemRecord, Page, Upstream};
use crate::config::Config;
use crate::error::{ProxyError, ProxyResult};

const GAMES: &str = "games";
const GAME_PASSES: &str = "game-passes";
const THUMBNAILS: &str = "thumbnails";

/// Page size for the owner listing. Only the first page is read.
const OWNER_PAGE_LIMIT: &str = "50";
/// Page size for each game-pass page.
const PASS_PAGE_LIMIT: &str = "100";

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct DataList<T> {
    #[serde(default, deserialize_with = "lenient_list")]
    data: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PassPage {
    #[serde(default, deserialize_with = "lenient_list")]
    data: Vec<ItemRecord>,
    #[serde(default)]
    next_page_cursor: Option<String>,
}

/// Reads a `data` array, treating `null` as empty and dropping entries that
/// don't fit `T` (a pass without an `id`, say) instead of failing the page.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let total = raw.len();
    let kept: Vec<T> = raw
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    if kept.len() < total {
        debug!(skipped = total - kept.len(), "dropped malformed upstream entries");
    }
    Ok(kept)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Thumbnail {
    target_id: i64,
    #[serde(default)]
    image_url: Option<String>,
}

/// Talks to `games.roblox.com` and `thumbnails.roblox.com` (or whatever the
/// config points at). Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct RobloxClient {
    http: reqwest::Client,
    games_url: String,
    thumbnails_url: String,
}

impl RobloxClient {
    /// Builds a client whose every request is bounded by `config.upstream_timeout`.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .user_agent(concat!("pass-proxy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            games_url: config.games_url.clone(),
            thumbnails_url: config.thumbnails_url.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> ProxyResult<T> {
        debug!(endpoint, url, "upstream request");

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { "timed out" } else { "request failed" };
                ProxyError::failure(endpoint, format!("{kind}: {e}"))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            warn!(endpoint, url, "upstream answered 403");
            return Err(ProxyError::UpstreamForbidden { endpoint });
        }
        if !status.is_success() {
            return Err(ProxyError::failure(endpoint, format!("status {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProxyError::failure(endpoint, format!("malformed body: {e}")))
    }
}

impl Upstream for RobloxClient {
    async fn list_owner_collections(&self, user_id: u64) -> ProxyResult<Vec<Collection>> {
        let url = format!("{}/v2/users/{user_id}/games", self.games_url);
        let body: DataList<Collection> = self
            .get_json(
                GAMES,
                &url,
                &[
                    ("accessFilter", "Public"),
                    ("limit", OWNER_PAGE_LIMIT),
                    ("sortOrder", "Asc"),
                ],
            )
            .await?;
        Ok(body.data)
    }

    async fn list_sub_items(&self, collection_id: i64, cursor: &str) -> ProxyResult<Page<ItemRecord>> {
        let url = format!("{}/v1/games/{collection_id}/game-passes", self.games_url);
        let mut query = vec![("limit", PASS_PAGE_LIMIT), ("sortOrder", "Asc")];
        if !cursor.is_empty() {
            query.push(("cursor", cursor));
        }

        let body: PassPage = self.get_json(GAME_PASSES, &url, &query).await?;
        Ok(Page {
            items: body.data,
            next_cursor: body.next_page_cursor,
        })
    }

    async fn batch_lookup_icons(&self, ids: &[i64]) -> ProxyResult<HashMap<i64, String>> {
        if ids.len() > ICON_BATCH_SIZE {
            return Err(ProxyError::failure(
                THUMBNAILS,
                format!("{} ids exceed the batch limit of {ICON_BATCH_SIZE}", ids.len()),
            ));
        }

        let joined = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/v1/game-passes", self.thumbnails_url);
        let body: DataList<Thumbnail> = self
            .get_json(
                THUMBNAILS,
                &url,
                &[
                    ("gamePassIds", joined.as_str()),
                    ("size", "150x150"),
                    ("format", "Png"),
                    ("isCircular", "false"),
                ],
            )
            .await?;

        Ok(body
            .data
            .into_iter()
            .filter_map(|t| t.image_url.map(|url| (t.target_id, url)))
            .collect())
    }
}
