//! Cursor walking for paginated upstream listings.

use std::future::Future;

use tracing::{trace, warn};

use crate::error::{ProxyError, ProxyResult};
use crate::upstream::Page;

/// Upper bound on pages fetched by one walk. An upstream that keeps handing
/// out cursors past this point is treated as broken.
pub const MAX_PAGES: usize = 1000;

/// Fetches every page of a listing and concatenates the items in arrival order.
///
/// `fetch` receives the cursor for the page to load: the empty string for the
/// first page, then whatever the previous page returned. The walk stops when a
/// page has no cursor or an empty one. The first failing fetch aborts the walk
/// and its error is returned unchanged.
///
/// # Errors
///
/// Whatever `fetch` returns, or [`ProxyError::UpstreamFailure`] once
/// `max_pages` pages have been read without reaching the end.
///
/// # Examples
///
/// ```
/// use pass_proxy::paginate::paginate;
/// use pass_proxy::upstream::Page;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let all = paginate("demo", 10, |cursor: String| async move {
///     Ok(match cursor.as_str() {
///         "" => Page::with_next(vec![1, 2], "b"),
///         _ => Page::last(vec![3]),
///     })
/// })
/// .await
/// .unwrap();
/// assert_eq!(all, vec![1, 2, 3]);
/// # });
/// ```
pub async fn paginate<T, F, Fut>(
    endpoint: &'static str,
    max_pages: usize,
    mut fetch: F,
) -> ProxyResult<Vec<T>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ProxyResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor = String::new();

    for page_no in 1..=max_pages {
        let page = fetch(cursor).await?;
        trace!(endpoint, page_no, count = page.items.len(), "page fetched");
        items.extend(page.items);

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = next,
            _ => return Ok(items),
        }
    }

    warn!(endpoint, max_pages, "pagination did not terminate");
    Err(ProxyError::failure(
        endpoint,
        format!("pagination did not terminate after {max_pages} pages"),
    ))
}
