use tracing::{debug, warn};

use crate::broker::event::{RawEvent, SearchItem};
use crate::upstream::Upstream;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Result of a one-shot upstream search that reached the upstream.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// The upstream returned a result set (possibly empty).
    Found(Vec<RawEvent>),
    /// The upstream answered without a result set.
    NoData,
}

/// Runs a single search and projects at most `limit` items, in upstream
/// order. Both "no result set" and upstream failures yield an empty list.
pub async fn search_once(upstream: &dyn Upstream, term: &str, limit: usize) -> Vec<SearchItem> {
    match upstream.search(term).await {
        Ok(SearchOutcome::Found(items)) => {
            debug!(term, found = items.len(), limit, "search completed");
            items.into_iter().take(limit).map(SearchItem::from).collect()
        }
        Ok(SearchOutcome::NoData) => {
            warn!(term, "search returned no result set");
            Vec::new()
        }
        Err(e) => {
            warn!(term, error = %e, "unable to fetch search results");
            Vec::new()
        }
    }
}
