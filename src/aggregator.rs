//! Fan-in of all source fetchers into one ordered candidate set.
//!
//! The aggregator runs every fetcher concurrently under a per-fetcher
//! timeout, isolates failures, deduplicates by normalized URL, and sorts the
//! survivors into a fully deterministic order whose positions become the
//! [`StoryId`]s.

use crate::error::{PipelineError, SourceError, SourceFailure};
use crate::models::{CandidateStory, RawItem, Source, StoryId};
use crate::scrapers::{FetchNews, FetchWindow};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration as StdDuration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Hosts whose query string identifies the resource, so it is kept in the key.
const QUERY_IDENTIFIED_HOSTS: [&str; 1] = ["news.ycombinator.com"];

/// Result of one aggregation pass.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Candidates in final sort order; `stories[i].id == StoryId(i)`.
    pub stories: Vec<CandidateStory>,
    pub failures: Vec<SourceFailure>,
    pub source_stats: BTreeMap<Source, usize>,
}

/// Dedup key for a URL: scheme, lowercased host, port, and path without
/// trailing slash. Query and fragment are dropped. `None` for relative or
/// otherwise unparseable URLs.
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let mut key = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        key.push_str(&format!(":{port}"));
    }
    key.push_str(url.path().trim_end_matches('/'));
    if QUERY_IDENTIFIED_HOSTS.contains(&host.as_str()) {
        if let Some(q) = url.query() {
            key.push('?');
            key.push_str(q);
        }
    }
    Some(key)
}

/// Deduplicate items given in fetch order.
///
/// For items sharing a normalized URL, the one with the longer summary wins;
/// on equal length the earlier item wins. Items with unusable URLs are dropped.
pub fn dedup_by_url(items: Vec<RawItem>) -> Vec<RawItem> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<RawItem> = Vec::with_capacity(items.len());
    for item in items {
        let Some(key) = normalize_url(&item.url) else {
            debug!(url = %item.url, "Dropping item with unusable URL");
            continue;
        };
        match slots.get(&key) {
            Some(&idx) => {
                if item.summary.chars().count() > kept[idx].summary.chars().count() {
                    debug!(%key, "Replacing duplicate with longer summary");
                    kept[idx] = item;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(item);
            }
        }
    }
    kept
}

/// Sort newest first, then by source ordinal, title, and URL, and assign ids.
pub fn order_and_assign(mut items: Vec<RawItem>) -> Vec<CandidateStory> {
    items.sort_by(|a, b| {
        b.published
            .cmp(&a.published)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.url.cmp(&b.url))
    });
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| CandidateStory {
            id: StoryId(i),
            item,
        })
        .collect()
}

pub fn source_stats(stories: &[CandidateStory]) -> BTreeMap<Source, usize> {
    let mut stats = BTreeMap::new();
    for story in stories {
        *stats.entry(story.item.source).or_insert(0) += 1;
    }
    stats
}

/// Run all fetchers and build the candidate set.
///
/// Fails with [`PipelineError::NoDataAvailable`] when no fetcher succeeded
/// or the successful ones returned nothing.
#[instrument(level = "info", skip_all, fields(fetchers = fetchers.len()))]
pub async fn aggregate<F: FetchNews>(
    fetchers: &[F],
    window: &FetchWindow,
    source_timeout: StdDuration,
) -> Result<Aggregation, PipelineError> {
    let outcomes = join_all(fetchers.iter().map(|f| async move {
        let result = match timeout(source_timeout, f.fetch(window)).await {
            Ok(r) => r,
            Err(_) => Err(SourceError::Timeout(source_timeout)),
        };
        (f.source(), result)
    }))
    .await;

    let mut combined = Vec::new();
    let mut failures = Vec::new();
    for (source, result) in outcomes {
        match result {
            Ok(items) => {
                info!(%source, count = items.len(), "Source fetched");
                combined.extend(items);
            }
            Err(e) => {
                warn!(%source, error = %e, "Source unavailable; continuing without it");
                failures.push(SourceFailure {
                    source,
                    reason: e.to_string(),
                });
            }
        }
    }

    let fetched = combined.len();
    let stories = order_and_assign(dedup_by_url(combined));
    if stories.is_empty() {
        return Err(PipelineError::NoDataAvailable { failures });
    }

    let source_stats = source_stats(&stories);
    info!(
        fetched,
        unique = stories.len(),
        failed_sources = failures.len(),
        "Aggregated candidate stories"
    );
    Ok(Aggregation {
        stories,
        failures,
        source_stats,
    })
}
