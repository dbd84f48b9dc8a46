//! Hacker News fetcher backed by the Algolia search API.
//!
//! Runs one search per AI keyword, restricted to stories created inside the
//! lookback window with more than [`MIN_POINTS`] points. Self posts without
//! an external link point at their discussion page.

use super::{FetchNews, FetchWindow, raw_item};
use crate::error::SourceError;
use crate::models::{RawItem, Source};
use chrono::DateTime;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration as StdDuration;
use tracing::{debug, info, instrument, warn};

const SEARCH_URL: &str = "https://hn.algolia.com/api/v1/search";

/// Queries issued per fetch; kept short to bound API calls.
pub const KEYWORDS: [&str; 6] = [
    "artificial intelligence",
    "machine learning",
    "LLM",
    "GPT",
    "Claude",
    "OpenAI",
];

/// Engagement threshold: stories need strictly more points than this.
pub const MIN_POINTS: i64 = 10;

const HITS_PER_PAGE: usize = 15;
const MAX_ITEMS: usize = 30;
const QUERY_PAUSE: StdDuration = StdDuration::from_millis(300);

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
pub struct Hit {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub points: Option<i64>,
    pub num_comments: Option<i64>,
    pub created_at_i: Option<i64>,
}

impl Hit {
    fn link(&self) -> String {
        match self.url.as_deref() {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => format!("https://news.ycombinator.com/item?id={}", self.object_id),
        }
    }
}

/// Turn search hits into items, skipping URLs already in `seen`.
pub fn hits_to_items(
    hits: Vec<Hit>,
    window: &FetchWindow,
    seen: &mut HashSet<String>,
) -> Vec<RawItem> {
    let mut items = Vec::new();
    for hit in hits {
        if hit.points.unwrap_or(0) <= MIN_POINTS {
            continue;
        }
        let published = hit
            .created_at_i
            .and_then(|ts| DateTime::from_timestamp(ts, 0));
        if !window.contains(published) {
            continue;
        }
        let summary = format!(
            "HN points: {} | comments: {}",
            hit.points.unwrap_or(0),
            hit.num_comments.unwrap_or(0)
        );
        let title = hit.title.as_deref().unwrap_or_default();
        let Some(item) = raw_item(Source::HackerNews, title, &hit.link(), &summary, published, window)
        else {
            continue;
        };
        if seen.insert(item.url.clone()) {
            items.push(item);
        }
    }
    items
}

#[derive(Debug, Clone)]
pub struct HackerNewsFetcher {
    client: reqwest::Client,
}

impl HackerNewsFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn search_url(keyword: &str, window: &FetchWindow) -> String {
        format!(
            "{SEARCH_URL}?query={}&tags=story&numericFilters=created_at_i>{},points>{MIN_POINTS}&hitsPerPage={HITS_PER_PAGE}",
            urlencoding::encode(keyword),
            window.since.timestamp(),
        )
    }

    #[instrument(level = "debug", skip(self, window))]
    async fn search(&self, keyword: &str, window: &FetchWindow) -> Result<Vec<Hit>, SourceError> {
        let url = Self::search_url(keyword, window);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body: SearchResponse = resp.json().await?;
        debug!(hits = body.hits.len(), "HN search returned");
        Ok(body.hits)
    }
}

impl FetchNews for HackerNewsFetcher {
    fn source(&self) -> Source {
        Source::HackerNews
    }

    #[instrument(level = "info", skip_all, fields(source = "Hacker News"))]
    async fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawItem>, SourceError> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        let mut failures = 0usize;
        let mut last_error = None;

        for (i, keyword) in KEYWORDS.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(QUERY_PAUSE).await;
            }
            match self.search(keyword, window).await {
                Ok(hits) => items.extend(hits_to_items(hits, window, &mut seen)),
                Err(e) => {
                    warn!(%keyword, error = %e, "HN search failed");
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if failures == KEYWORDS.len() {
            return Err(SourceError::AllRequestsFailed {
                attempted: failures,
                last: last_error.map(|e| e.to_string()).unwrap_or_default(),
            });
        }

        items.truncate(MAX_ITEMS);
        info!(count = items.len(), failed_queries = failures, "Fetched unique HN stories");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    const RESPONSE: &str = r#"{
      "hits": [
        {"objectID": "1", "title": "Claude gets tool use", "url": "https://www.anthropic.com/news/tools",
         "points": 250, "num_comments": 80, "created_at_i": 1791979200},
        {"objectID": "2", "title": "Ask HN: Which LLM do you use?", "url": null,
         "points": 40, "num_comments": 120, "created_at_i": 1791979200},
        {"objectID": "3", "title": "Low engagement GPT post", "url": "https://example.com/low",
         "points": 10, "num_comments": 1, "created_at_i": 1791979200},
        {"objectID": "4", "title": "Ancient GPT post", "url": "https://example.com/old",
         "points": 500, "num_comments": 1, "created_at_i": 1700000000},
        {"objectID": "5", "title": "Claude gets tool use (dupe)", "url": "https://www.anthropic.com/news/tools",
         "points": 30, "num_comments": 2, "created_at_i": 1791979200}
      ],
      "nbHits": 5
    }"#;

    fn window() -> FetchWindow {
        FetchWindow::lookback(
            Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(),
            Duration::days(7),
        )
    }

    #[test]
    fn test_hits_to_items_filters_and_dedups() {
        let resp: SearchResponse = serde_json::from_str(RESPONSE).unwrap();
        let mut seen = HashSet::new();
        let items = hits_to_items(resp.hits, &window(), &mut seen);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Claude gets tool use");
        assert_eq!(items[0].summary, "HN points: 250 | comments: 80");
        assert_eq!(items[0].source, Source::HackerNews);
        assert_eq!(items[1].url, "https://news.ycombinator.com/item?id=2");
    }

    #[test]
    fn test_seen_urls_carry_across_queries() {
        let mut seen = HashSet::new();
        let first: SearchResponse = serde_json::from_str(RESPONSE).unwrap();
        let second: SearchResponse = serde_json::from_str(RESPONSE).unwrap();
        assert_eq!(hits_to_items(first.hits, &window(), &mut seen).len(), 2);
        assert!(hits_to_items(second.hits, &window(), &mut seen).is_empty());
    }

    #[test]
    fn test_search_url_encodes_keyword() {
        let url = HackerNewsFetcher::search_url("machine learning", &window());
        assert!(url.contains("query=machine%20learning"));
        assert!(url.contains("points>10"));
        assert!(url.contains(&format!("created_at_i>{}", window().since.timestamp())));
    }
}
