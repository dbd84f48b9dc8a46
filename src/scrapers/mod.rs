//! Source fetchers for the AI and technology news outlets.
//!
//! Every outlet is reached through the [`FetchNews`] capability and produces
//! normalized [`RawItem`]s. The aggregator only ever sees the capability; it
//! never special-cases a source.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Filtering |
//! |--------|--------|--------|-----------|
//! | Hacker News | [`hackernews`] | Algolia search API | keyword queries, points > 10 |
//! | ArXiv | [`feeds`] | RSS (cs.AI, cs.LG, cs.CL) | none (topical feeds) |
//! | TechCrunch | [`feeds`] | RSS | AI keyword match |
//! | The Verge | [`feeds`] | Atom | AI keyword match |
//! | MIT Technology Review | [`feeds`] | RSS | AI keyword match |
//! | VentureBeat | [`feeds`] | RSS | AI keyword match |
//! | Wired | [`feeds`] | RSS (AI tag feed) | none (topical feed) |
//!
//! # Common Patterns
//!
//! Fetchers apply relevance and engagement thresholds themselves, stamp
//! undated items with the fetch time, and return an empty list (not an error)
//! when nothing qualifies. Network and parse failures surface as
//! [`SourceError`] and are isolated by the aggregator.

pub mod feeds;
pub mod hackernews;

use crate::error::SourceError;
use crate::models::{RawItem, Source};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::time::Duration as StdDuration;

pub use feeds::{FEEDS, FeedFetcher};
pub use hackernews::HackerNewsFetcher;

/// Longest excerpt kept from a source-provided summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 600;

const USER_AGENT: &str = concat!("ai_news_briefing/", env!("CARGO_PKG_VERSION"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static AI_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(ai|artificial intelligence|machine learning|deep learning|openai|anthropic|deepmind|llms?|chatgpt|claude|gemini|gpt|neural|robots?|robotics|automation|generative|algorithms?)\b",
    )
    .unwrap()
});

/// The time window a fetch should consider "recent".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub since: DateTime<Utc>,
    /// The fetch time; undated items are stamped with it.
    pub until: DateTime<Utc>,
}

impl FetchWindow {
    /// Window ending at `now`; an out-of-range lookback saturates at the
    /// earliest representable time.
    pub fn lookback(now: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            since: now
                .checked_sub_signed(lookback)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            until: now,
        }
    }

    pub fn contains(&self, published: Option<DateTime<Utc>>) -> bool {
        published.is_none_or(|p| p >= self.since)
    }
}

/// Capability shared by every news source.
pub trait FetchNews {
    /// The source this fetcher reports items for.
    fn source(&self) -> Source;

    /// Fetch recent, relevant items.
    ///
    /// An empty list is a successful fetch. Errors mean the source was
    /// unavailable and must not abort other fetchers.
    async fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawItem>, SourceError>;
}

/// The closed set of production fetchers.
#[derive(Debug, Clone)]
pub enum SourceFetcher {
    HackerNews(HackerNewsFetcher),
    Feed(FeedFetcher),
}

impl FetchNews for SourceFetcher {
    fn source(&self) -> Source {
        match self {
            SourceFetcher::HackerNews(f) => f.source(),
            SourceFetcher::Feed(f) => f.source(),
        }
    }

    async fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawItem>, SourceError> {
        match self {
            SourceFetcher::HackerNews(f) => f.fetch(window).await,
            SourceFetcher::Feed(f) => f.fetch(window).await,
        }
    }
}

/// Build the fetchers for every enabled source, in source ordinal order.
pub fn registry(client: &reqwest::Client, enabled: impl Fn(Source) -> bool) -> Vec<SourceFetcher> {
    let mut fetchers = Vec::new();
    if enabled(Source::HackerNews) {
        fetchers.push(SourceFetcher::HackerNews(HackerNewsFetcher::new(client.clone())));
    }
    for def in FEEDS.iter().filter(|def| enabled(def.source)) {
        fetchers.push(SourceFetcher::Feed(FeedFetcher::new(def, client.clone())));
    }
    fetchers
}

/// HTTP client shared by all fetchers.
pub fn http_client(request_timeout: StdDuration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(StdDuration::from_secs(10))
        .timeout(request_timeout)
        .build()
}

/// Collapse runs of whitespace and trim.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Strip markup from a source excerpt and cap its length.
pub fn clean_summary(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(raw);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
        .chars()
        .take(SUMMARY_MAX_CHARS)
        .collect()
}

/// Whether the title or summary mentions an AI topic.
pub fn mentions_ai(title: &str, summary: &str) -> bool {
    AI_KEYWORDS.is_match(title) || AI_KEYWORDS.is_match(summary)
}

/// Build a [`RawItem`], rejecting empty titles and non-absolute URLs.
pub fn raw_item(
    source: Source,
    title: &str,
    url: &str,
    summary: &str,
    published: Option<DateTime<Utc>>,
    window: &FetchWindow,
) -> Option<RawItem> {
    let title = collapse_whitespace(title);
    if title.is_empty() {
        return None;
    }
    let parsed = url::Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(RawItem {
        title,
        url: parsed.to_string(),
        summary: clean_summary(summary),
        published: published.unwrap_or(window.until),
        source,
    })
}
