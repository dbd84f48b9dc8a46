//! RSS 2.0 and Atom feed fetchers.
//!
//! Six of the seven sources publish a syndication feed. They share one
//! fetcher parameterized by a static [`FeedDef`]; the definition decides which
//! feed URLs to read, how many entries to consider, and whether the AI
//! keyword filter applies.

use super::{FetchNews, FetchWindow, mentions_ai, raw_item};
use crate::error::SourceError;
use crate::models::{RawItem, Source};
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Static description of one feed-backed source.
#[derive(Debug)]
pub struct FeedDef {
    pub source: Source,
    pub urls: &'static [&'static str],
    /// Recent entries kept per feed before relevance filtering.
    pub per_feed_limit: usize,
    /// Items returned for the source after filtering.
    pub max_items: usize,
    pub keyword_filter: bool,
}

pub static FEEDS: [FeedDef; 6] = [
    FeedDef {
        source: Source::ArXiv,
        urls: &[
            "https://rss.arxiv.org/rss/cs.AI",
            "https://rss.arxiv.org/rss/cs.LG",
            "https://rss.arxiv.org/rss/cs.CL",
        ],
        per_feed_limit: 15,
        max_items: 20,
        keyword_filter: false,
    },
    FeedDef {
        source: Source::TechCrunch,
        urls: &["https://techcrunch.com/feed/"],
        per_feed_limit: 40,
        max_items: 15,
        keyword_filter: true,
    },
    FeedDef {
        source: Source::TheVerge,
        urls: &["https://www.theverge.com/rss/index.xml"],
        per_feed_limit: 60,
        max_items: 15,
        keyword_filter: true,
    },
    FeedDef {
        source: Source::MitTechReview,
        urls: &["https://www.technologyreview.com/feed/"],
        per_feed_limit: 30,
        max_items: 10,
        keyword_filter: true,
    },
    FeedDef {
        source: Source::VentureBeat,
        urls: &["https://venturebeat.com/feed/"],
        per_feed_limit: 40,
        max_items: 15,
        keyword_filter: true,
    },
    FeedDef {
        source: Source::Wired,
        urls: &["https://www.wired.com/feed/tag/artificial-intelligence/latest/rss"],
        per_feed_limit: 20,
        max_items: 10,
        keyword_filter: false,
    },
];

/// A feed entry before it is turned into a [`RawItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
}

// ---- RSS 2.0 ----

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

impl From<RssItem> for FeedEntry {
    fn from(it: RssItem) -> Self {
        FeedEntry {
            title: it.title.unwrap_or_default(),
            link: it.link.unwrap_or_default(),
            summary: it.description.unwrap_or_default(),
            published: it.pub_date.as_deref().and_then(parse_feed_date),
        }
    }
}

// ---- Atom ----

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl From<AtomEntry> for FeedEntry {
    fn from(entry: AtomEntry) -> Self {
        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
            .or_else(|| entry.links.first())
            .and_then(|l| l.href.clone())
            .unwrap_or_default();
        let summary = entry
            .summary
            .map(|t| t.value)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| entry.content.map(|t| t.value))
            .unwrap_or_default();
        FeedEntry {
            title: entry.title.map(|t| t.value).unwrap_or_default(),
            link,
            summary,
            published: entry
                .published
                .as_deref()
                .or(entry.updated.as_deref())
                .and_then(parse_feed_date),
        }
    }
}

/// Parse an RFC 2822 (RSS) or RFC 3339 (Atom) timestamp.
pub fn parse_feed_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an RSS 2.0 or Atom document into entries, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, SourceError> {
    let xml = scrub_html_entities_for_xml(xml);
    let rss_err = match from_str::<Rss>(&xml) {
        Ok(rss) => return Ok(rss.channel.items.into_iter().map(FeedEntry::from).collect()),
        Err(e) => e,
    };
    if !xml.contains("<feed") {
        return Err(SourceError::Parse(format!("not an RSS or Atom document: {rss_err}")));
    }
    let feed: AtomFeed = from_str(&xml).map_err(|e| SourceError::Parse(e.to_string()))?;
    Ok(feed.entries.into_iter().map(FeedEntry::from).collect())
}

/// HTML entities are common in feeds but undefined in XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

/// Select the items a source reports from its parsed feeds.
///
/// Per feed, at most `2 * per_feed_limit` entries are scanned and up to
/// `per_feed_limit` recent ones kept. Across feeds, items are unique by URL.
/// The keyword filter, when enabled, runs before the final `max_items` cap.
pub fn select_items(
    def: &FeedDef,
    feeds: Vec<Vec<FeedEntry>>,
    window: &FetchWindow,
) -> Vec<RawItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::new();
    for entries in feeds {
        let recent = entries
            .into_iter()
            .take(def.per_feed_limit * 2)
            .filter(|e| window.contains(e.published))
            .filter_map(|e| {
                raw_item(def.source, &e.title, &e.link, &e.summary, e.published, window)
            })
            .take(def.per_feed_limit);
        for item in recent {
            if seen.insert(item.url.clone()) {
                items.push(item);
            }
        }
    }
    items
        .into_iter()
        .filter(|i| !def.keyword_filter || mentions_ai(&i.title, &i.summary))
        .take(def.max_items)
        .collect()
}

/// Fetcher for one feed-backed source.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    def: &'static FeedDef,
    client: reqwest::Client,
}

impl FeedFetcher {
    pub fn new(def: &'static FeedDef, client: reqwest::Client) -> Self {
        Self { def, client }
    }

    #[instrument(level = "debug", skip(self), fields(source = %self.def.source))]
    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>, SourceError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.text().await?;
        let entries = parse_feed(&body)?;
        debug!(%url, count = entries.len(), "Parsed feed");
        Ok(entries)
    }
}

impl FetchNews for FeedFetcher {
    fn source(&self) -> Source {
        self.def.source
    }

    #[instrument(level = "info", skip_all, fields(source = %self.def.source))]
    async fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawItem>, SourceError> {
        let mut feeds = Vec::with_capacity(self.def.urls.len());
        let mut errors = Vec::new();
        for url in self.def.urls {
            match self.fetch_feed(url).await {
                Ok(entries) => feeds.push(entries),
                Err(e) => {
                    warn!(%url, error = %e, "Feed fetch failed");
                    errors.push(e);
                }
            }
        }

        if feeds.is_empty() {
            let attempted = errors.len();
            return Err(match errors.pop() {
                Some(e) if attempted == 1 => e,
                Some(e) => SourceError::AllRequestsFailed {
                    attempted,
                    last: e.to_string(),
                },
                None => SourceError::AllRequestsFailed {
                    attempted: 0,
                    last: "no feed URLs configured".to_string(),
                },
            });
        }

        let items = select_items(self.def, feeds, window);
        info!(count = items.len(), "Fetched feed items");
        Ok(items)
    }
}
