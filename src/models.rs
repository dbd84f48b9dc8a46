//! Data models shared by every stage of the briefing pipeline.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RawItem`]: A normalized news item as produced by one source fetcher
//! - [`CandidateStory`]: A deduplicated item with its run-local [`StoryId`]
//! - [`Category`]: The closed taxonomy the model sorts stories into
//! - [`Briefing`]: The immutable, fully assembled result handed to renderers
//! - [`Warning`] / [`RunReport`]: The non-fatal side-channel of a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A news source integrated through one fetcher.
///
/// The declaration order is significant: it is the ordinal used as the
/// secondary sort key when candidate stories are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    HackerNews,
    #[serde(rename = "arxiv")]
    ArXiv,
    #[serde(rename = "techcrunch")]
    TechCrunch,
    TheVerge,
    MitTechReview,
    #[serde(rename = "venturebeat")]
    VentureBeat,
    Wired,
}

impl Source {
    /// Every source, in ordinal order.
    pub const ALL: [Source; 7] = [
        Source::HackerNews,
        Source::ArXiv,
        Source::TechCrunch,
        Source::TheVerge,
        Source::MitTechReview,
        Source::VentureBeat,
        Source::Wired,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Source::HackerNews => "Hacker News",
            Source::ArXiv => "ArXiv",
            Source::TechCrunch => "TechCrunch",
            Source::TheVerge => "The Verge",
            Source::MitTechReview => "MIT Technology Review",
            Source::VentureBeat => "VentureBeat",
            Source::Wired => "Wired",
        }
    }

    /// Key used in configuration files and on the command line.
    pub fn config_key(self) -> &'static str {
        match self {
            Source::HackerNews => "hacker_news",
            Source::ArXiv => "arxiv",
            Source::TechCrunch => "techcrunch",
            Source::TheVerge => "the_verge",
            Source::MitTechReview => "mit_tech_review",
            Source::VentureBeat => "venturebeat",
            Source::Wired => "wired",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Source> {
        let key = key.trim().to_ascii_lowercase().replace('-', "_");
        Source::ALL.into_iter().find(|s| s.config_key() == key)
    }

    /// Badge colours `(text, background)` used by the renderers.
    pub fn colors(self) -> (&'static str, &'static str) {
        match self {
            Source::HackerNews => ("#FF6600", "#FFE5CC"),
            Source::ArXiv => ("#0066CC", "#CCE5FF"),
            Source::TechCrunch => ("#00CC66", "#CCFFDD"),
            Source::TheVerge => ("#9966CC", "#E5CCFF"),
            Source::MitTechReview => ("#CC3333", "#FFCCCC"),
            Source::VentureBeat => ("#FFAA00", "#FFF5CC"),
            Source::Wired => ("#0099AA", "#CCFFFF"),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A news item as produced by a single source fetcher.
///
/// `url` is always an absolute URL and `title` is never empty; fetchers drop
/// entries that do not satisfy this before returning them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: String,
    pub url: String,
    /// Source-provided excerpt, already stripped of markup. May be empty.
    pub summary: String,
    /// Source-reported publication time, or the fetch time when absent.
    pub published: DateTime<Utc>,
    pub source: Source,
}

/// Run-local identifier of a candidate story: its position in the final
/// sort order. The only key trusted when reading the model's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(pub usize);

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A deduplicated [`RawItem`] with its assigned [`StoryId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateStory {
    pub id: StoryId,
    #[serde(flatten)]
    pub item: RawItem,
}

/// The closed set of briefing categories, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Research Breakthroughs")]
    Research,
    #[serde(rename = "Product Launches & Updates")]
    Products,
    #[serde(rename = "Industry News & Business")]
    Industry,
    #[serde(rename = "Policy, Safety & Ethics")]
    Policy,
    #[serde(rename = "Open Source & Developer Tools")]
    OpenSource,
    #[serde(rename = "Robotics & Autonomous Systems")]
    Robotics,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Research,
        Category::Products,
        Category::Industry,
        Category::Policy,
        Category::OpenSource,
        Category::Robotics,
        Category::Other,
    ];

    /// The label the model is asked to use.
    pub fn label(self) -> &'static str {
        match self {
            Category::Research => "Research Breakthroughs",
            Category::Products => "Product Launches & Updates",
            Category::Industry => "Industry News & Business",
            Category::Policy => "Policy, Safety & Ethics",
            Category::OpenSource => "Open Source & Developer Tools",
            Category::Robotics => "Robotics & Autonomous Systems",
            Category::Other => "Other",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Research => "New papers, model capabilities, benchmarks, scientific discoveries",
            Category::Products => "New AI products, feature releases, version updates",
            Category::Industry => "Funding rounds, acquisitions, partnerships, company news",
            Category::Policy => "Regulations, safety research, alignment, governance",
            Category::OpenSource => "Open-source releases, APIs, frameworks, developer resources",
            Category::Robotics => "Robots, autonomous vehicles, physical AI",
            Category::Other => "General tech news, miscellaneous",
        }
    }

    /// Short tag shown next to the section heading.
    pub fn short_name(self) -> &'static str {
        match self {
            Category::Research => "Research",
            Category::Products => "Products",
            Category::Industry => "Business",
            Category::Policy => "Policy",
            Category::OpenSource => "Dev Tools",
            Category::Robotics => "Robotics",
            Category::Other => "Tech News",
        }
    }

    /// Badge colours `(text, background)` used by the renderers.
    pub fn colors(self) -> (&'static str, &'static str) {
        match self {
            Category::Research => ("#7C3AED", "#EDE9FE"),
            Category::Products => ("#0369A1", "#E0F2FE"),
            Category::Industry => ("#065F46", "#D1FAE5"),
            Category::Policy => ("#9D174D", "#FCE7F3"),
            Category::OpenSource => ("#92400E", "#FEF3C7"),
            Category::Robotics => ("#1E40AF", "#DBEAFE"),
            Category::Other => ("#374151", "#F3F4F6"),
        }
    }

    /// Resolve a label coming back from the model.
    ///
    /// Matching ignores case, surrounding whitespace and the separators the
    /// model tends to swap (`,` `/` `&` `and`), so "Policy/Safety/Ethics" and
    /// "policy, safety and ethics" both resolve. Anything else is `None`.
    pub fn from_label(label: &str) -> Option<Category> {
        let wanted = label_key(label);
        if wanted.is_empty() {
            return None;
        }
        if let Some(c) = Category::ALL
            .into_iter()
            .find(|c| label_key(c.label()) == wanted)
        {
            return Some(c);
        }
        match wanted.as_str() {
            "other ai tech news" | "other tech news" | "other news" => Some(Category::Other),
            _ => None,
        }
    }
}

fn label_key(label: &str) -> String {
    label
        .to_lowercase()
        .replace(['&', ',', '/', '-'], " ")
        .split_whitespace()
        .filter(|w| *w != "and")
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One validated category decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub story_id: StoryId,
    pub category: Category,
    /// Optional per-story summary written by the model.
    pub summary: Option<String>,
}

/// One entry of the ranked top-story selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopStory {
    pub story_id: StoryId,
    pub extended_summary: String,
}

/// Upper bound on the length of the top-story selection.
pub const MAX_TOP_STORIES: usize = 5;

/// The time span covered by a briefing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Human readable form, e.g. `Oct 09 - Oct 16, 2026`.
    pub fn display(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%b %d"),
            self.end.format("%b %d, %Y")
        )
    }
}

/// A candidate story enriched with its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefingStory {
    pub id: StoryId,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub published: DateTime<Utc>,
    pub source: Source,
    pub category: Category,
    /// Summary written by the model, when it supplied one.
    pub model_summary: Option<String>,
}

impl BriefingStory {
    /// The best available description: the model's summary, else the source excerpt.
    pub fn best_summary(&self) -> &str {
        match self.model_summary.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => &self.summary,
        }
    }
}

/// The final product of one run.
///
/// Built once by the assembler; every story appears exactly once in
/// `stories` (indexed by its `StoryId`) and every `top_stories` entry
/// resolves to one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Briefing {
    pub date_range: DateRange,
    pub executive_summary: String,
    pub stories: Vec<BriefingStory>,
    pub top_stories: Vec<TopStory>,
    pub source_stats: BTreeMap<Source, usize>,
    /// True when categorization fell back to degraded mode.
    pub degraded: bool,
}

impl Briefing {
    pub fn story(&self, id: StoryId) -> Option<&BriefingStory> {
        self.stories.get(id.0).filter(|s| s.id == id)
    }

    /// Top stories paired with the story they reference, in rank order.
    pub fn resolved_top_stories(&self) -> impl Iterator<Item = (&BriefingStory, &str)> {
        self.top_stories
            .iter()
            .filter_map(|t| self.story(t.story_id).map(|s| (s, t.extended_summary.as_str())))
    }

    /// Stories grouped by category, categories in taxonomy order, empty ones omitted.
    pub fn by_category(&self) -> BTreeMap<Category, Vec<&BriefingStory>> {
        let mut groups: BTreeMap<Category, Vec<&BriefingStory>> = BTreeMap::new();
        for story in &self.stories {
            groups.entry(story.category).or_default().push(story);
        }
        groups
    }

    pub fn category_count(&self) -> usize {
        self.by_category().len()
    }

    pub fn source_count(&self) -> usize {
        self.source_stats.values().filter(|n| **n > 0).count()
    }
}

/// A condition that degraded the run without failing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A fetcher failed or timed out and was left out of aggregation.
    SourceFailed { source: Source, reason: String },
    /// The prompt budget forced the oldest candidates out of the model request.
    PayloadTruncated { included: usize, dropped: usize },
    /// The model reply could not be parsed; fallback categorization was used.
    Degraded { reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::SourceFailed { source, reason } => {
                write!(f, "source {source} unavailable: {reason}")
            }
            Warning::PayloadTruncated { included, dropped } => write!(
                f,
                "prompt budget exceeded: {dropped} stories dropped, {included} sent to the model"
            ),
            Warning::Degraded { reason } => write!(f, "degraded mode: {reason}"),
        }
    }
}

/// Outcome of a successful run: the briefing plus its warnings.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub briefing: Briefing,
    pub warnings: Vec<Warning>,
}

impl RunReport {
    pub fn failed_sources(&self) -> Vec<Source> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                Warning::SourceFailed { source, .. } => Some(*source),
                _ => None,
            })
            .collect()
    }

    pub fn dropped_count(&self) -> usize {
        self.warnings
            .iter()
            .map(|w| match w {
                Warning::PayloadTruncated { dropped, .. } => *dropped,
                _ => 0,
            })
            .sum()
    }

    pub fn is_degraded(&self) -> bool {
        self.warnings.iter().any(|w| matches!(w, Warning::Degraded { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_source_ordinal_follows_declaration() {
        let mut shuffled = vec![Source::Wired, Source::HackerNews, Source::TheVerge];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Source::HackerNews, Source::TheVerge, Source::Wired]
        );
    }

    #[test]
    fn test_source_config_key_roundtrip() {
        for s in Source::ALL {
            assert_eq!(Source::from_config_key(s.config_key()), Some(s));
        }
        assert_eq!(Source::from_config_key("The-Verge"), Some(Source::TheVerge));
        assert_eq!(Source::from_config_key("reddit"), None);
    }

    #[test]
    fn test_category_from_label_accepts_aliases() {
        assert_eq!(
            Category::from_label("Policy/Safety/Ethics"),
            Some(Category::Policy)
        );
        assert_eq!(
            Category::from_label("  research breakthroughs "),
            Some(Category::Research)
        );
        assert_eq!(
            Category::from_label("Open Source and Developer Tools"),
            Some(Category::OpenSource)
        );
        assert_eq!(
            Category::from_label("Other AI & Tech News"),
            Some(Category::Other)
        );
        assert_eq!(Category::from_label("Sports"), None);
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&Category::OpenSource).unwrap();
        assert_eq!(json, "\"Open Source & Developer Tools\"");
    }

    #[test]
    fn test_date_range_display() {
        let range = DateRange {
            start: Utc.with_ymd_and_hms(2026, 10, 9, 8, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap(),
        };
        assert_eq!(range.display(), "Oct 09 - Oct 16, 2026");
    }

    #[test]
    fn test_best_summary_prefers_model_text() {
        let mut story = BriefingStory {
            id: StoryId(0),
            title: "T".into(),
            url: "https://example.com/a".into(),
            summary: "raw".into(),
            published: Utc.with_ymd_and_hms(2026, 10, 9, 8, 0, 0).unwrap(),
            source: Source::Wired,
            category: Category::Other,
            model_summary: Some("model".into()),
        };
        assert_eq!(story.best_summary(), "model");
        story.model_summary = Some("   ".into());
        assert_eq!(story.best_summary(), "raw");
    }

    #[test]
    fn test_warning_serialization_is_tagged() {
        let w = Warning::PayloadTruncated {
            included: 200,
            dropped: 300,
        };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"kind\":\"payload_truncated\""));
        assert!(json.contains("\"dropped\":300"));
    }
}
