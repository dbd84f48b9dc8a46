//! Prompt construction for the single categorize-and-summarize request.
//!
//! One request asks for three things at once: a category for every
//! included story, a ranked top-five with extended summaries, and an
//! executive summary. Stories are identified to the model only by their
//! [`StoryId`].

use crate::models::{CandidateStory, Category, MAX_TOP_STORIES, StoryId};
use std::fmt::Write;
use tracing::{info, warn};

pub const SYSTEM_PROMPT: &str = "You are an expert AI and technology journalist writing a weekly briefing. \
You answer with a single JSON object and nothing else.";

/// Limits applied while serializing candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptConfig {
    /// Upper bound on the serialized story list, in characters.
    pub budget_chars: usize,
    /// Source excerpt length per story, in characters.
    pub summary_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            budget_chars: 60_000,
            summary_chars: 300,
        }
    }
}

/// A ready-to-send request and what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system: String,
    pub user: String,
    /// Ids sent to the model, in sort order.
    pub included: Vec<StoryId>,
    /// Candidates left out because the budget ran out.
    pub dropped: usize,
}

/// Serialized form of one story inside the prompt.
pub fn render_story(story: &CandidateStory, summary_chars: usize) -> String {
    let summary: String = story.item.summary.chars().take(summary_chars).collect();
    format!(
        "[{id}] SOURCE: {source}\n    TITLE: {title}\n    URL: {url}\n    PUBLISHED: {published}\n    SUMMARY: {summary}\n",
        id = story.id,
        source = story.item.source,
        title = story.item.title,
        url = story.item.url,
        published = story.item.published.format("%Y-%m-%d"),
    )
}

fn taxonomy() -> String {
    Category::ALL
        .iter()
        .map(|c| format!("- {}: {}", c.label(), c.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the request for `stories`, which must be in final sort order.
///
/// Stories are added in order until the next one would exceed the budget;
/// that story and everything after it are dropped, so the oldest candidates
/// go first. The budget counts characters, separators included.
pub fn build_prompt(stories: &[CandidateStory], config: &PromptConfig) -> PromptPayload {
    let mut news = String::new();
    let mut used = 0usize;
    let mut included = Vec::new();
    for story in stories {
        let block = render_story(story, config.summary_chars);
        // Block plus its trailing separator, counted in characters.
        let cost = block.chars().count() + 1;
        if used + cost > config.budget_chars {
            break;
        }
        news.push_str(&block);
        news.push('\n');
        used += cost;
        included.push(story.id);
    }
    let dropped = stories.len() - included.len();
    if dropped > 0 {
        warn!(
            included = included.len(),
            dropped,
            budget_chars = config.budget_chars,
            "Prompt budget exceeded; dropping oldest stories"
        );
    }

    let mut user = String::new();
    let _ = writeln!(
        user,
        "Below are {} AI and technology news items, each tagged with a numeric story id in brackets.\n",
        included.len()
    );
    let _ = writeln!(user, "NEWS ITEMS:\n{news}");
    let _ = writeln!(user, "CATEGORIES:\n{}\n", taxonomy());
    let _ = writeln!(
        user,
        r#"TASK:
Return a JSON object with exactly this structure:

{{
  "executive_summary": "3-5 concrete sentences on the most important developments of the week",
  "top_stories": [
    {{"story_id": 0, "extended_summary": "2-3 sentences on what happened and why it matters"}}
  ],
  "assignments": [
    {{"story_id": 0, "category": "one category label from the list", "summary": "1-2 sentence description"}}
  ]
}}

RULES:
- Refer to stories only by their numeric story_id.
- "assignments" must contain every story exactly once, using a category label exactly as listed.
- "top_stories" holds the {MAX_TOP_STORIES} most important distinct stories, most important first.
- Return only the JSON object: no markdown fences, no commentary."#
    );

    info!(
        stories = included.len(),
        prompt_chars = user.len(),
        "Built model prompt"
    );
    PromptPayload {
        system: SYSTEM_PROMPT.to_string(),
        user,
        included,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::order_and_assign;
    use crate::aggregator::tests::item;
    use crate::models::Source;

    fn stories(n: usize) -> Vec<CandidateStory> {
        order_and_assign(
            (0..n)
                .map(|i| {
                    item(
                        Source::ALL[i % 7],
                        &format!("Story number {i}"),
                        &format!("https://example.com/{i}"),
                        &"summary text ".repeat(i % 5 + 1),
                        i as i64,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_everything_fits() {
        let s = stories(10);
        let payload = build_prompt(&s, &PromptConfig::default());
        assert_eq!(payload.included.len(), 10);
        assert_eq!(payload.dropped, 0);
        assert!(payload.user.contains("[0] SOURCE:"));
        assert!(payload.user.contains("[9] SOURCE:"));
        for c in Category::ALL {
            assert!(payload.user.contains(c.label()));
        }
    }

    #[test]
    fn test_truncation_keeps_most_recent_prefix() {
        let s = stories(500);
        let config = PromptConfig {
            budget_chars: s[..200]
                .iter()
                .map(|c| render_story(c, 300).chars().count() + 1)
                .sum(),
            summary_chars: 300,
        };
        let payload = build_prompt(&s, &config);
        assert_eq!(payload.included.len(), 200);
        assert_eq!(payload.dropped, 300);
        let expected: Vec<StoryId> = s[..200].iter().map(|c| c.id).collect();
        assert_eq!(payload.included, expected);
        assert!(!payload.user.contains("[200] SOURCE:"));
    }

    #[test]
    fn test_budget_counts_characters_and_separators() {
        let mut s = stories(3);
        for c in &mut s {
            c.item.title = format!("Modèle génératif für Bücher {}", c.id);
        }
        let costs: Vec<usize> = s
            .iter()
            .map(|c| render_story(c, 300).chars().count() + 1)
            .collect();
        let exact = PromptConfig {
            budget_chars: costs[0] + costs[1],
            summary_chars: 300,
        };
        let payload = build_prompt(&s, &exact);
        assert_eq!(payload.included, vec![s[0].id, s[1].id]);
        assert_eq!(payload.dropped, 1);

        let one_short = PromptConfig {
            budget_chars: costs[0] + costs[1] - 1,
            ..exact
        };
        assert_eq!(build_prompt(&s, &one_short).included, vec![s[0].id]);
    }

    #[test]
    fn test_summary_is_capped() {
        let mut s = stories(1);
        s[0].item.summary = "x".repeat(1000);
        let block = render_story(&s[0], 300);
        assert!(block.contains(&"x".repeat(300)));
        assert!(!block.contains(&"x".repeat(301)));
    }

    #[test]
    fn test_zero_budget_includes_nothing() {
        let s = stories(3);
        let payload = build_prompt(
            &s,
            &PromptConfig {
                budget_chars: 0,
                summary_chars: 300,
            },
        );
        assert!(payload.included.is_empty());
        assert_eq!(payload.dropped, 3);
    }
}
