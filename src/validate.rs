//! Validation and repair of the model's reply.
//!
//! The reply is untrusted input. It is decoded into a loose
//! [`serde_json::Value`] first and every field is then checked against the
//! set of story ids that were actually sent:
//!
//! 1. Unparseable text yields [`MalformedResponse`]; the caller switches to
//!    [`degraded`] output.
//! 2. Assignments with unknown ids or unknown categories are discarded and
//!    every included story without one falls back to [`Category::Other`].
//! 3. Top stories with unknown ids are discarded, duplicates keep their first
//!    occurrence, and the list is cut to [`MAX_TOP_STORIES`]. It is never padded.
//! 4. A missing executive summary is replaced by [`synthesize_summary`].

use crate::error::MalformedResponse;
use crate::models::{CandidateStory, Category, CategoryAssignment, MAX_TOP_STORIES, StoryId, TopStory};
use crate::utils::{looks_truncated, truncate_for_log};
use itertools::Itertools;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Categorization output ready for assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    /// Exactly one entry per included story, in inclusion order.
    pub assignments: Vec<CategoryAssignment>,
    pub top_stories: Vec<TopStory>,
    pub executive_summary: String,
}

/// Strip Markdown code fences and any prose around the outermost JSON object.
pub fn extract_json(reply: &str) -> &str {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json") on the opening fence line.
        text = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        text = text.trim_end();
        text = text.strip_suffix("```").unwrap_or(text).trim();
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Decode the reply into its top-level object.
pub fn parse_reply(reply: &str) -> Result<Map<String, Value>, MalformedResponse> {
    let json = extract_json(reply);
    let value: Value = serde_json::from_str(json).map_err(|e| {
        if looks_truncated(&e) {
            warn!("Model reply looks cut off (EOF while parsing)");
        }
        debug!(preview = %truncate_for_log(reply, 400), "Unparseable model reply");
        MalformedResponse::NotJson(e)
    })?;
    let Value::Object(map) = value else {
        return Err(MalformedResponse::NotAnObject);
    };
    let known = ["executive_summary", "top_stories", "assignments", "categories"];
    if !known.iter().any(|k| map.contains_key(*k)) {
        return Err(MalformedResponse::MissingFields);
    }
    Ok(map)
}

/// Read a story id given as a JSON number or a numeric string.
fn coerce_id(value: &Value) -> Option<StoryId> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| StoryId(n as usize)),
        Value::String(s) => s.trim().trim_start_matches('#').parse().ok().map(StoryId),
        _ => None,
    }
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A provisional assignment before the id is checked.
struct Proposed {
    id: Option<StoryId>,
    category: Option<Category>,
    summary: Option<String>,
}

/// Collect assignments from either the `assignments` list or a `categories`
/// object keyed by label, in reply order.
fn proposed_assignments(reply: &Map<String, Value>) -> Vec<Proposed> {
    let mut out = Vec::new();
    if let Some(list) = reply.get("assignments").and_then(Value::as_array) {
        for entry in list {
            out.push(Proposed {
                id: entry.get("story_id").and_then(coerce_id),
                category: entry
                    .get("category")
                    .and_then(Value::as_str)
                    .and_then(Category::from_label),
                summary: non_blank(entry.get("summary")),
            });
        }
    }
    if let Some(groups) = reply.get("categories").and_then(Value::as_object) {
        for (label, entries) in groups {
            let category = Category::from_label(label);
            for entry in entries.as_array().into_iter().flatten() {
                let (id, summary) = match entry {
                    Value::Object(obj) => (
                        obj.get("story_id").and_then(coerce_id),
                        non_blank(obj.get("summary")),
                    ),
                    other => (coerce_id(other), None),
                };
                out.push(Proposed {
                    id,
                    category,
                    summary,
                });
            }
        }
    }
    out
}

/// Validate a parsed reply against the stories that were sent.
///
/// `stories` is the full candidate set, indexed by id; `included` is the
/// subset that appeared in the prompt.
pub fn validate(
    reply: &Map<String, Value>,
    included: &[StoryId],
    stories: &[CandidateStory],
) -> Validated {
    let allowed: BTreeSet<StoryId> = included.iter().copied().collect();

    let mut chosen: HashMap<StoryId, CategoryAssignment> = HashMap::new();
    let mut discarded = 0usize;
    for p in proposed_assignments(reply) {
        match (p.id, p.category) {
            (Some(id), Some(category)) if allowed.contains(&id) => {
                chosen.entry(id).or_insert(CategoryAssignment {
                    story_id: id,
                    category,
                    summary: p.summary,
                });
            }
            _ => discarded += 1,
        }
    }
    let mut synthesized = 0usize;
    let assignments: Vec<CategoryAssignment> = included
        .iter()
        .map(|id| {
            chosen.remove(id).unwrap_or_else(|| {
                synthesized += 1;
                CategoryAssignment {
                    story_id: *id,
                    category: Category::Other,
                    summary: None,
                }
            })
        })
        .collect();

    let raw_summary = |id: StoryId| {
        stories
            .get(id.0)
            .map(|s| s.item.summary.clone())
            .unwrap_or_default()
    };
    let entries = reply
        .get("top_stories")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let top_stories: Vec<TopStory> = entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("story_id").and_then(coerce_id).or_else(|| coerce_id(entry))?;
            allowed.contains(&id).then(|| TopStory {
                story_id: id,
                extended_summary: non_blank(entry.get("extended_summary"))
                    .unwrap_or_else(|| raw_summary(id)),
            })
        })
        .unique_by(|t| t.story_id)
        .take(MAX_TOP_STORIES)
        .collect();

    let executive_summary = match non_blank(reply.get("executive_summary")) {
        Some(s) => s,
        None => {
            warn!("Model reply has no executive summary; synthesizing one");
            synthesize_summary(stories, &assignments)
        }
    };

    if discarded > 0 || synthesized > 0 {
        warn!(
            discarded,
            synthesized,
            "Repaired category assignments in model reply"
        );
    }
    info!(
        assignments = assignments.len(),
        top_stories = top_stories.len(),
        "Validated model reply"
    );
    Validated {
        assignments,
        top_stories,
        executive_summary,
    }
}

/// Fallback output when the reply could not be used at all.
///
/// Every story is `Other` and the first `min(5, N)` candidates become the top
/// stories with their source excerpts.
pub fn degraded(stories: &[CandidateStory]) -> Validated {
    let assignments: Vec<CategoryAssignment> = stories
        .iter()
        .map(|s| CategoryAssignment {
            story_id: s.id,
            category: Category::Other,
            summary: None,
        })
        .collect();
    let top_stories = stories
        .iter()
        .take(MAX_TOP_STORIES)
        .map(|s| TopStory {
            story_id: s.id,
            extended_summary: s.item.summary.clone(),
        })
        .collect();
    let executive_summary = synthesize_summary(stories, &assignments);
    Validated {
        assignments,
        top_stories,
        executive_summary,
    }
}

/// Deterministic executive summary built from story counts.
///
/// Stories without an assignment count as `Other`.
pub fn synthesize_summary(stories: &[CandidateStory], assignments: &[CategoryAssignment]) -> String {
    let by_id: HashMap<StoryId, Category> = assignments
        .iter()
        .map(|a| (a.story_id, a.category))
        .collect();
    let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
    for story in stories {
        let category = by_id.get(&story.id).copied().unwrap_or(Category::Other);
        *counts.entry(category).or_insert(0) += 1;
    }
    let sources = stories.iter().map(|s| s.item.source).unique().count();
    let breakdown = counts
        .iter()
        .map(|(category, n)| format!("{n} {}", category.label()))
        .join(", ");
    format!(
        "This briefing covers {} {} from {} {}: {}.",
        stories.len(),
        if stories.len() == 1 { "story" } else { "stories" },
        sources,
        if sources == 1 { "source" } else { "sources" },
        breakdown
    )
}
