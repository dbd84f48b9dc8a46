//! Pure assembly of the final [`Briefing`].

use crate::models::{Briefing, BriefingStory, CandidateStory, Category, DateRange, Source};
use crate::validate::Validated;
use std::collections::{BTreeMap, HashMap};

/// Merge candidates and validated model output into a [`Briefing`].
///
/// Every candidate appears exactly once, in id order. Candidates without an
/// assignment (for example those cut from the prompt) are `Other`, and top
/// stories that do not resolve to a candidate are dropped.
pub fn assemble(
    date_range: DateRange,
    candidates: Vec<CandidateStory>,
    validated: Validated,
    source_stats: BTreeMap<Source, usize>,
    degraded: bool,
) -> Briefing {
    let mut assigned: HashMap<_, _> = validated
        .assignments
        .into_iter()
        .map(|a| (a.story_id, a))
        .collect();

    let stories: Vec<BriefingStory> = candidates
        .into_iter()
        .map(|c| {
            let (category, model_summary) = match assigned.remove(&c.id) {
                Some(a) => (a.category, a.summary),
                None => (Category::Other, None),
            };
            BriefingStory {
                id: c.id,
                title: c.item.title,
                url: c.item.url,
                summary: c.item.summary,
                published: c.item.published,
                source: c.item.source,
                category,
                model_summary,
            }
        })
        .collect();

    let mut briefing = Briefing {
        date_range,
        executive_summary: validated.executive_summary,
        stories,
        top_stories: Vec::new(),
        source_stats,
        degraded,
    };
    let top_stories = validated
        .top_stories
        .into_iter()
        .filter(|t| briefing.story(t.story_id).is_some())
        .collect();
    briefing.top_stories = top_stories;
    briefing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tests::{item, now};
    use crate::aggregator::{order_and_assign, source_stats};
    use crate::models::{CategoryAssignment, StoryId, TopStory};
    use chrono::Duration;
    use std::collections::HashSet;

    fn candidates() -> Vec<CandidateStory> {
        order_and_assign(vec![
            item(Source::ArXiv, "Paper", "https://arxiv.org/abs/1", "abstract", 1),
            item(Source::Wired, "Robot", "https://wired.com/robot", "robots", 2),
            item(Source::TechCrunch, "Funding", "https://tc.com/f", "money", 3),
        ])
    }

    fn range() -> DateRange {
        DateRange {
            start: now() - Duration::days(7),
            end: now(),
        }
    }

    #[test]
    fn test_every_candidate_appears_once() {
        let c = candidates();
        let stats = source_stats(&c);
        let validated = Validated {
            assignments: vec![
                CategoryAssignment {
                    story_id: StoryId(0),
                    category: Category::Research,
                    summary: Some("New paper".into()),
                },
                CategoryAssignment {
                    story_id: StoryId(1),
                    category: Category::Robotics,
                    summary: None,
                },
            ],
            top_stories: vec![
                TopStory {
                    story_id: StoryId(1),
                    extended_summary: "robots!".into(),
                },
                TopStory {
                    story_id: StoryId(17),
                    extended_summary: "ghost".into(),
                },
            ],
            executive_summary: "Week.".into(),
        };
        let b = assemble(range(), c, validated, stats, false);

        assert_eq!(b.stories.len(), 3);
        let unique: HashSet<StoryId> = b.stories.iter().map(|s| s.id).collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(b.stories[0].category, Category::Research);
        assert_eq!(b.stories[0].best_summary(), "New paper");
        assert_eq!(b.stories[2].category, Category::Other);
        assert_eq!(b.top_stories.len(), 1);
        let (story, text) = b.resolved_top_stories().next().unwrap();
        assert_eq!(story.title, "Robot");
        assert_eq!(text, "robots!");
        assert_eq!(b.source_count(), 3);
        assert_eq!(b.category_count(), 3);
    }
}
