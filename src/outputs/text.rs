//! Plain-text rendition, used for the email text part and `--dry-run`.

use crate::models::Briefing;
use std::fmt::Write;

const RULE: usize = 60;
const SUBRULE: usize = 40;

pub fn render_text(briefing: &Briefing) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "AI & TECH WEEKLY BRIEFING");
    let _ = writeln!(out, "{}", briefing.date_range.display());
    let _ = writeln!(
        out,
        "{} stories | {} sources | {} categories",
        briefing.stories.len(),
        briefing.source_count(),
        briefing.category_count()
    );
    let _ = writeln!(out, "{}", "=".repeat(RULE));
    if briefing.degraded {
        let _ = writeln!(out, "NOTE: automatic categorization was unavailable for this edition.");
    }

    let _ = writeln!(out, "\nEXECUTIVE SUMMARY\n{}", "-".repeat(SUBRULE));
    let _ = writeln!(out, "{}", briefing.executive_summary);

    let _ = writeln!(out, "\nTOP STORIES\n{}", "-".repeat(SUBRULE));
    for (rank, (story, extended)) in briefing.resolved_top_stories().enumerate() {
        let _ = writeln!(out, "{}. {} [{}]", rank + 1, story.title, story.source);
        let _ = writeln!(out, "   {}", story.url);
        let _ = writeln!(out, "   {extended}\n");
    }

    for (category, stories) in briefing.by_category() {
        let _ = writeln!(
            out,
            "\n{} ({})\n{}",
            category.label().to_uppercase(),
            stories.len(),
            "-".repeat(SUBRULE)
        );
        for story in stories {
            let _ = writeln!(out, "* {} [{}]", story.title, story.source);
            let _ = writeln!(out, "  {}", story.url);
            let _ = writeln!(out, "  {}\n", story.best_summary());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::tests::sample_briefing;

    #[test]
    fn test_plain_text_layout() {
        let text = render_text(&sample_briefing());
        assert!(text.starts_with("AI & TECH WEEKLY BRIEFING\nOct 09 - Oct 16, 2026\n"));
        assert!(text.contains("2 stories | 2 sources | 2 categories"));
        assert!(text.contains("1. Model <X> beats \"GPT\" & friends [ArXiv]"));
        assert!(text.contains("RESEARCH BREAKTHROUGHS (1)"));
        assert!(text.contains("* Startup raises $100M [TechCrunch]\n  https://techcrunch.com/raise\n  Funding news."));
        assert!(!text.contains("NOTE:"));
    }
}
