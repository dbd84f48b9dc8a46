//! Command-line interface definitions for the AI news briefing.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Flags given here override values from the YAML config file.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the AI news briefing.
///
/// # Examples
///
/// ```sh
/// # Fetch, summarize and email the weekly briefing
/// ai_news_briefing
///
/// # Preview a 3-day briefing without sending, keeping the artifacts
/// ai_news_briefing --dry-run --days 3 -o briefing.html --pdf-output briefing.pdf --save-json briefing.json
///
/// # Skip flaky sources
/// ai_news_briefing --disable-source wired --disable-source the_verge
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a briefing.yaml config file
    #[arg(short, long, env = "BRIEFING_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of days to look back (overrides the config file)
    #[arg(short, long)]
    pub days: Option<i64>,

    /// Model identifier (overrides the config file)
    #[arg(long, env = "BRIEFING_MODEL")]
    pub model: Option<String>,

    /// Character budget for the story list sent to the model
    #[arg(long)]
    pub budget_chars: Option<usize>,

    /// Minimum number of stories required to proceed
    #[arg(long)]
    pub min_stories: Option<usize>,

    /// Disable a source by key (repeatable), e.g. `hacker_news`, `wired`
    #[arg(long = "disable-source", value_name = "SOURCE")]
    pub disable_sources: Vec<String>,

    /// Build the briefing but print it instead of sending email
    #[arg(long)]
    pub dry_run: bool,

    /// Save the HTML briefing to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Save the PDF report to this path
    #[arg(long)]
    pub pdf_output: Option<PathBuf>,

    /// Save the briefing as JSON to this path (for debugging)
    #[arg(long)]
    pub save_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["ai_news_briefing"]);
        assert!(!cli.dry_run);
        assert_eq!(cli.days, None);
        assert!(cli.disable_sources.is_empty());
        assert_eq!(cli.output, None);
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "ai_news_briefing",
            "--dry-run",
            "--days",
            "3",
            "--model",
            "claude-haiku",
            "--budget-chars",
            "20000",
            "--save-json",
            "./out/briefing.json",
            "--pdf-output",
            "./out/briefing.pdf",
        ]);

        assert!(cli.dry_run);
        assert_eq!(cli.days, Some(3));
        assert_eq!(cli.model.as_deref(), Some("claude-haiku"));
        assert_eq!(cli.budget_chars, Some(20000));
        assert_eq!(cli.save_json, Some(PathBuf::from("./out/briefing.json")));
        assert_eq!(cli.pdf_output, Some(PathBuf::from("./out/briefing.pdf")));
    }

    #[test]
    fn test_cli_short_flags_and_repeated_sources() {
        let cli = Cli::parse_from([
            "ai_news_briefing",
            "-d",
            "14",
            "-o",
            "/tmp/briefing.html",
            "--disable-source",
            "wired",
            "--disable-source",
            "arxiv",
        ]);

        assert_eq!(cli.days, Some(14));
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/briefing.html")));
        assert_eq!(cli.disable_sources, vec!["wired", "arxiv"]);
    }
}
