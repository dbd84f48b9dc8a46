//! The briefing pipeline: aggregate, prompt, ask, validate, assemble.
//!
//! [`produce_briefing`] is the only entry point. It is a function of its
//! inputs: the configuration (including the clock reading), the fetchers, and
//! the model. Fatal outcomes are [`PipelineError`]s; everything recoverable is
//! reported as a [`Warning`] next to the finished [`Briefing`].
//!
//! [`Briefing`]: crate::models::Briefing

use crate::aggregator::aggregate;
use crate::api::{AskAsync, RetryAsk};
use crate::assemble::assemble;
use crate::error::{ModelError, PipelineError};
use crate::models::{DateRange, RunReport, Warning};
use crate::prompt::{PromptConfig, build_prompt};
use crate::scrapers::{FetchNews, FetchWindow};
use crate::validate::{degraded, parse_reply, validate};
use chrono::{DateTime, Duration, Utc};
use std::time::{Duration as StdDuration, Instant};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Reference time for the lookback window.
    pub now: DateTime<Utc>,
    pub lookback: Duration,
    pub prompt: PromptConfig,
    /// Deadline for one fetcher's whole fetch, all of its requests included.
    pub source_timeout: StdDuration,
    /// Retries after the first model attempt, for transient failures only.
    pub model_retries: usize,
    pub retry_base_delay: StdDuration,
    /// Smallest candidate set worth a model call.
    pub min_stories: usize,
}

/// Produce one briefing.
///
/// # Errors
///
/// - [`PipelineError::NoDataAvailable`] when aggregation yields nothing
/// - [`PipelineError::TooFewStories`] when fewer than `min_stories` candidates remain
/// - [`PipelineError::ModelUnavailable`] when the model call fails after retries
///
/// A reply that arrives but is empty or unparseable is not an error; the run
/// falls back to degraded categorization instead.
#[instrument(level = "info", skip_all, fields(now = %config.now, fetchers = fetchers.len()))]
pub async fn produce_briefing<F, M>(
    config: &PipelineConfig,
    fetchers: &[F],
    model: &M,
) -> Result<RunReport, PipelineError>
where
    F: FetchNews,
    M: AskAsync<Response = String>,
{
    let t0 = Instant::now();
    let window = FetchWindow::lookback(config.now, config.lookback);
    let aggregation = aggregate(fetchers, &window, config.source_timeout).await?;
    if aggregation.stories.len() < config.min_stories {
        return Err(PipelineError::TooFewStories {
            found: aggregation.stories.len(),
            required: config.min_stories,
        });
    }

    let mut warnings: Vec<Warning> = aggregation
        .failures
        .iter()
        .map(|f| Warning::SourceFailed {
            source: f.source,
            reason: f.reason.clone(),
        })
        .collect();

    let stories = aggregation.stories;
    let payload = build_prompt(&stories, &config.prompt);
    if payload.dropped > 0 {
        warnings.push(Warning::PayloadTruncated {
            included: payload.included.len(),
            dropped: payload.dropped,
        });
    }

    let (validated, degraded_reason) = if payload.included.is_empty() {
        (
            degraded(&stories),
            Some("no story fits the prompt budget".to_string()),
        )
    } else {
        let retry = RetryAsk::new(model, config.model_retries, config.retry_base_delay);
        match retry.ask_counted(&payload).await {
            Ok(reply) => match parse_reply(&reply) {
                Ok(map) => (validate(&map, &payload.included, &stories), None),
                Err(e) => (degraded(&stories), Some(e.to_string())),
            },
            // The model answered, just with nothing usable.
            Err((_, ModelError::EmptyReply)) => (
                degraded(&stories),
                Some(ModelError::EmptyReply.to_string()),
            ),
            Err((attempts, source)) => {
                return Err(PipelineError::ModelUnavailable { attempts, source });
            }
        }
    };

    if let Some(reason) = &degraded_reason {
        warn!(%reason, "Falling back to degraded categorization");
        warnings.push(Warning::Degraded {
            reason: reason.clone(),
        });
    }

    let briefing = assemble(
        DateRange {
            start: window.since,
            end: window.until,
        },
        stories,
        validated,
        aggregation.source_stats,
        degraded_reason.is_some(),
    );

    info!(
        stories = briefing.stories.len(),
        top_stories = briefing.top_stories.len(),
        warnings = warnings.len(),
        degraded = briefing.degraded,
        elapsed_ms = t0.elapsed().as_millis(),
        "Briefing produced"
    );
    Ok(RunReport { briefing, warnings })
}

/// [`produce_briefing`] under a whole-run deadline.
///
/// On expiry the in-flight fetches and model call are dropped and
/// [`PipelineError::TimedOut`] is returned; no partial briefing escapes.
pub async fn produce_briefing_with_deadline<F, M>(
    config: &PipelineConfig,
    fetchers: &[F],
    model: &M,
    deadline: StdDuration,
) -> Result<RunReport, PipelineError>
where
    F: FetchNews,
    M: AskAsync<Response = String>,
{
    timeout(deadline, produce_briefing(config, fetchers, model))
        .await
        .map_err(|_| PipelineError::TimedOut(deadline))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tests::{MockFetcher, item, now};
    use crate::api::tests::ScriptedModel;
    use crate::models::{Category, RawItem, Source, StoryId};
    use crate::prompt::render_story;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;

    fn config() -> PipelineConfig {
        PipelineConfig {
            now: now(),
            lookback: Duration::days(7),
            prompt: PromptConfig::default(),
            source_timeout: StdDuration::from_secs(5),
            model_retries: 2,
            retry_base_delay: StdDuration::from_millis(1),
            min_stories: 1,
        }
    }

    fn items_for(source: Source, n: usize, offset: i64) -> Vec<RawItem> {
        (0..n)
            .map(|i| {
                item(
                    source,
                    &format!("{source} story {i}"),
                    &format!("https://{}.example.com/{i}", source.config_key().replace('_', "-")),
                    &format!("{source} summary {i}"),
                    offset + i as i64,
                )
            })
            .collect()
    }

    fn all_sources() -> Vec<MockFetcher> {
        Source::ALL
            .into_iter()
            .enumerate()
            .map(|(k, s)| MockFetcher::Items(s, items_for(s, 3, k as i64)))
            .collect()
    }

    fn good_reply(n: usize) -> String {
        let assignments: Vec<_> = (0..n)
            .map(|i| json!({"story_id": i, "category": Category::ALL[i % 7].label()}))
            .collect();
        json!({
            "executive_summary": "A week of models and money.",
            "top_stories": [
                {"story_id": 3, "extended_summary": "Three."},
                {"story_id": 0, "extended_summary": "Zero."}
            ],
            "assignments": assignments,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_runs_are_deterministic() {
        let fetchers = all_sources();
        let a = produce_briefing(&config(), &fetchers, &ScriptedModel::replying(&good_reply(21)))
            .await
            .unwrap();
        let mut reversed = all_sources();
        reversed.reverse();
        let b = produce_briefing(&config(), &reversed, &ScriptedModel::replying(&good_reply(21)))
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_string(&a.briefing).unwrap(),
            serde_json::to_string(&b.briefing).unwrap()
        );
        assert!(a.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_every_story_categorized_once_and_references_resolve() {
        let fetchers = all_sources();
        let reply = json!({
            "executive_summary": "x",
            "top_stories": [{"story_id": 500, "extended_summary": "ghost"}, {"story_id": 2}],
            "assignments": [
                {"story_id": 1, "category": "Research Breakthroughs"},
                {"story_id": 1, "category": "Other"},
                {"story_id": 77, "category": "Research Breakthroughs"}
            ]
        })
        .to_string();
        let report = produce_briefing(&config(), &fetchers, &ScriptedModel::replying(&reply))
            .await
            .unwrap();
        let b = &report.briefing;
        assert_eq!(b.stories.len(), 21);
        let ids: HashSet<StoryId> = b.stories.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 21);
        assert_eq!(b.stories[1].category, Category::Research);
        for t in &b.top_stories {
            assert!(b.story(t.story_id).is_some());
        }
        assert_eq!(b.top_stories.len(), 1);
        assert_eq!(b.top_stories[0].extended_summary, b.stories[2].summary);
    }

    #[tokio::test]
    async fn test_three_failed_sources_are_named() {
        let failed = [Source::ArXiv, Source::TheVerge, Source::Wired];
        let fetchers: Vec<MockFetcher> = Source::ALL
            .into_iter()
            .map(|s| {
                if failed.contains(&s) {
                    MockFetcher::Fails(s)
                } else {
                    MockFetcher::Items(s, items_for(s, 2, 0))
                }
            })
            .collect();
        let report = produce_briefing(&config(), &fetchers, &ScriptedModel::replying(&good_reply(8)))
            .await
            .unwrap();
        assert_eq!(report.failed_sources(), failed.to_vec());
        assert_eq!(report.briefing.stories.len(), 8);
        assert!(!report.is_degraded());
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_fatal() {
        let fetchers: Vec<MockFetcher> = Source::ALL.into_iter().map(MockFetcher::Fails).collect();
        let model = ScriptedModel::replying("{}");
        let err = produce_briefing(&config(), &fetchers, &model)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoDataAvailable { ref failures } if failures.len() == 7));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_too_few_stories_skips_model() {
        let fetchers = vec![MockFetcher::Items(Source::Wired, items_for(Source::Wired, 3, 0))];
        let mut cfg = config();
        cfg.min_stories = 10;
        let model = ScriptedModel::replying("{}");
        let err = produce_briefing(&cfg, &fetchers, &model).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TooFewStories {
                found: 3,
                required: 10
            }
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unparseable_reply_degrades() {
        let fetchers = vec![MockFetcher::Items(
            Source::TechCrunch,
            items_for(Source::TechCrunch, 10, 0),
        )];
        let model = ScriptedModel::replying("Sorry, the service is busy. Try again later.");
        let report = produce_briefing(&config(), &fetchers, &model).await.unwrap();
        let b = &report.briefing;

        assert!(report.is_degraded());
        assert!(b.degraded);
        assert_eq!(b.stories.len(), 10);
        assert!(b.stories.iter().all(|s| s.category == Category::Other));
        assert_eq!(b.top_stories.len(), 5);
        for (i, t) in b.top_stories.iter().enumerate() {
            assert_eq!(t.story_id, StoryId(i));
            assert_eq!(t.extended_summary, b.stories[i].summary);
        }
        assert!(!b.executive_summary.is_empty());
    }

    #[tokio::test]
    async fn test_empty_reply_degrades() {
        let fetchers = vec![MockFetcher::Items(Source::Wired, items_for(Source::Wired, 1, 0))];
        let model = ScriptedModel::new(vec![Err(ModelError::EmptyReply)]);
        let report = produce_briefing(&config(), &fetchers, &model).await.unwrap();

        assert!(report.is_degraded());
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        let b = &report.briefing;
        assert_eq!(b.stories[0].category, Category::Other);
        assert_eq!(b.top_stories.len(), 1);
        assert!(!b.executive_summary.is_empty());
    }

    #[tokio::test]
    async fn test_blank_reply_text_degrades() {
        let fetchers = vec![MockFetcher::Items(Source::Wired, items_for(Source::Wired, 2, 0))];
        let report = produce_briefing(&config(), &fetchers, &ScriptedModel::replying("   "))
            .await
            .unwrap();
        assert!(report.is_degraded());
        assert_eq!(report.briefing.stories.len(), 2);
    }

    #[tokio::test]
    async fn test_truncation_is_reported() {
        let all = items_for(Source::HackerNews, 500, 0);
        let candidates = crate::aggregator::order_and_assign(all.clone());
        let mut cfg = config();
        cfg.prompt.budget_chars = candidates[..200]
            .iter()
            .map(|c| render_story(c, cfg.prompt.summary_chars).chars().count() + 1)
            .sum();
        let fetchers = vec![MockFetcher::Items(Source::HackerNews, all)];
        let report = produce_briefing(&cfg, &fetchers, &ScriptedModel::replying(&good_reply(500)))
            .await
            .unwrap();

        assert_eq!(report.dropped_count(), 300);
        assert!(report.warnings.contains(&Warning::PayloadTruncated {
            included: 200,
            dropped: 300
        }));
        let b = &report.briefing;
        assert_eq!(b.stories.len(), 500);
        assert_eq!(b.stories[1].category, Category::ALL[1]);
        assert!(b.stories[200..].iter().all(|s| s.category == Category::Other));
    }

    #[tokio::test]
    async fn test_model_unavailable_after_retries() {
        let fetchers = all_sources();
        let model = ScriptedModel::new(vec![
            Err(ModelError::RateLimited),
            Err(ModelError::RateLimited),
            Err(ModelError::RateLimited),
        ]);
        let err = produce_briefing(&config(), &fetchers, &model)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ModelUnavailable { attempts: 3, .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_model_error_is_retried() {
        let fetchers = all_sources();
        let model = ScriptedModel::new(vec![
            Err(ModelError::Status {
                status: 529,
                body: "overloaded".into(),
            }),
            Ok(good_reply(21)),
        ]);
        let report = produce_briefing(&config(), &fetchers, &model).await.unwrap();
        assert!(!report.is_degraded());
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_deadline_cancels() {
        let fetchers = vec![MockFetcher::Hangs(Source::Wired)];
        let mut cfg = config();
        cfg.source_timeout = StdDuration::from_secs(60);
        let err = produce_briefing_with_deadline(
            &cfg,
            &fetchers,
            &ScriptedModel::replying("{}"),
            StdDuration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::TimedOut(_)));
    }
}
