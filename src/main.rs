//! # AI News Briefing
//!
//! A weekly AI and technology news briefing generator. It pulls recent items
//! from seven outlets, has a generative model categorize and summarize them
//! in a single request, and delivers the result as an HTML email.
//!
//! ## Features
//!
//! - Fetches from Hacker News, ArXiv, TechCrunch, The Verge, MIT Technology
//!   Review, VentureBeat and Wired concurrently, tolerating individual outages
//! - Deduplicates by normalized URL and assigns reproducible story ids
//! - One model round trip per run, validated and repaired before use
//! - Degrades to an uncategorized briefing instead of failing on bad replies
//! - Outputs an HTML email, a PDF report, a plain-text digest and an optional JSON artifact
//!
//! ## Usage
//!
//! ```sh
//! ai_news_briefing --dry-run --days 7 -o briefing.html
//! ```
//!
//! ## Architecture
//!
//! 1. **Aggregation**: Run every enabled fetcher, merge, dedup, sort
//! 2. **Prompting**: Serialize the candidates under a character budget
//! 3. **Model call**: One request with bounded retries on transient errors
//! 4. **Validation**: Repair or replace the reply, then assemble the briefing
//! 5. **Output**: Save artifacts, then print (dry run) or email the briefing

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::time::{Duration as StdDuration, Instant};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod api;
mod assemble;
mod cli;
mod config;
mod delivery;
mod error;
mod models;
mod outputs;
mod pipeline;
mod prompt;
mod scrapers;
mod utils;
mod validate;

use api::AnthropicClient;
use cli::Cli;
use config::Config;
use delivery::{EmailSender, EmailSettings};
use outputs::Format;
use pipeline::produce_briefing_with_deadline;
use utils::ensure_writable_parent;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "ai_news_briefing starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = Config::load(args.config.as_deref())?;
    config.apply_cli(&args)?;
    info!(
        lookback_days = config.lookback_days,
        model = %config.model.id,
        budget_chars = config.prompt.budget_chars,
        dry_run = args.dry_run,
        "Configuration ready"
    );

    // Early checks: fail before spending fetches and a model call.
    for path in [&args.output, &args.pdf_output, &args.save_json]
        .into_iter()
        .flatten()
    {
        if let Err(e) = ensure_writable_parent(path).await {
            error!(path = %path.display(), error = %e, "Output location is not writable");
            return Err(e.into());
        }
    }
    let sender = if args.dry_run {
        None
    } else {
        let settings = EmailSettings::resolve(&config.email, |k| std::env::var(k).ok())?;
        Some(EmailSender::new(settings)?)
    };
    let api_key = config.model.resolve_api_key();
    if api_key.is_empty() {
        error!(env = config::API_KEY_ENV, "No model API key configured");
        return Err(error::ModelError::MissingApiKey.into());
    }

    // ---- Collaborators ----
    let fetch_client = scrapers::http_client(StdDuration::from_secs(config.fetch_timeout_secs))?;
    let fetchers = scrapers::registry(&fetch_client, |s| config.source_enabled(s));
    if fetchers.is_empty() {
        error!("Every source is disabled; nothing to fetch");
        return Err("every source is disabled".into());
    }
    let model_client = reqwest::Client::builder()
        .timeout(StdDuration::from_secs(config.model.request_timeout_secs))
        .build()?;
    let model = AnthropicClient::new(
        model_client,
        config.model.endpoint.clone(),
        api_key,
        config.model.id.clone(),
        config.model.max_tokens,
    );

    // ---- Run ----
    let pipeline_config = config.to_pipeline_config(Utc::now());
    let report =
        match produce_briefing_with_deadline(&pipeline_config, &fetchers, &model, config.run_timeout())
            .await
        {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Briefing run failed");
                return Err(e.into());
            }
        };
    for warning in &report.warnings {
        warn!(%warning, "Run completed with warning");
    }
    let briefing = &report.briefing;

    // ---- Artifacts ----
    if let Some(path) = &args.save_json {
        if let Err(e) = outputs::save(briefing, Format::Json, path).await {
            warn!(error = %e, "Could not save JSON artifact");
        }
    }
    if let Some(path) = &args.output {
        if let Err(e) = outputs::save(briefing, Format::Html, path).await {
            warn!(error = %e, "Could not save HTML report");
        }
    }
    if let Some(path) = &args.pdf_output {
        if let Err(e) = outputs::save(briefing, Format::Pdf, path).await {
            warn!(error = %e, "Could not save PDF report");
        }
    }

    // ---- Delivery ----
    match sender {
        None => {
            info!("Dry run: skipping email send");
            let digest = outputs::render(briefing, Format::PlainText)?;
            println!("{}", String::from_utf8_lossy(&digest));
        }
        Some(sender) => {
            if let Err(e) = sender.send_briefing(briefing).await {
                error!(error = %e, "Email delivery failed");
                return Err(e.into());
            }
        }
    }

    info!(
        stories = briefing.stories.len(),
        top_stories = briefing.top_stories.len(),
        failed_sources = report.failed_sources().len(),
        dropped = report.dropped_count(),
        degraded = report.is_degraded(),
        elapsed_s = start_time.elapsed().as_secs_f64(),
        "Briefing pipeline completed"
    );
    Ok(())
}
