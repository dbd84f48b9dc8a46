//! Error types for the briefing pipeline and its collaborators.
//!
//! Only [`PipelineError`] escapes `produce_briefing`. Source failures and
//! unusable model replies are recovered inside the pipeline and surface as
//! [`crate::models::Warning`] values instead.

use crate::models::Source;
use std::time::Duration;
use thiserror::Error;

/// A single fetcher could not deliver items (`SourceUnavailable`).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("all {attempted} upstream requests failed; last error: {last}")]
    AllRequestsFailed { attempted: usize, last: String },
}

/// The generative model could not be reached or answered with an error.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model API key is not configured")]
    MissingApiKey,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited by the model API")]
    RateLimited,

    #[error("model API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model reply contained no text")]
    EmptyReply,
}

impl ModelError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Transport(_) | ModelError::RateLimited => true,
            ModelError::Status { status, .. } => *status >= 500 || *status == 408,
            ModelError::MissingApiKey | ModelError::EmptyReply => false,
        }
    }
}

/// The model answered, but not with a usable briefing object.
///
/// Never fatal: the validator falls back to degraded mode.
#[derive(Debug, Error)]
pub enum MalformedResponse {
    #[error("reply is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("reply JSON is not an object")]
    NotAnObject,

    #[error("reply object has none of the expected fields")]
    MissingFields,
}

/// A source that was excluded from aggregation, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: Source,
    pub reason: String,
}

/// Fatal outcomes of a briefing run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no news data available: {}", describe_failures(.failures))]
    NoDataAvailable { failures: Vec<SourceFailure> },

    #[error("model unavailable after {attempts} attempt(s): {source}")]
    ModelUnavailable {
        attempts: usize,
        #[source]
        source: ModelError,
    },

    #[error("only {found} stories found, {required} required")]
    TooFewStories { found: usize, required: usize },

    #[error("briefing run cancelled after {0:?}")]
    TimedOut(Duration),
}

fn describe_failures(failures: &[SourceFailure]) -> String {
    if failures.is_empty() {
        return "sources returned no items".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{} ({})", f.source, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}
