//! Run configuration loaded from YAML.
//!
//! A missing file is not an error: every field has a default. Secrets are
//! read from the environment rather than stored in the file; a literal
//! `ENV` API key means "use `ANTHROPIC_API_KEY`".
//!
//! ```yaml
//! lookback_days: 7
//! model:
//!   id: claude-sonnet-4-5-20250929
//!   api_key: ENV
//! prompt:
//!   budget_chars: 60000
//! sources:
//!   wired: false
//! email:
//!   smtp_host: smtp.gmail.com
//!   recipients: [team@example.com]
//! ```

use crate::api::DEFAULT_ENDPOINT;
use crate::cli::Cli;
use crate::models::Source;
use crate::pipeline::PipelineConfig;
use crate::prompt::PromptConfig;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use thiserror::Error;
use tracing::{debug, info, instrument};

pub const DEFAULT_CONFIG_FILE: &str = "briefing.yaml";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
/// Longest accepted lookback window.
pub const MAX_LOOKBACK_DAYS: i64 = 366;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown source {name:?} (expected one of: {known})")]
    UnknownSource { name: String, known: String },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn unknown_source(name: &str) -> Self {
        ConfigError::UnknownSource {
            name: name.to_string(),
            known: known_sources(),
        }
    }
}

fn known_sources() -> String {
    Source::ALL
        .iter()
        .map(|s| s.config_key())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub id: String,
    /// Literal key, or `ENV` to read it from the environment.
    pub api_key: String,
    pub endpoint: String,
    pub max_tokens: u32,
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: "claude-sonnet-4-5-20250929".to_string(),
            api_key: "ENV".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_tokens: 8000,
            max_retries: 2,
            base_delay_ms: 1000,
            request_timeout_secs: 120,
        }
    }
}

impl ModelConfig {
    /// Resolve the API key; empty when neither the file nor the environment has one.
    pub fn resolve_api_key(&self) -> String {
        if self.api_key.trim().is_empty() || self.api_key == "ENV" {
            std::env::var(API_KEY_ENV).unwrap_or_default()
        } else {
            self.api_key.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub budget_chars: usize,
    pub summary_chars: usize,
}

impl Default for PromptSettings {
    fn default() -> Self {
        let d = PromptConfig::default();
        Self {
            budget_chars: d.budget_chars,
            summary_chars: d.summary_chars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Falls back to `SENDER_EMAIL`.
    pub sender: Option<String>,
    /// Falls back to the comma-separated `RECIPIENT_EMAIL`.
    pub recipients: Vec<String>,
    pub max_attempts: usize,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
            sender: None,
            recipients: Vec::new(),
            max_attempts: 3,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lookback_days: i64,
    pub model: ModelConfig,
    pub prompt: PromptSettings,
    /// Per-source enable flags keyed by config key; absent means enabled.
    pub sources: BTreeMap<String, bool>,
    /// Timeout for a single HTTP request made by a fetcher.
    pub fetch_timeout_secs: u64,
    /// Deadline for one source's whole fetch. Hacker News issues several
    /// requests in a row, so this must cover more than one request.
    pub source_timeout_secs: u64,
    pub run_timeout_secs: u64,
    /// Abort before the model call when fewer candidates than this were found.
    pub min_stories: usize,
    pub email: EmailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            model: ModelConfig::default(),
            prompt: PromptSettings::default(),
            sources: BTreeMap::new(),
            fetch_timeout_secs: 30,
            source_timeout_secs: 240,
            run_timeout_secs: 600,
            min_stories: 1,
            email: EmailConfig::default(),
        }
    }
}

impl Config {
    /// Load `path`, or the default file if present, or built-in defaults.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    info!("No config file; using defaults");
                    return Ok(Config::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for key in self.sources.keys() {
            if Source::from_config_key(key).is_none() {
                return Err(ConfigError::unknown_source(key));
            }
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            return Err(ConfigError::Invalid(format!(
                "lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}, got {}",
                self.lookback_days
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.source_timeout_secs < self.fetch_timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "source_timeout_secs ({}) must not be shorter than fetch_timeout_secs ({})",
                self.source_timeout_secs, self.fetch_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn source_enabled(&self, source: Source) -> bool {
        self.sources
            .iter()
            .find(|(k, _)| Source::from_config_key(k) == Some(source))
            .is_none_or(|(_, enabled)| *enabled)
    }

    /// Disable sources named on the command line.
    pub fn disable_sources(&mut self, keys: &[String]) -> Result<(), ConfigError> {
        for key in keys {
            let source =
                Source::from_config_key(key).ok_or_else(|| ConfigError::unknown_source(key))?;
            debug!(%source, "Source disabled");
            self.sources.retain(|k, _| Source::from_config_key(k) != Some(source));
            self.sources.insert(source.config_key().to_string(), false);
        }
        Ok(())
    }

    /// Apply command-line overrides on top of the file values.
    pub fn apply_cli(&mut self, args: &Cli) -> Result<(), ConfigError> {
        if let Some(days) = args.days {
            self.lookback_days = days;
        }
        if let Some(model) = &args.model {
            self.model.id = model.clone();
        }
        if let Some(budget) = args.budget_chars {
            self.prompt.budget_chars = budget;
        }
        if let Some(min) = args.min_stories {
            self.min_stories = min;
        }
        self.disable_sources(&args.disable_sources)?;
        self.validate()
    }

    pub fn run_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.run_timeout_secs)
    }

    /// The explicit per-run configuration handed to the pipeline.
    pub fn to_pipeline_config(&self, now: DateTime<Utc>) -> PipelineConfig {
        PipelineConfig {
            now,
            lookback: Duration::days(self.lookback_days),
            prompt: PromptConfig {
                budget_chars: self.prompt.budget_chars,
                summary_chars: self.prompt.summary_chars,
            },
            source_timeout: StdDuration::from_secs(self.source_timeout_secs),
            model_retries: self.model.max_retries,
            retry_base_delay: StdDuration::from_millis(self.model.base_delay_ms),
            min_stories: self.min_stories.max(1),
        }
    }
}
