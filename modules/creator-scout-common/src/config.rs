use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScoutError;
use crate::types::{DEFAULT_CONTENT_CHAR_CAP, MAX_SCORE, MIN_SCORE};

/// Secrets and environment-specific values, loaded from the environment.
/// Run tuning lives in [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    // Evaluator / planner LLMs
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,

    // Search
    pub google_api_key: Option<String>,
    pub search_engine_id: Option<String>,
    pub serper_api_key: Option<String>,

    // Fetching
    pub chrome_bin: String,

    // Run logs
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            gemini_api_key: non_empty_env("GEMINI_API_KEY"),
            anthropic_api_key: non_empty_env("ANTHROPIC_API_KEY"),
            google_api_key: non_empty_env("GOOGLE_API_KEY"),
            search_engine_id: non_empty_env("SEARCH_ENGINE_ID"),
            serper_api_key: non_empty_env("SERPER_API_KEY"),
            chrome_bin: non_empty_env("CHROME_BIN").unwrap_or_else(|| "chromium".to_string()),
            data_dir: PathBuf::from(non_empty_env("DATA_DIR").unwrap_or_else(|| "data".to_string())),
        };

        config.log_keys();
        config
    }

    /// Credentials for the Google Custom Search API, if both halves are set.
    pub fn google_search(&self) -> Option<(&str, &str)> {
        match (&self.google_api_key, &self.search_engine_id) {
            (Some(key), Some(cx)) => Some((key.as_str(), cx.as_str())),
            _ => None,
        }
    }

    /// Fail before dispatch unless at least one search provider and one LLM are configured.
    pub fn require_providers(&self) -> Result<(), ScoutError> {
        if self.google_search().is_none() && self.serper_api_key.is_none() {
            return Err(ScoutError::config(
                "no search provider configured: set GOOGLE_API_KEY and SEARCH_ENGINE_ID, or SERPER_API_KEY",
            ));
        }
        if self.gemini_api_key.is_none() && self.anthropic_api_key.is_none() {
            return Err(ScoutError::config(
                "no evaluator configured: set GEMINI_API_KEY or ANTHROPIC_API_KEY",
            ));
        }
        Ok(())
    }

    fn log_keys(&self) {
        fn preview(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let n = v.chars().count().min(5);
                    let head: String = v.chars().take(n).collect();
                    format!("{head}...({} chars)", v.len())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  GEMINI_API_KEY: {}", preview(&self.gemini_api_key));
        tracing::info!("  ANTHROPIC_API_KEY: {}", preview(&self.anthropic_api_key));
        tracing::info!("  GOOGLE_API_KEY: {}", preview(&self.google_api_key));
        tracing::info!("  SEARCH_ENGINE_ID: {}", preview(&self.search_engine_id));
        tracing::info!("  SERPER_API_KEY: {}", preview(&self.serper_api_key));
        tracing::info!("  CHROME_BIN: {}", self.chrome_bin);
        tracing::info!("  DATA_DIR: {}", self.data_dir.display());
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// What the evaluator gets to read for each hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Fetch the page and evaluate its extracted text.
    Page,
    /// Evaluate the search hit's title and snippet without fetching.
    Snippet,
}

/// Tuning for one discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Candidates scoring below this are dropped.
    pub threshold: u8,
    /// Max simultaneously in-flight fetch-and-score units.
    pub concurrency_limit: usize,
    /// Max hits taken from each search query.
    pub per_query_hit_cap: usize,
    /// Deadline for one fetch. Fetchers that bound their own duration
    /// (Chrome) apply it per attempt instead.
    pub fetch_timeout: Duration,
    pub evaluate_timeout: Duration,
    /// Overall deadline; when it passes no new work is dispatched.
    pub run_timeout: Option<Duration>,
    pub content_char_cap: usize,
    pub mode: EvaluationMode,
}

impl PipelineConfig {
    /// Conversational preset: low bar, snippet-only evaluation.
    pub fn interactive() -> Self {
        Self {
            threshold: 3,
            concurrency_limit: 4,
            per_query_hit_cap: 6,
            fetch_timeout: Duration::from_secs(30),
            evaluate_timeout: Duration::from_secs(60),
            run_timeout: Some(Duration::from_secs(180)),
            content_char_cap: DEFAULT_CONTENT_CHAR_CAP,
            mode: EvaluationMode::Snippet,
        }
    }

    /// Batch preset: higher bar, full page fetch.
    pub fn batch() -> Self {
        Self {
            threshold: 6,
            concurrency_limit: 4,
            per_query_hit_cap: 10,
            fetch_timeout: Duration::from_secs(30),
            evaluate_timeout: Duration::from_secs(60),
            run_timeout: None,
            content_char_cap: DEFAULT_CONTENT_CHAR_CAP,
            mode: EvaluationMode::Page,
        }
    }

    pub fn validate(&self) -> Result<(), ScoutError> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.threshold) {
            return Err(ScoutError::Config(format!(
                "threshold must be within {MIN_SCORE}..={MAX_SCORE}, got {}",
                self.threshold
            )));
        }
        if self.concurrency_limit == 0 {
            return Err(ScoutError::config("concurrency limit must be at least 1"));
        }
        if self.per_query_hit_cap == 0 {
            return Err(ScoutError::config("per-query hit cap must be at least 1"));
        }
        if self.content_char_cap == 0 {
            return Err(ScoutError::config("content char cap must be at least 1"));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::batch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_keep_historical_thresholds() {
        assert_eq!(PipelineConfig::interactive().threshold, 3);
        assert_eq!(PipelineConfig::batch().threshold, 6);
        assert_eq!(PipelineConfig::interactive().mode, EvaluationMode::Snippet);
        assert_eq!(PipelineConfig::batch().mode, EvaluationMode::Page);
        assert_eq!(PipelineConfig::interactive().per_query_hit_cap, 6);
        assert_eq!(PipelineConfig::batch().per_query_hit_cap, 10);
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let config = PipelineConfig {
            threshold: 11,
            ..PipelineConfig::batch()
        };
        assert!(matches!(config.validate(), Err(ScoutError::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let config = PipelineConfig {
            concurrency_limit: 0,
            ..PipelineConfig::batch()
        };
        assert!(config.validate().unwrap_err().is_fatal());
    }

    #[test]
    fn missing_providers_is_config_error() {
        let config = AppConfig::default();
        assert!(matches!(config.require_providers(), Err(ScoutError::Config(_))));

        let config = AppConfig {
            serper_api_key: Some("key".into()),
            gemini_api_key: Some("key".into()),
            ..AppConfig::default()
        };
        assert!(config.require_providers().is_ok());
    }

    #[test]
    fn google_search_needs_both_key_and_engine_id() {
        let config = AppConfig {
            google_api_key: Some("key".into()),
            ..AppConfig::default()
        };
        assert!(config.google_search().is_none());
    }
}
