use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai_client::{Claude, Gemini, TextCompletion};
use creator_scout::evaluator::LlmEvaluator;
use creator_scout::fetcher::{ChromeFetcher, HttpFetcher};
use creator_scout::pipeline::PipelineDriver;
use creator_scout::planner::LlmQueryPlanner;
use creator_scout::search::{GoogleSearcher, SerperSearcher};
use creator_scout::traits::{ContentFetcher, QueryPlanner, WebSearcher};
use creator_scout_common::{AppConfig, EvaluationMode, PipelineConfig, RunResult, ScoutError};

const GEMINI_MODEL: &str = "gemini-2.0-flash";
const CLAUDE_MODEL: &str = "claude-haiku-4-5-20251001";

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// Low bar, evaluates search snippets only
    Interactive,
    /// Higher bar, fetches and reads every page
    Batch,
}

#[derive(Clone, Copy, ValueEnum)]
enum FetcherKind {
    /// Headless Chromium, renders JavaScript
    Chrome,
    /// Plain HTTP GET
    Http,
}

#[derive(Parser)]
#[command(name = "creator-scout", about = "Find content creators that fit a partnership requirement")]
struct Cli {
    /// What kind of creator you are looking for
    requirement: String,

    /// Search query to run (repeatable). When omitted, queries are generated.
    #[arg(long = "query", short = 'q')]
    queries: Vec<String>,

    /// Number of queries to generate when no --query is given
    #[arg(long, default_value_t = 3)]
    auto: usize,

    #[arg(long, value_enum, default_value_t = Preset::Batch)]
    preset: Preset,

    /// Minimum score (1-10) for a candidate to be kept
    #[arg(long)]
    threshold: Option<u8>,

    /// Max fetch-and-score units in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Max hits taken from each query
    #[arg(long)]
    hits_per_query: Option<usize>,

    /// Overall run deadline in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = FetcherKind::Http)]
    fetcher: FetcherKind,

    /// Evaluate titles and snippets without fetching pages
    #[arg(long)]
    snippet_only: bool,

    /// Write the run result as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = match self.preset {
            Preset::Interactive => PipelineConfig::interactive(),
            Preset::Batch => PipelineConfig::batch(),
        };
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency_limit = concurrency;
        }
        if let Some(cap) = self.hits_per_query {
            config.per_query_hit_cap = cap;
        }
        if let Some(secs) = self.timeout_secs {
            config.run_timeout = Some(Duration::from_secs(secs));
        }
        if self.snippet_only {
            config.mode = EvaluationMode::Snippet;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("creator_scout=info,creator_scout_common=info"));
    if cli.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!("Creator Scout starting...");

    let config = AppConfig::from_env();
    config.require_providers()?;
    let pipeline_config = cli.pipeline_config();
    pipeline_config.validate()?;

    let llm: Arc<dyn TextCompletion> = match (&config.gemini_api_key, &config.anthropic_api_key) {
        (Some(key), _) => Arc::new(Gemini::new(key.as_str(), GEMINI_MODEL)),
        (None, Some(key)) => Arc::new(Claude::new(key.as_str(), CLAUDE_MODEL)),
        (None, None) => return Err(ScoutError::config("no evaluator configured").into()),
    };

    let searcher: Arc<dyn WebSearcher> = match (config.google_search(), &config.serper_api_key) {
        (Some((key, cx)), _) => Arc::new(GoogleSearcher::new(key, cx)?),
        (None, Some(key)) => Arc::new(SerperSearcher::new(key)?),
        (None, None) => return Err(ScoutError::config("no search provider configured").into()),
    };

    let fetcher: Arc<dyn ContentFetcher> = match cli.fetcher {
        FetcherKind::Chrome => Arc::new(ChromeFetcher::new(
            config.chrome_bin.clone(),
            pipeline_config.content_char_cap,
            pipeline_config.fetch_timeout,
        )),
        FetcherKind::Http => Arc::new(HttpFetcher::new(
            pipeline_config.fetch_timeout,
            pipeline_config.content_char_cap,
        )?),
    };

    info!(
        model = llm.model(),
        searcher = searcher.name(),
        fetcher = fetcher.name(),
        "Providers selected"
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight work");
            on_ctrl_c.cancel();
        }
    });

    let queries = if cli.queries.is_empty() {
        let planner = LlmQueryPlanner::new(llm.clone());
        plan_queries(&planner, &cli.requirement, cli.auto.max(1), &cancel).await?
    } else {
        cli.queries.clone()
    };

    let driver = PipelineDriver::new(
        searcher,
        fetcher,
        Arc::new(LlmEvaluator::new(llm)),
        pipeline_config,
    )
    .with_cancellation(cancel);

    let (result, log) = driver.run(&cli.requirement, &queries).await?;

    print_result(&result);

    if let Err(e) = log.save(&config.data_dir, &result) {
        warn!(error = %e, "Failed to save run log");
    }

    if let Some(path) = &cli.output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "Run result written");
    }

    Ok(())
}

/// Generate queries, falling back to the requirement itself when the planner fails.
async fn plan_queries(
    planner: &dyn QueryPlanner,
    requirement: &str,
    count: usize,
    cancel: &CancellationToken,
) -> Result<Vec<String>, ScoutError> {
    let planned = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ScoutError::Cancelled),
        planned = planner.plan(requirement, count) => planned,
    };
    match planned {
        Ok(queries) => Ok(queries),
        Err(e) => {
            warn!(error = %e, "Query planning failed, searching for the requirement directly");
            Ok(vec![requirement.to_string()])
        }
    }
}

fn print_result(result: &RunResult) {
    if result.cancelled {
        println!("Run stopped early; showing partial results.");
    }
    if result.candidates.is_empty() {
        println!("No candidates met the threshold.");
    }
    for (rank, candidate) in result.candidates.iter().enumerate() {
        println!("{}. {} ({}/10)", rank + 1, candidate.name, candidate.score);
        println!("   {}", candidate.url);
        println!("   {}", candidate.reason);
        if let Some(contact) = &candidate.contact {
            println!("   Contact: {contact}");
        }
        if !candidate.tags.is_empty() {
            println!("   Tags: {}", candidate.tags.join(", "));
        }
        if let Some(draft) = &candidate.outreach_draft {
            println!("   Draft: {draft}");
        }
    }
    println!("{}", result.stats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use creator_scout::testing::MockPlanner;

    #[test]
    fn preset_overrides_apply() {
        let cli = Cli::parse_from([
            "creator-scout",
            "pet urns",
            "--preset",
            "interactive",
            "--threshold",
            "5",
            "--timeout-secs",
            "30",
        ]);
        let config = cli.pipeline_config();
        assert_eq!(config.threshold, 5);
        assert_eq!(config.mode, EvaluationMode::Snippet);
        assert_eq!(config.run_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn snippet_only_switches_batch_mode() {
        let cli = Cli::parse_from(["creator-scout", "keyboards", "--snippet-only", "-q", "a", "-q", "b"]);
        assert_eq!(cli.pipeline_config().mode, EvaluationMode::Snippet);
        assert_eq!(cli.queries, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn planner_failure_falls_back_to_requirement() {
        let planner = MockPlanner::new(&[]);
        let queries = plan_queries(&planner, "pet urns", 3, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(queries, vec!["pet urns"]);
    }

    #[tokio::test]
    async fn cancelled_planning_is_reported() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let planner = MockPlanner::new(&["a"]);
        let err = plan_queries(&planner, "pet urns", 3, &cancel).await.unwrap_err();
        assert!(matches!(err, ScoutError::Cancelled));
    }
}
