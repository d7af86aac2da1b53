use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use creator_scout_common::{PipelineConfig, RunResult, ScoutError};

use crate::pipeline::ranker;
use crate::pipeline::scheduler::FanOutScheduler;
use crate::pipeline::worker::CandidateWorker;
use crate::run_log::RunLog;
use crate::traits::{CandidateEvaluator, ContentFetcher, WebSearcher};

/// Single entry point for a discovery run: fan-out, then ranking.
pub struct PipelineDriver {
    searcher: Arc<dyn WebSearcher>,
    fetcher: Arc<dyn ContentFetcher>,
    evaluator: Arc<dyn CandidateEvaluator>,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl PipelineDriver {
    pub fn new(
        searcher: Arc<dyn WebSearcher>,
        fetcher: Arc<dyn ContentFetcher>,
        evaluator: Arc<dyn CandidateEvaluator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            searcher,
            fetcher,
            evaluator,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling `token` stops dispatch; the run still returns what completed.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run with an explicit threshold and concurrency limit, other tuning from
    /// the driver's config.
    pub async fn execute(
        &self,
        requirement: &str,
        queries: &[String],
        threshold: u8,
        concurrency_limit: usize,
    ) -> Result<RunResult, ScoutError> {
        let config = PipelineConfig {
            threshold,
            concurrency_limit,
            ..self.config.clone()
        };
        let (result, _log) = self.execute_with(requirement, queries, &config).await?;
        Ok(result)
    }

    /// Run a single manually supplied query.
    pub async fn execute_single(
        &self,
        requirement: &str,
        query: &str,
    ) -> Result<RunResult, ScoutError> {
        let (result, _log) = self
            .execute_with(requirement, &[query.to_string()], &self.config)
            .await?;
        Ok(result)
    }

    /// Run with the driver's own config, returning the run log as well.
    pub async fn run(
        &self,
        requirement: &str,
        queries: &[String],
    ) -> Result<(RunResult, RunLog), ScoutError> {
        self.execute_with(requirement, queries, &self.config).await
    }

    async fn execute_with(
        &self,
        requirement: &str,
        queries: &[String],
        config: &PipelineConfig,
    ) -> Result<(RunResult, RunLog), ScoutError> {
        config.validate()?;
        let requirement = requirement.trim();
        if requirement.is_empty() {
            return Err(ScoutError::config("requirement must not be empty"));
        }
        let queries: Vec<String> = queries
            .iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if queries.is_empty() {
            return Err(ScoutError::config("at least one search query is required"));
        }

        let run_id = Uuid::new_v4();
        let mut log = RunLog::new(run_id, requirement);
        let started_at = log.started_at;
        info!(
            %run_id,
            queries = queries.len(),
            threshold = config.threshold,
            concurrency = config.concurrency_limit,
            mode = ?config.mode,
            "Discovery run starting"
        );

        let cancel = self.cancel.child_token();
        let deadline = config.run_timeout.map(|timeout| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(timeout_secs = timeout.as_secs(), "Run timeout reached, stopping dispatch");
                token.cancel();
            })
        });

        let worker = CandidateWorker::new(self.fetcher.clone(), self.evaluator.clone(), config);
        let scheduler =
            FanOutScheduler::new(self.searcher.as_ref(), &worker, config.concurrency_limit);
        let outcome = scheduler
            .run(&queries, requirement, config.per_query_hit_cap, &cancel, &mut log)
            .await;

        if let Some(handle) = deadline {
            handle.abort();
        }

        let candidates = ranker::aggregate(outcome.candidates);
        let result = RunResult {
            run_id,
            requirement: requirement.to_string(),
            started_at,
            finished_at: Utc::now(),
            candidates,
            stats: outcome.stats,
            cancelled: outcome.cancelled,
        };

        info!(
            %run_id,
            accepted = result.stats.candidates_accepted,
            failed = result.stats.urls_failed,
            cancelled = result.cancelled,
            "Discovery run finished"
        );
        Ok((result, log))
    }
}
