use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use creator_scout_common::{
    normalize_page_text, Candidate, EvaluationMode, PipelineConfig, ScoutError, SearchHit, Skip,
    SkipReason,
};

use crate::pipeline::parser;
use crate::traits::{CandidateEvaluator, ContentFetcher};

/// What one fetch-and-score unit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub outcome: Result<Candidate, Skip>,
    /// Whether page content was actually fetched (always false in snippet mode).
    pub fetched: bool,
}

impl WorkerReport {
    fn skip(url: &str, reason: SkipReason, fetched: bool) -> Self {
        Self {
            outcome: Err(Skip::new(url, reason)),
            fetched,
        }
    }
}

/// Fetches, evaluates, parses and thresholds a single URL. Stateless, so one
/// instance serves every concurrent unit of a run.
pub struct CandidateWorker {
    fetcher: Arc<dyn ContentFetcher>,
    evaluator: Arc<dyn CandidateEvaluator>,
    threshold: u8,
    fetch_timeout: Duration,
    evaluate_timeout: Duration,
    content_char_cap: usize,
    mode: EvaluationMode,
}

impl CandidateWorker {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        evaluator: Arc<dyn CandidateEvaluator>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            fetcher,
            evaluator,
            threshold: config.threshold,
            fetch_timeout: config.fetch_timeout,
            evaluate_timeout: config.evaluate_timeout,
            content_char_cap: config.content_char_cap,
            mode: config.mode,
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Run one unit to completion. Every failure becomes a `Skip`; nothing
    /// here can abort the run.
    pub async fn evaluate(&self, hit: &SearchHit, requirement: &str) -> WorkerReport {
        let url = hit.url.as_str();

        let (content, fetched) = match self.mode {
            EvaluationMode::Page => match self.fetch_content(url).await {
                Ok(text) => (text, true),
                Err(e) => {
                    warn!(url, error = %e, "Fetch failed");
                    return WorkerReport::skip(url, SkipReason::FetchFailed, false);
                }
            },
            EvaluationMode::Snippet => {
                let text = normalize_page_text(
                    &format!("Title: {}\nSnippet: {}", hit.title, hit.snippet),
                    self.content_char_cap,
                );
                if hit.title.trim().is_empty() && hit.snippet.trim().is_empty() {
                    return WorkerReport::skip(url, SkipReason::FetchFailed, false);
                }
                (text, false)
            }
        };

        let raw = match self.evaluate_content(url, requirement, &content).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(url, error = %e, "Evaluator unavailable");
                return WorkerReport::skip(url, SkipReason::EvaluatorUnavailable, fetched);
            }
        };

        let judgment = match parser::parse(&raw) {
            Ok(j) => j,
            Err(cause) => {
                warn!(url, error = %cause, "Evaluator output rejected");
                debug!(url, raw = raw.as_str(), "Unparseable evaluator output");
                return WorkerReport::skip(url, SkipReason::ParseError { cause }, fetched);
            }
        };

        if judgment.score < self.threshold {
            info!(
                url,
                name = judgment.name.as_str(),
                score = judgment.score,
                threshold = self.threshold,
                "Below threshold"
            );
            return WorkerReport::skip(
                url,
                SkipReason::BelowThreshold {
                    score: judgment.score,
                },
                fetched,
            );
        }

        info!(
            url,
            name = judgment.name.as_str(),
            score = judgment.score,
            "Candidate accepted"
        );
        WorkerReport {
            outcome: Ok(judgment.into_candidate(url)),
            fetched,
        }
    }

    async fn fetch_content(&self, url: &str) -> Result<String, ScoutError> {
        let fetched = if self.fetcher.bounds_own_duration() {
            self.fetcher.fetch(url).await
        } else {
            tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url))
                .await
                .map_err(|_| {
                    ScoutError::TransientExternal(format!(
                        "fetch timed out after {}s",
                        self.fetch_timeout.as_secs()
                    ))
                })?
        };
        let page = fetched.map_err(|e| ScoutError::TransientExternal(format!("{e:#}")))?;

        if page.is_empty() {
            return Err(ScoutError::TransientExternal("empty page content".to_string()));
        }
        // Fetchers are external; enforce the cap here too.
        Ok(normalize_page_text(&page.text, self.content_char_cap))
    }

    async fn evaluate_content(
        &self,
        url: &str,
        requirement: &str,
        content: &str,
    ) -> Result<String, ScoutError> {
        debug!(url, chars = content.chars().count(), "Evaluating content");
        tokio::time::timeout(
            self.evaluate_timeout,
            self.evaluator.evaluate(requirement, content),
        )
        .await
        .map_err(|_| {
            ScoutError::TransientExternal(format!(
                "evaluator timed out after {}s",
                self.evaluate_timeout.as_secs()
            ))
        })?
        .map_err(|e| ScoutError::TransientExternal(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn worker(fetcher: MockFetcher, evaluator: MockEvaluator, threshold: u8) -> CandidateWorker {
        let config = PipelineConfig {
            threshold,
            ..test_config()
        };
        CandidateWorker::new(Arc::new(fetcher), Arc::new(evaluator), &config)
    }

    #[tokio::test]
    async fn accepted_candidate_carries_source_url() {
        let url = "https://youtube.com/@quietkeys";
        let w = worker(
            MockFetcher::new().on_page(url, "Quiet keyboard reviews"),
            MockEvaluator::new().on_content("Quiet keyboard reviews", judgment_json("Quiet Keys", 8)),
            6,
        );

        let report = w.evaluate(&hit(url), "ergonomic keyboards").await;
        let candidate = report.outcome.unwrap();
        assert_eq!(candidate.url, url);
        assert_eq!(candidate.name, "Quiet Keys");
        assert!(report.fetched);
    }

    #[tokio::test]
    async fn score_one_below_threshold_is_skipped() {
        let url = "https://blog.example/keys";
        let w = worker(
            MockFetcher::new().on_page(url, "page"),
            MockEvaluator::new().on_content("page", judgment_json("Blog", 5)),
            6,
        );

        let report = w.evaluate(&hit(url), "req").await;
        assert_eq!(
            report.outcome.unwrap_err().reason,
            SkipReason::BelowThreshold { score: 5 }
        );
    }

    #[tokio::test]
    async fn score_equal_to_threshold_is_accepted() {
        let url = "https://blog.example/keys";
        let w = worker(
            MockFetcher::new().on_page(url, "page"),
            MockEvaluator::new().on_content("page", judgment_json("Blog", 6)),
            6,
        );
        assert!(w.evaluate(&hit(url), "req").await.outcome.is_ok());
    }

    #[tokio::test]
    async fn fetch_failure_is_skip_not_error() {
        let w = worker(MockFetcher::new(), MockEvaluator::new(), 6);
        let report = w.evaluate(&hit("https://gone.example"), "req").await;
        assert_eq!(report.outcome.unwrap_err().reason, SkipReason::FetchFailed);
        assert!(!report.fetched);
    }

    #[tokio::test]
    async fn blank_page_counts_as_fetch_failure() {
        let url = "https://blank.example";
        let w = worker(MockFetcher::new().on_page(url, "   "), MockEvaluator::new(), 6);
        let report = w.evaluate(&hit(url), "req").await;
        assert_eq!(report.outcome.unwrap_err().reason, SkipReason::FetchFailed);
    }

    #[tokio::test]
    async fn evaluator_error_is_evaluator_unavailable() {
        let url = "https://a.example";
        let w = worker(MockFetcher::new().on_page(url, "page"), MockEvaluator::new(), 6);
        let report = w.evaluate(&hit(url), "req").await;
        assert_eq!(
            report.outcome.unwrap_err().reason,
            SkipReason::EvaluatorUnavailable
        );
        assert!(report.fetched);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_evaluator_times_out() {
        let url = "https://slow.example";
        let w = worker(
            MockFetcher::new().on_page(url, "page"),
            MockEvaluator::new()
                .on_content("page", judgment_json("Slow", 9))
                .with_delay(Duration::from_secs(600)),
            6,
        );
        let report = w.evaluate(&hit(url), "req").await;
        assert_eq!(
            report.outcome.unwrap_err().reason,
            SkipReason::EvaluatorUnavailable
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out_as_fetch_failure() {
        let url = "https://slow.example";
        let w = worker(
            MockFetcher::new()
                .on_page(url, "page")
                .with_delay(Duration::from_secs(60)),
            MockEvaluator::new().with_default(judgment_json("Slow", 9)),
            6,
        );
        let report = w.evaluate(&hit(url), "req").await;
        assert_eq!(report.outcome.unwrap_err().reason, SkipReason::FetchFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn self_timed_fetcher_is_not_cut_off_by_fetch_timeout() {
        let url = "https://queued.example";
        let w = worker(
            MockFetcher::new()
                .on_page(url, "page")
                .with_delay(Duration::from_secs(60))
                .timing_itself(),
            MockEvaluator::new().with_default(judgment_json("Queued", 9)),
            6,
        );
        let report = w.evaluate(&hit(url), "req").await;
        assert_eq!(report.outcome.unwrap().name, "Queued");
        assert!(report.fetched);
    }

    #[tokio::test]
    async fn malformed_output_is_parse_skip() {
        let url = "https://a.example";
        let w = worker(
            MockFetcher::new().on_page(url, "page"),
            MockEvaluator::new().on_content("page", "No creator here, sorry."),
            6,
        );
        let report = w.evaluate(&hit(url), "req").await;
        assert_eq!(
            report.outcome.unwrap_err().reason,
            SkipReason::ParseError {
                cause: creator_scout_common::ParseError::NoStructureFound
            }
        );
    }

    #[tokio::test]
    async fn snippet_mode_evaluates_without_fetching() {
        let config = PipelineConfig {
            mode: EvaluationMode::Snippet,
            threshold: 3,
            ..test_config()
        };
        let evaluator = MockEvaluator::new().with_default(judgment_json("Vet Vlog", 4));
        let fetcher = Arc::new(MockFetcher::new());
        let w = CandidateWorker::new(fetcher.clone(), Arc::new(evaluator), &config);

        let hit = SearchHit::new("https://youtube.com/@vet", "Vet Vlog", "Senior dog care tips");
        let report = w.evaluate(&hit, "pet urns").await;

        assert_eq!(report.outcome.unwrap().name, "Vet Vlog");
        assert!(!report.fetched);
        assert_eq!(fetcher.fetch_count(), 0);
    }
}
