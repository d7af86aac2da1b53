use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use creator_scout_common::{Candidate, RunStats, SearchHit};

use crate::pipeline::dedup::DedupSet;
use crate::pipeline::worker::{CandidateWorker, WorkerReport};
use crate::run_log::{EventKind, RunLog};
use crate::traits::WebSearcher;

/// What the fan-out produced: accepted candidates in completion order, each
/// tagged with its dispatch sequence number, plus counters.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    pub candidates: Vec<(u32, Candidate)>,
    pub stats: RunStats,
    /// Dispatch stopped early because the run was cancelled.
    pub cancelled: bool,
}

/// Searches queries in order and feeds claimed URLs to a bounded worker pool.
///
/// Query N+1 is not searched until every hit of query N has been claimed or
/// dispatched, and a hit is only dispatched once a pool slot is free, so the
/// pool is the only buffer between search and evaluation.
pub struct FanOutScheduler<'a> {
    searcher: &'a dyn WebSearcher,
    worker: &'a CandidateWorker,
    concurrency_limit: usize,
}

impl<'a> FanOutScheduler<'a> {
    pub fn new(
        searcher: &'a dyn WebSearcher,
        worker: &'a CandidateWorker,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            searcher,
            worker,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    pub async fn run(
        &self,
        queries: &[String],
        requirement: &str,
        per_query_hit_cap: usize,
        cancel: &CancellationToken,
        log: &mut RunLog,
    ) -> ScheduleOutcome {
        let dedup = DedupSet::new();
        let mut outcome = ScheduleOutcome::default();
        let mut in_flight = FuturesUnordered::new();

        'queries: for (idx, query) in queries.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                log.log(EventKind::DispatchStopped {
                    pending_queries: (queries.len() - idx) as u32,
                });
                break;
            }

            // Keep in-flight units moving while the search call is pending.
            let search = self.searcher.search(query, per_query_hit_cap);
            tokio::pin!(search);
            let searched = loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        outcome.cancelled = true;
                        log.log(EventKind::DispatchStopped {
                            pending_queries: (queries.len() - idx) as u32,
                        });
                        break 'queries;
                    }
                    Some((seq, report)) = in_flight.next(), if !in_flight.is_empty() => {
                        record(seq, report, &mut outcome, log);
                    }
                    result = &mut search => break result,
                }
            };

            outcome.stats.queries_run += 1;
            let mut hits: Vec<SearchHit> = match searched {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = query.as_str(), searcher = self.searcher.name(), error = %e, "Search failed");
                    outcome.stats.search_failures += 1;
                    log.log(EventKind::SearchQuery {
                        query: query.clone(),
                        result_count: 0,
                        error: Some(format!("{e:#}")),
                    });
                    continue;
                }
            };
            hits.truncate(per_query_hit_cap);

            info!(query = query.as_str(), hits = hits.len(), "Search complete");
            outcome.stats.hits_seen += hits.len() as u32;
            log.log(EventKind::SearchQuery {
                query: query.clone(),
                result_count: hits.len() as u32,
                error: None,
            });

            for hit in hits {
                if !dedup.try_claim(&hit.url) {
                    outcome.stats.duplicate_hits += 1;
                    log.log(EventKind::DuplicateHit {
                        query: query.clone(),
                        url: hit.url,
                    });
                    continue;
                }

                while in_flight.len() >= self.concurrency_limit {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            outcome.cancelled = true;
                            log.log(EventKind::DispatchStopped {
                                pending_queries: (queries.len() - idx - 1) as u32,
                            });
                            break 'queries;
                        }
                        Some((seq, report)) = in_flight.next() => {
                            record(seq, report, &mut outcome, log);
                        }
                    }
                }
                if cancel.is_cancelled() {
                    outcome.cancelled = true;
                    log.log(EventKind::DispatchStopped {
                        pending_queries: (queries.len() - idx - 1) as u32,
                    });
                    break 'queries;
                }

                let seq = outcome.stats.urls_dispatched;
                outcome.stats.urls_dispatched += 1;
                log.log(EventKind::UrlDispatched {
                    url: hit.url.clone(),
                });
                let worker = self.worker;
                in_flight.push(async move { (seq, worker.evaluate(&hit, requirement).await) });
            }
        }

        // Dispatch is over; in-flight units finish under their own timeouts.
        while let Some((seq, report)) = in_flight.next().await {
            record(seq, report, &mut outcome, log);
        }

        info!(
            claimed = dedup.len(),
            accepted = outcome.candidates.len(),
            cancelled = outcome.cancelled,
            "Fan-out complete"
        );
        outcome
    }
}

fn record(seq: u32, report: WorkerReport, outcome: &mut ScheduleOutcome, log: &mut RunLog) {
    outcome.stats.record_outcome(&report.outcome, report.fetched);
    match report.outcome {
        Ok(candidate) => {
            log.log(EventKind::CandidateAccepted {
                url: candidate.url.clone(),
                name: candidate.name.clone(),
                score: candidate.score,
            });
            outcome.candidates.push((seq, candidate));
        }
        Err(skip) => {
            log.log(EventKind::UrlSkipped {
                url: skip.url,
                skip: skip.reason,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::testing::*;
    use creator_scout_common::PipelineConfig;

    fn queries(qs: &[&str]) -> Vec<String> {
        qs.iter().map(|q| q.to_string()).collect()
    }

    fn run_log() -> RunLog {
        RunLog::new(Uuid::new_v4(), "test requirement")
    }

    #[tokio::test]
    async fn overlapping_url_is_evaluated_once() {
        let shared = "https://x.com/p";
        let searcher = MockSearcher::new()
            .on_query("a", &[shared, "https://a.example"])
            .on_query("b", &["https://b.example", shared]);
        let fetcher = Arc::new(
            MockFetcher::new()
                .on_page(shared, "shared page")
                .on_page("https://a.example", "a page")
                .on_page("https://b.example", "b page"),
        );
        let evaluator = MockEvaluator::new().with_default(judgment_json("Any", 7));
        let worker = CandidateWorker::new(fetcher.clone(), Arc::new(evaluator), &test_config());

        let scheduler = FanOutScheduler::new(&searcher, &worker, 2);
        let mut log = run_log();
        let outcome = scheduler
            .run(&queries(&["a", "b"]), "req", 10, &CancellationToken::new(), &mut log)
            .await;

        assert_eq!(fetcher.fetches_of(shared), 1);
        assert_eq!(fetcher.fetch_count(), 3);
        assert_eq!(outcome.stats.hits_seen, 4);
        assert_eq!(outcome.stats.duplicate_hits, 1);
        assert_eq!(outcome.stats.urls_dispatched, 3);
        assert_eq!(outcome.candidates.len(), 3);
        assert!(log.kinds().contains(&&EventKind::DuplicateHit {
            query: "b".into(),
            url: shared.into(),
        }));
    }

    #[tokio::test]
    async fn queries_are_searched_in_order() {
        let searcher = MockSearcher::new()
            .on_query("first", &[])
            .on_query("second", &[])
            .on_query("third", &[]);
        let worker = CandidateWorker::new(
            Arc::new(MockFetcher::new()),
            Arc::new(MockEvaluator::new()),
            &test_config(),
        );

        FanOutScheduler::new(&searcher, &worker, 4)
            .run(
                &queries(&["first", "second", "third"]),
                "req",
                10,
                &CancellationToken::new(),
                &mut run_log(),
            )
            .await;

        assert_eq!(searcher.calls(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn failed_search_does_not_stop_later_queries() {
        let searcher = MockSearcher::new()
            .failing("broken")
            .on_query("works", &["https://ok.example"]);
        let worker = CandidateWorker::new(
            Arc::new(MockFetcher::new().on_page("https://ok.example", "ok page")),
            Arc::new(MockEvaluator::new().with_default(judgment_json("Ok", 8))),
            &test_config(),
        );

        let outcome = FanOutScheduler::new(&searcher, &worker, 4)
            .run(
                &queries(&["broken", "works"]),
                "req",
                10,
                &CancellationToken::new(),
                &mut run_log(),
            )
            .await;

        assert_eq!(outcome.stats.queries_run, 2);
        assert_eq!(outcome.stats.search_failures, 1);
        assert_eq!(outcome.candidates.len(), 1);
    }

    #[tokio::test]
    async fn hits_beyond_cap_are_ignored() {
        let searcher = MockSearcher::new().on_query_hits(
            "q",
            (0..8).map(|i| hit(&format!("https://{i}.example"))).collect(),
        );
        let fetcher = Arc::new(MockFetcher::new());
        let worker = CandidateWorker::new(
            fetcher.clone(),
            Arc::new(MockEvaluator::new()),
            &test_config(),
        );

        let outcome = FanOutScheduler::new(&searcher, &worker, 4)
            .run(&queries(&["q"]), "req", 3, &CancellationToken::new(), &mut run_log())
            .await;

        assert_eq!(outcome.stats.hits_seen, 3);
        assert_eq!(fetcher.fetch_count(), 3);
        assert_eq!(outcome.stats.urls_failed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_units_never_exceed_limit() {
        let urls: Vec<String> = (0..12).map(|i| format!("https://{i}.example")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let searcher = MockSearcher::new()
            .on_query("a", &url_refs[..6])
            .on_query("b", &url_refs[6..]);
        let mut fetcher = MockFetcher::new().with_delay(Duration::from_millis(200));
        for url in &urls {
            fetcher = fetcher.on_page(url, url);
        }
        let fetcher = Arc::new(fetcher);
        let worker = CandidateWorker::new(
            fetcher.clone(),
            Arc::new(MockEvaluator::new().with_default(judgment_json("Any", 9))),
            &test_config(),
        );

        let outcome = FanOutScheduler::new(&searcher, &worker, 3)
            .run(&queries(&["a", "b"]), "req", 10, &CancellationToken::new(), &mut run_log())
            .await;

        assert_eq!(outcome.candidates.len(), 12);
        assert!(fetcher.peak_in_flight() <= 3, "peak {}", fetcher.peak_in_flight());
        assert_eq!(fetcher.peak_in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn candidates_carry_dispatch_sequence() {
        let searcher = MockSearcher::new().on_query("q", &["https://slow.example", "https://fast.example"]);
        let fetcher = MockFetcher::new()
            .on_page("https://slow.example", "slow page")
            .on_page("https://fast.example", "fast page")
            .with_page_delay("https://slow.example", Duration::from_millis(300));
        let worker = CandidateWorker::new(
            Arc::new(fetcher),
            Arc::new(MockEvaluator::new().with_default(judgment_json("Any", 8))),
            &test_config(),
        );

        let outcome = FanOutScheduler::new(&searcher, &worker, 2)
            .run(&queries(&["q"]), "req", 10, &CancellationToken::new(), &mut run_log())
            .await;

        let tagged: Vec<(u32, &str)> = outcome
            .candidates
            .iter()
            .map(|(seq, c)| (*seq, c.url.as_str()))
            .collect();
        assert_eq!(
            tagged,
            vec![(1, "https://fast.example"), (0, "https://slow.example")]
        );
    }

    #[tokio::test]
    async fn cancelled_before_start_dispatches_nothing() {
        let searcher = MockSearcher::new().on_query("a", &["https://a.example"]);
        let fetcher = Arc::new(MockFetcher::new());
        let worker = CandidateWorker::new(
            fetcher.clone(),
            Arc::new(MockEvaluator::new()),
            &PipelineConfig::batch(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut log = run_log();
        let outcome = FanOutScheduler::new(&searcher, &worker, 2)
            .run(&queries(&["a"]), "req", 10, &cancel, &mut log)
            .await;

        assert!(outcome.cancelled);
        assert!(searcher.calls().is_empty());
        assert_eq!(fetcher.fetch_count(), 0);
        assert_eq!(
            log.kinds(),
            vec![&EventKind::DispatchStopped { pending_queries: 1 }]
        );
    }
}
