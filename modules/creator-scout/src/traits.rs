// Trait seams for the discovery pipeline's external collaborators.
//
// Every network dependency sits behind one of these so the pipeline can be
// driven by the mocks in `testing` with no network at all.

use anyhow::Result;
use async_trait::async_trait;

use creator_scout_common::{PageContent, SearchHit};

// ---------------------------------------------------------------------------
// WebSearcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Run one search query, returning at most `max_results` hits in rank order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// ContentFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch a page and return its extracted, length-capped visible text.
    async fn fetch(&self, url: &str) -> Result<PageContent>;

    fn name(&self) -> &str;

    /// True when `fetch` enforces its own deadlines (per attempt, after any
    /// internal queueing). The worker then does not wrap it in `fetch_timeout`.
    fn bounds_own_duration(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// CandidateEvaluator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CandidateEvaluator: Send + Sync {
    /// Judge `content` against `requirement`. The returned text is untrusted
    /// free text and must go through the parser.
    async fn evaluate(&self, requirement: &str, content: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// QueryPlanner
// ---------------------------------------------------------------------------

#[async_trait]
pub trait QueryPlanner: Send + Sync {
    /// Turn a free-text requirement into up to `count` distinct search queries.
    async fn plan(&self, requirement: &str, count: usize) -> Result<Vec<String>>;
}
