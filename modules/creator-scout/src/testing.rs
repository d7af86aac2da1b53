// Test mocks for the discovery pipeline.
//
// One mock per trait seam:
// - MockSearcher (WebSearcher): query → hits, or a registered failure
// - MockFetcher (ContentFetcher): URL → page text, counts fetches and peak concurrency
// - MockEvaluator (CandidateEvaluator): content → raw evaluator text
// - MockPlanner (QueryPlanner): fixed query list
//
// Plus helpers for building hits, judgments and a fast PipelineConfig.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Semaphore;

use creator_scout_common::{PageContent, PipelineConfig, SearchHit, DEFAULT_CONTENT_CHAR_CAP};

use crate::traits::{CandidateEvaluator, ContentFetcher, QueryPlanner, WebSearcher};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A hit whose title and snippet are derived from the URL.
pub fn hit(url: &str) -> SearchHit {
    SearchHit::new(url, format!("Title of {url}"), format!("Snippet of {url}"))
}

/// Well-formed evaluator output wrapped in a little prose.
pub fn judgment_json(name: &str, score: u8) -> String {
    format!(
        "Here is my assessment:\n{}",
        serde_json::json!({
            "name": name,
            "score": score,
            "reason": format!("{name} fits the brief"),
            "tags": ["tech"],
        })
    )
}

/// Page-mode config with short timeouts, suitable for tests.
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        threshold: 6,
        concurrency_limit: 4,
        per_query_hit_cap: 10,
        fetch_timeout: Duration::from_secs(5),
        evaluate_timeout: Duration::from_secs(60),
        run_timeout: None,
        content_char_cap: DEFAULT_CONTENT_CHAR_CAP,
        mode: creator_scout_common::EvaluationMode::Page,
    }
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Returns `Err` for unregistered queries and for queries marked failing.
/// Records the order queries were searched in.
pub struct MockSearcher {
    results: HashMap<String, Vec<SearchHit>>,
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_query(mut self, query: &str, urls: &[&str]) -> Self {
        self.results
            .insert(query.to_string(), urls.iter().map(|u| hit(u)).collect());
        self
    }

    pub fn on_query_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.results.insert(query.to_string(), hits);
        self
    }

    pub fn failing(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.calls.lock().unwrap().push(query.to_string());
        if self.failing.iter().any(|q| q == query) {
            bail!("MockSearcher: quota exceeded for {query}");
        }
        match self.results.get(query) {
            Some(hits) => Ok(hits.iter().take(max_results).cloned().collect()),
            None => bail!("MockSearcher: no results registered for {query}"),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// URL → page text. Unregistered URLs fail. Tracks per-URL fetch counts and
/// the peak number of fetches in flight at once.
///
/// `with_slots` + `timing_itself` model `ChromeFetcher`: a small pool of
/// browser slots, and a fetch that bounds its own duration.
pub struct MockFetcher {
    pages: HashMap<String, String>,
    delay: Option<Duration>,
    page_delays: HashMap<String, Duration>,
    slots: Option<Semaphore>,
    timing_itself: bool,
    fetches: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            delay: None,
            page_delays: HashMap::new(),
            slots: None,
            timing_itself: false,
            fetches: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn on_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }

    /// Every fetch sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay for one URL only, overriding `with_delay`.
    pub fn with_page_delay(mut self, url: &str, delay: Duration) -> Self {
        self.page_delays.insert(url.to_string(), delay);
        self
    }

    /// At most `n` fetches run at once; the rest queue inside the fetcher.
    pub fn with_slots(mut self, n: usize) -> Self {
        self.slots = Some(Semaphore::new(n));
        self
    }

    pub fn timing_itself(mut self) -> Self {
        self.timing_itself = true;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }

    pub fn fetches_of(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<PageContent> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        let _slot = match &self.slots {
            Some(slots) => Some(slots.acquire().await?),
            None => None,
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.page_delays.get(url).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.pages.get(url) {
            Some(text) => Ok(PageContent::new(url, text, DEFAULT_CONTENT_CHAR_CAP)),
            None => bail!("MockFetcher: no page registered for {url}"),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn bounds_own_duration(&self) -> bool {
        self.timing_itself
    }
}

// ---------------------------------------------------------------------------
// MockEvaluator
// ---------------------------------------------------------------------------

/// Content → raw evaluator text. Unregistered content fails unless a default
/// response is set.
pub struct MockEvaluator {
    responses: HashMap<String, String>,
    default: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockEvaluator {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on_content(mut self, content: &str, raw: impl Into<String>) -> Self {
        self.responses.insert(content.to_string(), raw.into());
        self
    }

    pub fn with_default(mut self, raw: impl Into<String>) -> Self {
        self.default = Some(raw.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandidateEvaluator for MockEvaluator {
    async fn evaluate(&self, _requirement: &str, content: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.responses.get(content).or(self.default.as_ref()) {
            Some(raw) => Ok(raw.clone()),
            None => bail!("MockEvaluator: service unavailable for content {content:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// MockPlanner
// ---------------------------------------------------------------------------

pub struct MockPlanner {
    queries: Vec<String>,
}

impl MockPlanner {
    pub fn new(queries: &[&str]) -> Self {
        Self {
            queries: queries.iter().map(|q| q.to_string()).collect(),
        }
    }
}

#[async_trait]
impl QueryPlanner for MockPlanner {
    async fn plan(&self, _requirement: &str, count: usize) -> Result<Vec<String>> {
        if self.queries.is_empty() {
            bail!("MockPlanner: no queries");
        }
        Ok(self.queries.iter().take(count).cloned().collect())
    }
}
