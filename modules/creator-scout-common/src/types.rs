use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseError;

/// Lowest score an evaluator may assign.
pub const MIN_SCORE: u8 = 1;
/// Highest score an evaluator may assign.
pub const MAX_SCORE: u8 = 10;

/// Default character cap applied to fetched page text.
pub const DEFAULT_CONTENT_CHAR_CAP: usize = 3000;

// --- Search ---

/// One raw search result entry, before fetching or scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

impl SearchHit {
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

// --- Page content ---

/// Extracted visible text for one URL, whitespace-collapsed and capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub url: String,
    pub text: String,
}

impl PageContent {
    /// Build from raw extracted text, normalizing it to at most `char_cap` characters.
    pub fn new(url: impl Into<String>, raw_text: &str, char_cap: usize) -> Self {
        Self {
            url: url.into(),
            text: normalize_page_text(raw_text, char_cap),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Collapse all whitespace runs to single spaces and keep the first `char_cap` chars.
pub fn normalize_page_text(raw: &str, char_cap: usize) -> String {
    let mut out = String::with_capacity(raw.len().min(char_cap * 4));
    let mut count = 0;
    for word in raw.split_whitespace() {
        if count >= char_cap {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
            count += 1;
            if count >= char_cap {
                out.pop();
                break;
            }
        }
        for ch in word.chars() {
            if count >= char_cap {
                break;
            }
            out.push(ch);
            count += 1;
        }
    }
    out
}

// --- Candidates ---

/// A parsed, validated judgment about one URL's fit against a brand requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub score: u8,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outreach_draft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub url: String,
}

/// Why a single candidate unit was dropped. Never fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    FetchFailed,
    EvaluatorUnavailable,
    ParseError { cause: ParseError },
    BelowThreshold { score: u8 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FetchFailed => write!(f, "fetch failed"),
            SkipReason::EvaluatorUnavailable => write!(f, "evaluator unavailable"),
            SkipReason::ParseError { cause } => write!(f, "parse error: {cause}"),
            SkipReason::BelowThreshold { score } => write!(f, "below threshold (score {score})"),
        }
    }
}

/// A skipped unit together with the URL it concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skip {
    pub url: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

impl Skip {
    pub fn new(url: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            url: url.into(),
            reason,
        }
    }
}

// --- Run result ---

/// Counters for one run. Lets callers tell "nothing met the bar" apart from
/// "most fetches failed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub queries_run: u32,
    pub search_failures: u32,
    pub hits_seen: u32,
    pub duplicate_hits: u32,
    pub urls_dispatched: u32,
    pub urls_fetched: u32,
    pub urls_failed: u32,
    pub evaluator_failures: u32,
    pub parse_failures: u32,
    pub candidates_accepted: u32,
    pub candidates_rejected_by_score: u32,
}

impl RunStats {
    /// Fold one worker outcome into the counters.
    pub fn record_outcome(&mut self, outcome: &Result<Candidate, Skip>, fetched: bool) {
        if fetched {
            self.urls_fetched += 1;
        }
        match outcome {
            Ok(_) => self.candidates_accepted += 1,
            Err(skip) => match skip.reason {
                SkipReason::FetchFailed => self.urls_failed += 1,
                SkipReason::EvaluatorUnavailable => self.evaluator_failures += 1,
                SkipReason::ParseError { .. } => self.parse_failures += 1,
                SkipReason::BelowThreshold { .. } => self.candidates_rejected_by_score += 1,
            },
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Discovery Run Complete ===")?;
        writeln!(f, "Queries run:        {}", self.queries_run)?;
        writeln!(f, "Search failures:    {}", self.search_failures)?;
        writeln!(f, "Hits seen:          {}", self.hits_seen)?;
        writeln!(f, "Duplicate hits:     {}", self.duplicate_hits)?;
        writeln!(f, "URLs dispatched:    {}", self.urls_dispatched)?;
        writeln!(f, "URLs fetched:       {}", self.urls_fetched)?;
        writeln!(f, "URLs failed:        {}", self.urls_failed)?;
        writeln!(f, "Evaluator failures: {}", self.evaluator_failures)?;
        writeln!(f, "Parse failures:     {}", self.parse_failures)?;
        writeln!(f, "Below threshold:    {}", self.candidates_rejected_by_score)?;
        write!(f, "Accepted:           {}", self.candidates_accepted)
    }
}

/// Final output of one discovery run. Built once, returned by value.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub requirement: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Rank-sorted: score descending, ties in first-seen order.
    pub candidates: Vec<Candidate>,
    pub stats: RunStats,
    /// True when the run was cut short by cancellation or the run timeout.
    pub cancelled: bool,
}
