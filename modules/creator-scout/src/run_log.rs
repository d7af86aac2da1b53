//! Discovery run log: an ordered JSON timeline of what a run did.
//!
//! Each run can be saved to `{data_dir}/scout-runs/{run_id}.json`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use creator_scout_common::{RunResult, RunStats, SkipReason};

// ---------------------------------------------------------------------------
// RunLog
// ---------------------------------------------------------------------------

pub struct RunLog {
    pub run_id: Uuid,
    pub requirement: String,
    pub started_at: DateTime<Utc>,
    events: Vec<RunEvent>,
    seq: u32,
}

#[derive(Debug, Serialize)]
pub struct RunEvent {
    pub seq: u32,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SearchQuery {
        query: String,
        result_count: u32,
        error: Option<String>,
    },
    DuplicateHit {
        query: String,
        url: String,
    },
    UrlDispatched {
        url: String,
    },
    CandidateAccepted {
        url: String,
        name: String,
        score: u8,
    },
    UrlSkipped {
        url: String,
        skip: SkipReason,
    },
    DispatchStopped {
        pending_queries: u32,
    },
}

impl RunLog {
    pub fn new(run_id: Uuid, requirement: impl Into<String>) -> Self {
        Self {
            run_id,
            requirement: requirement.into(),
            started_at: Utc::now(),
            events: Vec::new(),
            seq: 0,
        }
    }

    pub fn log(&mut self, kind: EventKind) {
        self.events.push(RunEvent {
            seq: self.seq,
            ts: Utc::now(),
            kind,
        });
        self.seq += 1;
    }

    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    /// Kinds only, in order. Handy for assertions.
    pub fn kinds(&self) -> Vec<&EventKind> {
        self.events.iter().map(|e| &e.kind).collect()
    }

    /// Serialize the log alongside the run's result and write it to disk.
    /// Returns the file path on success.
    pub fn save(&self, data_dir: &Path, result: &RunResult) -> Result<PathBuf> {
        let dir = data_dir.join("scout-runs");
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.json", self.run_id));

        let output = SerializedRunLog {
            run_id: self.run_id,
            requirement: &self.requirement,
            started_at: self.started_at,
            finished_at: result.finished_at,
            cancelled: result.cancelled,
            stats: &result.stats,
            events: &self.events,
        };

        std::fs::write(&path, serde_json::to_string_pretty(&output)?)?;
        info!(path = %path.display(), events = self.events.len(), "Run log saved");

        Ok(path)
    }
}

#[derive(Serialize)]
struct SerializedRunLog<'a> {
    run_id: Uuid,
    requirement: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    cancelled: bool,
    stats: &'a RunStats,
    events: &'a [RunEvent],
}
