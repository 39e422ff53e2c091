//! Status - crawl run の状態照会
//!
//! 起動済みの run を RunId ごとに保持し、実行中は watch チャネルの最新値、
//! 終了後は結果の要約を返す。終了済みの古い run は `capacity` を超えた分から捨てる。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::domain::{RunCounts, RunError, RunId, RunReport, RunState};

pub const DEFAULT_RUN_HISTORY: usize = 64;

/// Snapshot of one run, as shown to the trigger side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub run_id: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counts: Option<RunCounts>,
    pub error: Option<String>,
}

struct RunEntry {
    started_at: DateTime<Utc>,
    state: watch::Receiver<RunState>,
    finished: Option<Finished>,
}

struct Finished {
    at: DateTime<Utc>,
    counts: Option<RunCounts>,
    error: Option<String>,
}

pub struct RunRegistry {
    runs: Mutex<BTreeMap<RunId, RunEntry>>,
    capacity: usize,
}

impl RunRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            runs: Mutex::new(BTreeMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn register(
        &self,
        run_id: RunId,
        started_at: DateTime<Utc>,
        state: watch::Receiver<RunState>,
    ) {
        let mut runs = self.runs.lock().await;
        runs.insert(
            run_id,
            RunEntry {
                started_at,
                state,
                finished: None,
            },
        );
        prune(&mut runs, self.capacity);
    }

    pub async fn finish(
        &self,
        run_id: RunId,
        at: DateTime<Utc>,
        result: &Result<RunReport, RunError>,
    ) {
        let mut runs = self.runs.lock().await;
        if let Some(entry) = runs.get_mut(&run_id) {
            entry.finished = Some(match result {
                Ok(report) => Finished {
                    at,
                    counts: Some(report.counts),
                    error: None,
                },
                Err(e) => Finished {
                    at,
                    counts: None,
                    error: Some(e.to_string()),
                },
            });
        }
    }

    pub async fn get(&self, run_id: RunId) -> Option<RunStatus> {
        let runs = self.runs.lock().await;
        runs.get(&run_id).map(|entry| snapshot(run_id, entry))
    }

    /// Every known run, newest first.
    pub async fn list(&self) -> Vec<RunStatus> {
        let runs = self.runs.lock().await;
        runs.iter()
            .rev()
            .map(|(run_id, entry)| snapshot(*run_id, entry))
            .collect()
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RUN_HISTORY)
    }
}

fn snapshot(run_id: RunId, entry: &RunEntry) -> RunStatus {
    let mut state = *entry.state.borrow();
    // 結果の記録はタスク終了時なので、watch が Done/Failed を出す前でも結果を優先する
    if let Some(finished) = &entry.finished
        && !state.is_terminal()
    {
        state = if finished.error.is_some() {
            RunState::Failed
        } else {
            RunState::Done
        };
    }
    RunStatus {
        run_id: run_id.to_string(),
        state,
        started_at: entry.started_at,
        finished_at: entry.finished.as_ref().map(|f| f.at),
        counts: entry.finished.as_ref().and_then(|f| f.counts),
        error: entry.finished.as_ref().and_then(|f| f.error.clone()),
    }
}

/// Drop the oldest finished runs until at most `capacity` remain.
/// Runs still in flight are never dropped.
fn prune(runs: &mut BTreeMap<RunId, RunEntry>, capacity: usize) {
    let excess = runs.len().saturating_sub(capacity);
    if excess == 0 {
        return;
    }
    let stale: Vec<RunId> = runs
        .iter()
        .filter(|(_, entry)| entry.finished.is_some())
        .map(|(run_id, _)| *run_id)
        .take(excess)
        .collect();
    for run_id in stale {
        runs.remove(&run_id);
    }
}
