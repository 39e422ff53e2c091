//! Outcome model: per-record results and the run report.
//!
//! Every record of a run ends in exactly one [`RecordOutcome`]. The report is
//! what the trigger side gets back from a finished run.

use serde::{Deserialize, Serialize};

use super::{RawTaskRow, RunId, TaskNumber};

/// Result of the atomic insert-if-absent decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Acknowledgement that the channel accepted a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sent;

/// Terminal outcome of one row within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Already stored; nothing written, nothing sent.
    Duplicate { number: TaskNumber },

    /// Inserted by this run and the message went out.
    InsertedAndNotified { number: TaskNumber },

    /// Inserted by this run; the message did not go out (stays unnotified).
    InsertedNotifyFailed { number: TaskNumber, error: String },

    /// The row could not be turned into a task.
    ExtractionError { row: RawTaskRow, error: String },
}

impl RecordOutcome {
    pub fn number(&self) -> Option<TaskNumber> {
        match self {
            RecordOutcome::Duplicate { number }
            | RecordOutcome::InsertedAndNotified { number }
            | RecordOutcome::InsertedNotifyFailed { number, .. } => Some(*number),
            RecordOutcome::ExtractionError { .. } => None,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(
            self,
            RecordOutcome::InsertedAndNotified { .. } | RecordOutcome::InsertedNotifyFailed { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub found: usize,
    pub duplicate: usize,
    pub inserted_and_notified: usize,
    pub inserted_notify_failed: usize,
    pub extraction_errors: usize,
}

impl RunCounts {
    pub fn from_outcomes(found: usize, outcomes: &[RecordOutcome]) -> Self {
        let mut counts = RunCounts {
            found,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                RecordOutcome::Duplicate { .. } => counts.duplicate += 1,
                RecordOutcome::InsertedAndNotified { .. } => counts.inserted_and_notified += 1,
                RecordOutcome::InsertedNotifyFailed { .. } => counts.inserted_notify_failed += 1,
                RecordOutcome::ExtractionError { .. } => counts.extraction_errors += 1,
            }
        }
        counts
    }

    pub fn inserted(&self) -> usize {
        self.inserted_and_notified + self.inserted_notify_failed
    }
}

/// Summary of a finished (`Done`) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub counts: RunCounts,
    pub outcomes: Vec<RecordOutcome>,
}

impl RunReport {
    pub fn new(run_id: RunId, found: usize, mut outcomes: Vec<RecordOutcome>) -> Self {
        // buffer_unordered で順序が崩れるので番号順に揃える（抽出エラーは末尾）
        outcomes.sort_by_key(|o| o.number().map_or(u64::MAX, |n| u64::from(n.get())));
        let counts = RunCounts::from_outcomes(found, &outcomes);
        Self {
            run_id,
            counts,
            outcomes,
        }
    }

    pub fn inserted_numbers(&self) -> Vec<TaskNumber> {
        self.outcomes
            .iter()
            .filter(|o| o.is_inserted())
            .filter_map(RecordOutcome::number)
            .collect()
    }

    pub fn duplicate_numbers(&self) -> Vec<TaskNumber> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RecordOutcome::Duplicate { number } => Some(*number),
                _ => None,
            })
            .collect()
    }
}
