//! Task records: the raw row read from the page, the typed task, and the
//! stored form with its notification bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use super::Category;

/// Natural key assigned by the source page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskNumber(u32);

impl TaskNumber {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaskNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskNumber {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// One table row as read from the page. Every cell is optional: a missing
/// cell yields `None` for that field only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTaskRow {
    pub number: Option<String>,
    pub name: Option<String>,
    pub pdf_path: Option<String>,
    pub category: Option<String>,
    pub published_at: Option<String>,
}

/// A typed task extracted from a [`RawTaskRow`]. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub number: TaskNumber,
    pub name: Option<String>,
    pub pdf_path: Option<String>,
    pub category: Category,
    pub published_at: Option<String>,
}

impl Task {
    pub fn new(number: u32, name: impl Into<String>, category: Category) -> Self {
        Self {
            number: TaskNumber::new(number),
            name: Some(name.into()),
            pdf_path: None,
            category,
            published_at: None,
        }
    }

    pub fn with_pdf_path(mut self, pdf_path: impl Into<String>) -> Self {
        self.pdf_path = Some(pdf_path.into());
        self
    }

    pub fn with_published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = Some(published_at.into());
        self
    }
}

/// A persisted task.
///
/// `notified_at == None` は「保存済み・未通知」。通知失敗やキャンセルで
/// 残りうる状態で、`TaskStore::list_unnotified` で確認できます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTask {
    #[serde(flatten)]
    pub task: Task,
    pub inserted_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
}

impl StoredTask {
    pub fn new(task: Task, inserted_at: DateTime<Utc>) -> Self {
        Self {
            task,
            inserted_at,
            notified_at: None,
        }
    }

    pub fn number(&self) -> TaskNumber {
        self.task.number
    }

    pub fn is_notified(&self) -> bool {
        self.notified_at.is_some()
    }
}
