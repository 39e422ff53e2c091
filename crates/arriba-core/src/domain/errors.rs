//! Errors - エラー型と分類
//!
//! # 分類
//! - run を失敗させる: `PageError`, `StorageError`（+ キャンセル）
//! - レコード単位で記録して続行: `ExtractionError`, `NotifyError`

use thiserror::Error;

use super::TaskNumber;
use super::category::UnknownCategory;

/// ErrorKind は運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Affects one record; the run continues.
    Record,
    /// Aborts the run; re-triggering may succeed.
    Run,
}

/// Why the page never reached the ready state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotReadyReason {
    #[error("readiness marker not seen before timeout (last title {last_title:?})")]
    TimedOut { last_title: Option<String> },

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("cancelled while waiting for the page")]
    Cancelled,

    #[error("browser error: {0}")]
    Browser(String),
}

/// Page Reader failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("page {url} not ready: {reason}")]
    NotReady { url: String, reason: NotReadyReason },

    #[error("invalid page url: {0}")]
    InvalidUrl(String),

    #[error("invalid row selector {0:?}")]
    InvalidSelector(String),
}

impl PageError {
    pub fn not_ready(url: impl Into<String>, reason: NotReadyReason) -> Self {
        PageError::NotReady {
            url: url.into(),
            reason,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            PageError::NotReady {
                reason: NotReadyReason::Cancelled,
                ..
            }
        )
    }
}

/// Browser port failure (navigation, reading the document, closing).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowserError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("no page loaded")]
    NotNavigated,

    #[error("{0}")]
    Other(String),
}

/// A row that cannot become a [`Task`](super::Task).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("row has no task number")]
    MissingNumber,

    #[error("task number {0:?} is not a natural number")]
    InvalidNumber(String),

    #[error("row has no category")]
    MissingCategory,

    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),
}

/// Durable store failure. Never read as "task is new".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),

    #[error("task {0} is not stored")]
    NotFound(TaskNumber),
}

/// Notification delivery failure for one task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("no destination configured")]
    NoDestination,

    #[error("channel rejected message: {0}")]
    Rejected(String),

    #[error("channel transport failed: {0}")]
    Transport(String),

    #[error("sent, but recording the notification failed: {0}")]
    Bookkeeping(#[from] StorageError),
}

/// Run-level failure. Distinct from a finished run that found nothing new.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("run cancelled")]
    Cancelled,

    #[error("run task aborted: {0}")]
    Aborted(String),
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Record
    }
}

impl NotifyError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Record
    }
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Run
    }
}
