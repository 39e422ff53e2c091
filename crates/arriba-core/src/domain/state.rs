//! State - crawl run の状態
//!
//! # 状態遷移
//! - Started → PageLoaded → Extracted → Ingesting → Done
//! - どの段階からでも → Failed（page / storage の障害、キャンセル）
//!
//! レコード単位の失敗では Failed にならない。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Resources for the page reader are being acquired.
    Started,

    /// The page reported ready and raw rows are available.
    PageLoaded,

    /// Typed tasks are available; bad rows were set aside.
    Extracted,

    /// Tasks are going through ingest → notify.
    Ingesting,

    /// Every record reached a terminal outcome.
    Done,

    /// Page, storage or cancellation aborted the run.
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Is `next` a legal successor of `self`?
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Started, PageLoaded)
            | (PageLoaded, Extracted)
            | (Extracted, Ingesting)
            | (Ingesting, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}
