//! TaskStore port - 永続ストア（正本）
//!
//! # 設計原則
//! - 新規判定は `insert_if_absent` の 1 操作で行う（check-then-insert をしない）
//! - 衝突の直列化は `number` 単位。ストア全体のロックは持たない
//! - 保存済み・未通知の行は `list_unnotified` で見える
//!
//! # 実装
//! - **SqliteTaskStore**: UNIQUE 制約 + `ON CONFLICT DO NOTHING`
//! - **InMemoryTaskStore**: DashMap の entry API

use async_trait::async_trait;

use crate::domain::{InsertOutcome, StorageError, StoredTask, Task, TaskNumber};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Is a task with this number stored? Informational only; novelty is
    /// decided by [`TaskStore::insert_if_absent`].
    async fn exists(&self, number: TaskNumber) -> Result<bool, StorageError>;

    /// Atomically store `task` unless its number is already present.
    ///
    /// Two concurrent calls with the same number yield exactly one
    /// `Inserted`; the other sees `Duplicate`.
    async fn insert_if_absent(&self, task: &Task) -> Result<InsertOutcome, StorageError>;

    /// Record that the notification for `number` went out. Setting it twice
    /// keeps the first timestamp.
    async fn mark_notified(&self, number: TaskNumber) -> Result<(), StorageError>;

    /// All stored tasks ordered by number.
    async fn list_all(&self) -> Result<Vec<StoredTask>, StorageError>;

    /// Stored tasks whose notification never went out, ordered by number.
    async fn list_unnotified(&self) -> Result<Vec<StoredTask>, StorageError>;
}
