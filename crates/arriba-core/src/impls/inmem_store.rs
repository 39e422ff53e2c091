//! InMemoryTaskStore - 開発用・テスト用の正本
//!
//! # 実装詳細
//! - DashMap<TaskNumber, StoredTask>（シャード単位のロック、ストア全体のロックは無い）
//! - `insert_if_absent` は entry API で判定と挿入を 1 回のロック内で行う
//! - プロセスが終われば消える

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::domain::{InsertOutcome, StorageError, StoredTask, Task, TaskNumber};
use crate::ports::{Clock, SystemClock, TaskStore};

pub struct InMemoryTaskStore {
    tasks: DashMap<TaskNumber, StoredTask>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn sorted(&self, keep: impl Fn(&StoredTask) -> bool) -> Vec<StoredTask> {
        let mut tasks: Vec<StoredTask> = self
            .tasks
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(StoredTask::number);
        tasks
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn exists(&self, number: TaskNumber) -> Result<bool, StorageError> {
        Ok(self.tasks.contains_key(&number))
    }

    async fn insert_if_absent(&self, task: &Task) -> Result<InsertOutcome, StorageError> {
        match self.tasks.entry(task.number) {
            Entry::Occupied(_) => Ok(InsertOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(StoredTask::new(task.clone(), self.clock.now()));
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn mark_notified(&self, number: TaskNumber) -> Result<(), StorageError> {
        let mut stored = self
            .tasks
            .get_mut(&number)
            .ok_or(StorageError::NotFound(number))?;
        if stored.notified_at.is_none() {
            stored.notified_at = Some(self.clock.now());
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<StoredTask>, StorageError> {
        Ok(self.sorted(|_| true))
    }

    async fn list_unnotified(&self) -> Result<Vec<StoredTask>, StorageError> {
        Ok(self.sorted(|task| !task.is_notified()))
    }
}
