//! DedupIngestor - 新規判定と保存
//!
//! 判定は `TaskStore::insert_if_absent` の 1 回だけで行う。
//! exists → insert の 2 段階にすると、同じ number を並行に処理する 2 つの run が
//! 両方とも「新規」と判断してしまう。

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{InsertOutcome, StorageError, Task};
use crate::ports::TaskStore;

pub struct DedupIngestor {
    store: Arc<dyn TaskStore>,
}

impl DedupIngestor {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Store `task` if its number is new. A storage failure is returned as
    /// is and never treated as novelty.
    pub async fn ingest(&self, task: &Task) -> Result<InsertOutcome, StorageError> {
        let outcome = self.store.insert_if_absent(task).await?;
        match outcome {
            InsertOutcome::Inserted => info!(number = %task.number, "new task"),
            InsertOutcome::Duplicate => debug!(number = %task.number, "task already exists"),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;
    use crate::impls::InMemoryTaskStore;
    use crate::testing::UnavailableStore;

    #[tokio::test]
    async fn second_ingest_is_duplicate() {
        let store = Arc::new(InMemoryTaskStore::new());
        let ingestor = DedupIngestor::new(store.clone());
        let task = Task::new(101, "Find a rock", Category::Diversas);

        assert_eq!(ingestor.ingest(&task).await, Ok(InsertOutcome::Inserted));
        assert_eq!(ingestor.ingest(&task).await, Ok(InsertOutcome::Duplicate));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_is_not_novelty() {
        let ingestor = DedupIngestor::new(Arc::new(UnavailableStore));
        let task = Task::new(101, "Find a rock", Category::Diversas);

        assert!(matches!(
            ingestor.ingest(&task).await,
            Err(StorageError::Unavailable(_))
        ));
    }
}
