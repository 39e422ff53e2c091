//! SqliteTaskStore - sqlx + SQLite の正本
//!
//! # 新規判定
//! `number` を PRIMARY KEY にして `INSERT … ON CONFLICT(number) DO NOTHING`。
//! rows_affected が 1 なら Inserted、0 なら Duplicate。衝突は DB が
//! 行単位で直列化するので、アプリ側のロックは持たない。

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::domain::{Category, InsertOutcome, StorageError, StoredTask, Task, TaskNumber};
use crate::ports::{Clock, SystemClock, TaskStore};

const SELECT_TASKS: &str = "SELECT number, name, pdf_path, category, published_at, inserted_at, notified_at FROM tasks";

pub struct SqliteTaskStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteTaskStore {
    /// Open (creating if missing) the database at `database_url` and make
    /// sure the schema exists.
    ///
    /// # Example URLs
    /// - `sqlite://arriba.db?mode=rwc`
    /// - `sqlite::memory:` (prefer [`SqliteTaskStore::in_memory`])
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(storage_error)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(storage_error)?;
        Self::from_pool(pool).await
    }

    /// Ephemeral store for tests and dry runs.
    ///
    /// Every SQLite connection gets its own `:memory:` database, so the pool
    /// is pinned to one connection that is never recycled.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_error)?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                number INTEGER PRIMARY KEY,
                name TEXT,
                pdf_path TEXT,
                category TEXT NOT NULL,
                published_at TEXT,
                inserted_at TEXT NOT NULL,
                notified_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_notified_at ON tasks(notified_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn select(&self, sql: &str) -> Result<Vec<StoredTask>, StorageError> {
        let rows = sqlx::query_as::<_, TaskRow>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.into_iter().map(StoredTask::try_from).collect()
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn exists(&self, number: TaskNumber) -> Result<bool, StorageError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT number FROM tasks WHERE number = ?")
            .bind(i64::from(number.get()))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(found.is_some())
    }

    async fn insert_if_absent(&self, task: &Task) -> Result<InsertOutcome, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (number, name, pdf_path, category, published_at, inserted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(number) DO NOTHING
            "#,
        )
        .bind(i64::from(task.number.get()))
        .bind(task.name.as_deref())
        .bind(task.pdf_path.as_deref())
        .bind(task.category.code())
        .bind(task.published_at.as_deref())
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        let outcome = if result.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Duplicate
        };
        debug!(number = %task.number, ?outcome, "insert_if_absent");
        Ok(outcome)
    }

    async fn mark_notified(&self, number: TaskNumber) -> Result<(), StorageError> {
        let result =
            sqlx::query("UPDATE tasks SET notified_at = COALESCE(notified_at, ?) WHERE number = ?")
                .bind(self.clock.now())
                .bind(i64::from(number.get()))
                .execute(&self.pool)
                .await
                .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(number));
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<StoredTask>, StorageError> {
        self.select(&format!("{SELECT_TASKS} ORDER BY number")).await
    }

    async fn list_unnotified(&self) -> Result<Vec<StoredTask>, StorageError> {
        self.select(&format!("{SELECT_TASKS} WHERE notified_at IS NULL ORDER BY number"))
            .await
    }
}

#[derive(Debug, FromRow)]
struct TaskRow {
    number: i64,
    name: Option<String>,
    pdf_path: Option<String>,
    category: String,
    published_at: Option<String>,
    inserted_at: DateTime<Utc>,
    notified_at: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRow> for StoredTask {
    type Error = StorageError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let number = u32::try_from(row.number)
            .map_err(|_| StorageError::Corrupt(format!("task number {}", row.number)))?;
        let category = Category::from_code(&row.category)
            .map_err(|e| StorageError::Corrupt(format!("task {number}: {e}")))?;

        Ok(StoredTask {
            task: Task {
                number: TaskNumber::new(number),
                name: row.name,
                pdf_path: row.pdf_path,
                category,
                published_at: row.published_at,
            },
            inserted_at: row.inserted_at,
            notified_at: row.notified_at,
        })
    }
}

fn storage_error(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StorageError::Corrupt(e.to_string())
        }
        _ => StorageError::Unavailable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;

    fn task(number: u32) -> Task {
        Task::new(number, format!("task {number}"), Category::Esportivas)
            .with_pdf_path(format!("/files/{number}.pdf"))
    }

    #[tokio::test]
    async fn conflicting_insert_is_duplicate() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        assert_eq!(store.insert_if_absent(&task(5)).await, Ok(InsertOutcome::Inserted));
        assert_eq!(store.insert_if_absent(&task(5)).await, Ok(InsertOutcome::Duplicate));
        assert!(store.exists(TaskNumber::new(5)).await.unwrap());
        assert!(!store.exists(TaskNumber::new(6)).await.unwrap());
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn round_trips_optional_fields() {
        let at = Utc.with_ymd_and_hms(2024, 2, 10, 20, 0, 0).unwrap();
        let store = SqliteTaskStore::in_memory()
            .await
            .unwrap()
            .with_clock(Arc::new(FixedClock::new(at)));
        let bare = Task {
            number: TaskNumber::new(3),
            name: None,
            pdf_path: None,
            category: Category::Alternativas,
            published_at: None,
        };
        store.insert_if_absent(&bare).await.unwrap();
        store.insert_if_absent(&task(1)).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].task, task(1));
        assert_eq!(all[1].task, bare);
        assert_eq!(all[1].inserted_at, at);
        assert_eq!(all[1].notified_at, None);
    }

    #[tokio::test]
    async fn unnotified_shrinks_after_mark() {
        let store = SqliteTaskStore::in_memory().await.unwrap();
        store.insert_if_absent(&task(1)).await.unwrap();
        store.insert_if_absent(&task(2)).await.unwrap();

        store.mark_notified(TaskNumber::new(1)).await.unwrap();
        let first = store.list_all().await.unwrap()[0].notified_at;
        store.mark_notified(TaskNumber::new(1)).await.unwrap();

        let pending = store.list_unnotified().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].number(), TaskNumber::new(2));
        assert_eq!(store.list_all().await.unwrap()[0].notified_at, first);
    }

    #[tokio::test]
    async fn mark_notified_on_unknown_number_fails() {
        let store = SqliteTaskStore::in_memory().await.unwrap();
        assert_eq!(
            store.mark_notified(TaskNumber::new(404)).await,
            Err(StorageError::NotFound(TaskNumber::new(404)))
        );
    }

    #[tokio::test]
    async fn unknown_category_in_db_is_corrupt() {
        let store = SqliteTaskStore::in_memory().await.unwrap();
        sqlx::query("INSERT INTO tasks (number, category, inserted_at) VALUES (1, '9', ?)")
            .bind(Utc::now())
            .execute(store.pool())
            .await
            .unwrap();

        assert!(matches!(
            store.list_all().await,
            Err(StorageError::Corrupt(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_across_connections_yield_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("tasks.db").display());
        let store = Arc::new(SqliteTaskStore::connect(&url).await.unwrap());
        assert!(store.pool().options().get_max_connections() > 1);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.insert_if_absent(&task(9)).await })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
