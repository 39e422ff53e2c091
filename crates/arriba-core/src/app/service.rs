//! CrawlService - trigger 側の窓口
//!
//! `start_crawl` は run を spawn して即座に [`CrawlHandle`] を返す（完了を待たない）。
//! 状態は handle の watch チャネルか `run_status` / `runs` で見る。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::orchestrator::Crawler;
use super::status::{DEFAULT_RUN_HISTORY, RunRegistry, RunStatus};
use crate::domain::{RunError, RunId, RunReport, RunState, StorageError, StoredTask};
use crate::ports::{Clock, IdGenerator, SystemClock, TaskStore, UlidGenerator};

pub struct CrawlService {
    crawler: Arc<Crawler>,
    store: Arc<dyn TaskStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    registry: Arc<RunRegistry>,
}

impl CrawlService {
    /// `store` should be the same store the crawler ingests into.
    pub fn new(crawler: Crawler, store: Arc<dyn TaskStore>) -> Self {
        Self {
            crawler: Arc::new(crawler),
            store,
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            clock: Arc::new(SystemClock),
            registry: Arc::new(RunRegistry::new(DEFAULT_RUN_HISTORY)),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// How many runs `runs()` remembers.
    pub fn with_run_history(mut self, capacity: usize) -> Self {
        self.registry = Arc::new(RunRegistry::new(capacity));
        self
    }

    /// Start a run in the background.
    pub async fn start_crawl(&self) -> CrawlHandle {
        self.start_crawl_with(CancellationToken::new()).await
    }

    /// Start a run that stops when `cancel` fires.
    pub async fn start_crawl_with(&self, cancel: CancellationToken) -> CrawlHandle {
        let run_id = self.ids.generate_run_id();
        let (state_tx, state_rx) = watch::channel(RunState::Started);
        self.registry
            .register(run_id, self.clock.now(), state_rx.clone())
            .await;
        info!(%run_id, "crawl triggered");

        let crawler = Arc::clone(&self.crawler);
        let run_cancel = cancel.clone();
        let run = tokio::spawn(async move { crawler.run(run_id, &state_tx, &run_cancel).await });

        // run 側が panic しても registry に結果を残すため、外側のタスクで待つ
        let registry = Arc::clone(&self.registry);
        let clock = Arc::clone(&self.clock);
        let join = tokio::spawn(async move {
            let result = run.await.unwrap_or_else(|e| {
                error!(%run_id, error = %e, "crawl run task aborted");
                Err(RunError::Aborted(e.to_string()))
            });
            registry.finish(run_id, clock.now(), &result).await;
            result
        });

        CrawlHandle {
            run_id,
            status: state_rx,
            cancel,
            join,
        }
    }

    pub async fn list_tasks(&self) -> Result<Vec<StoredTask>, StorageError> {
        self.store.list_all().await
    }

    pub async fn list_unnotified(&self) -> Result<Vec<StoredTask>, StorageError> {
        self.store.list_unnotified().await
    }

    pub async fn run_status(&self, run_id: RunId) -> Option<RunStatus> {
        self.registry.get(run_id).await
    }

    /// Known runs, newest first.
    pub async fn runs(&self) -> Vec<RunStatus> {
        self.registry.list().await
    }
}

/// Handle to a spawned run.
pub struct CrawlHandle {
    run_id: RunId,
    status: watch::Receiver<RunState>,
    cancel: CancellationToken,
    join: JoinHandle<Result<RunReport, RunError>>,
}

impl CrawlHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Latest published state.
    pub fn state(&self) -> RunState {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.status.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunReport, RunError> {
        self.join
            .await
            .unwrap_or_else(|e| Err(RunError::Aborted(e.to_string())))
    }
}
