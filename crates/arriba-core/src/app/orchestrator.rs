//! Crawler - 1 回の crawl run を駆動する
//!
//! # フロー
//! 1. Started: PageReader でページを開き、準備完了を待つ
//! 2. PageLoaded: 生の行が揃った
//! 3. Extracted: 行を Task に変換（失敗した行は記録して除外）
//! 4. Ingesting: Task ごとに ingest → (Inserted なら) notify → mark_notified
//!    を最大 `max_concurrency` 件並行に実行
//! 5. Done: 全レコードが終端の結果に到達
//!
//! page / storage の障害とキャンセルは run 全体を Failed にする。
//! レコード単位の失敗（抽出・通知）は RecordOutcome として報告するだけ。

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::extractor::extract_all;
use super::ingestor::DedupIngestor;
use super::notifier::Notifier;
use super::page_reader::PageReader;
use crate::config::CrawlerConfig;
use crate::domain::{
    InsertOutcome, NotifyError, PageError, RecordOutcome, RunError, RunId, RunReport, RunState,
    StorageError, Task,
};
use crate::ports::{Browser, NotificationChannel, TaskStore};

pub struct Crawler {
    reader: PageReader,
    ingestor: DedupIngestor,
    notifier: Notifier,
    store: Arc<dyn TaskStore>,
    max_concurrency: usize,
}

impl Crawler {
    pub fn new(
        config: &CrawlerConfig,
        browser: Arc<dyn Browser>,
        store: Arc<dyn TaskStore>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Result<Self, PageError> {
        Ok(Self {
            reader: PageReader::new(browser, config)?,
            ingestor: DedupIngestor::new(Arc::clone(&store)),
            notifier: Notifier::new(channel, config.destination.clone(), config.link_base()),
            store,
            max_concurrency: config.max_concurrency.max(1),
        })
    }

    /// Execute one run, publishing every state change on `state`.
    ///
    /// The final state is always `Done` or `Failed`, matching the result.
    pub async fn run(
        &self,
        run_id: RunId,
        state: &watch::Sender<RunState>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        let span = info_span!("crawl_run", %run_id, url = %self.reader.url());
        async {
            info!("crawl run started");
            let result = self.run_stages(run_id, state, cancel).await;
            match &result {
                Ok(report) => {
                    advance(state, RunState::Done);
                    info!(
                        found = report.counts.found,
                        inserted = report.counts.inserted(),
                        duplicate = report.counts.duplicate,
                        notify_failed = report.counts.inserted_notify_failed,
                        extraction_errors = report.counts.extraction_errors,
                        "crawl run done"
                    );
                }
                Err(e) => {
                    advance(state, RunState::Failed);
                    error!(error = %e, "crawl run failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        run_id: RunId,
        state: &watch::Sender<RunState>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        let rows = self.reader.read(cancel).await.map_err(|e| {
            if e.is_cancelled() {
                RunError::Cancelled
            } else {
                RunError::Page(e)
            }
        })?;
        let found = rows.len();
        advance(state, RunState::PageLoaded);

        let (tasks, rejected) = extract_all(rows);
        advance(state, RunState::Extracted);
        debug!(tasks = tasks.len(), rejected = rejected.len(), "rows extracted");

        advance(state, RunState::Ingesting);
        let processing = stream::iter(tasks)
            .map(|task| self.process(task))
            .buffer_unordered(self.max_concurrency)
            .try_collect::<Vec<_>>();

        let mut outcomes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            outcomes = processing => outcomes?,
        };

        outcomes.extend(
            rejected
                .into_iter()
                .map(|(row, e)| RecordOutcome::ExtractionError {
                    row,
                    error: e.to_string(),
                }),
        );
        Ok(RunReport::new(run_id, found, outcomes))
    }

    /// Ingest one task and notify when this run inserted it.
    async fn process(&self, task: Task) -> Result<RecordOutcome, StorageError> {
        let number = task.number;
        match self.ingestor.ingest(&task).await? {
            InsertOutcome::Duplicate => Ok(RecordOutcome::Duplicate { number }),
            InsertOutcome::Inserted => match self.deliver(&task).await {
                Ok(()) => Ok(RecordOutcome::InsertedAndNotified { number }),
                Err(e) => {
                    warn!(%number, error = %e, "task stored but not notified");
                    Ok(RecordOutcome::InsertedNotifyFailed {
                        number,
                        error: e.to_string(),
                    })
                }
            },
        }
    }

    async fn deliver(&self, task: &Task) -> Result<(), NotifyError> {
        self.notifier.notify(task).await?;
        self.store.mark_notified(task.number).await?;
        Ok(())
    }
}

fn advance(state: &watch::Sender<RunState>, next: RunState) {
    state.send_if_modified(|current| {
        if current.can_advance_to(next) {
            *current = next;
            true
        } else {
            warn!(from = ?*current, to = ?next, "ignoring illegal run state transition");
            false
        }
    });
}
