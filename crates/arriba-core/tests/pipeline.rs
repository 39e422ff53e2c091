//! End-to-end runs over the scripted browser: page → store → messages.

use std::sync::Arc;
use std::time::Duration;

use arriba_core::app::{CrawlService, Crawler};
use arriba_core::config::CrawlerConfig;
use arriba_core::domain::{RunError, RunState, StorageError, TaskNumber};
use arriba_core::impls::{InMemoryTaskStore, SqliteTaskStore};
use arriba_core::ports::TaskStore;
use arriba_core::testing::{RecordingChannel, ScriptedBrowser, UnavailableStore, task_table};
use url::Url;

fn config() -> CrawlerConfig {
    CrawlerConfig {
        base_url: Url::parse("https://tasks.test").unwrap(),
        poll_interval: Duration::from_millis(5),
        ready_timeout: Duration::from_secs(5),
        destination: Some("group-1".into()),
        ..CrawlerConfig::default()
    }
}

fn scenario_page() -> String {
    task_table(&[
        (101, "3", "Find a rock", Some("/files/101.pdf")),
        (102, "5", "Borrow a hat", Some("/files/102.pdf")),
    ])
}

fn service(
    browser: &ScriptedBrowser,
    store: Arc<dyn TaskStore>,
    channel: &RecordingChannel,
) -> CrawlService {
    let crawler = Crawler::new(
        &config(),
        Arc::new(browser.clone()),
        Arc::clone(&store),
        Arc::new(channel.clone()),
    )
    .unwrap();
    CrawlService::new(crawler, store)
}

#[tokio::test]
async fn new_tasks_are_stored_and_announced_once() {
    let browser = ScriptedBrowser::new(vec!["Carregando...", "Tarefas"], scenario_page());
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let channel = RecordingChannel::new();
    let svc = service(&browser, Arc::clone(&store), &channel);

    let report = svc.start_crawl().await.wait().await.unwrap();

    assert_eq!(
        report.inserted_numbers(),
        vec![TaskNumber::new(101), TaskNumber::new(102)]
    );
    let stored = svc.list_tasks().await.unwrap();
    assert_eq!(stored.len(), 2);

    let mut messages = channel.messages().await;
    messages.sort();
    assert_eq!(
        messages,
        vec![
            "Nova tarefa: 🏺 Objetos\n102 - Borrow a hat\nhttps://tasks.test/files/102.pdf",
            "Nova tarefa: 🔍 Diversas\n101 - Find a rock\nhttps://tasks.test/files/101.pdf",
        ]
    );
    assert!(channel.sent().await.iter().all(|(d, _)| d == "group-1"));
    assert!(svc.list_unnotified().await.unwrap().is_empty());
    assert_eq!(browser.open_sessions(), 0);
}

#[tokio::test]
async fn rerun_on_unchanged_page_changes_nothing() {
    let browser = ScriptedBrowser::ready(scenario_page());
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let channel = RecordingChannel::new();
    let svc = service(&browser, Arc::clone(&store), &channel);

    svc.start_crawl().await.wait().await.unwrap();
    let before = svc.list_tasks().await.unwrap();

    let second = svc.start_crawl().await.wait().await.unwrap();

    assert_eq!(second.counts.inserted(), 0);
    assert_eq!(second.counts.duplicate, 2);
    assert_eq!(channel.sent().await.len(), 2);
    assert_eq!(svc.list_tasks().await.unwrap(), before);
    assert_eq!(browser.sessions_opened(), 2);
    assert_eq!(browser.open_sessions(), 0);
}

#[tokio::test]
async fn only_tasks_added_since_last_run_are_announced() {
    let browser = ScriptedBrowser::ready(scenario_page());
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let channel = RecordingChannel::new();
    let svc = service(&browser, Arc::clone(&store), &channel);

    svc.start_crawl().await.wait().await.unwrap();
    browser
        .set_html(task_table(&[
            (101, "3", "Find a rock", Some("/files/101.pdf")),
            (102, "5", "Borrow a hat", Some("/files/102.pdf")),
            (103, "6", "Ring a bell", None),
        ]))
        .await;

    let report = svc.start_crawl().await.wait().await.unwrap();

    assert_eq!(report.inserted_numbers(), vec![TaskNumber::new(103)]);
    let messages = channel.messages().await;
    assert_eq!(messages.len(), 3);
    // リンクの無い行は名前セルも素のテキストなので、名前は空になる
    assert!(messages.contains(&"Nova tarefa: 🔦 Rua\n103 - ".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_insert_each_number_once() {
    let rows: Vec<(u32, String)> = (1..=40).map(|n| (n, format!("task {n}"))).collect();
    let first: Vec<_> = rows[..30]
        .iter()
        .map(|(n, name)| (*n, "2", name.as_str(), None))
        .collect();
    let second: Vec<_> = rows[10..]
        .iter()
        .map(|(n, name)| (*n, "2", name.as_str(), None))
        .collect();

    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let channel = RecordingChannel::new();
    let a = service(&ScriptedBrowser::ready(task_table(&first)), Arc::clone(&store), &channel);
    let b = service(&ScriptedBrowser::ready(task_table(&second)), Arc::clone(&store), &channel);

    let (ra, rb) = tokio::join!(
        async { a.start_crawl().await.wait().await },
        async { b.start_crawl().await.wait().await },
    );
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    let mut inserted: Vec<TaskNumber> = ra
        .inserted_numbers()
        .into_iter()
        .chain(rb.inserted_numbers())
        .collect();
    inserted.sort();
    let expected: Vec<TaskNumber> = (1..=40).map(TaskNumber::new).collect();
    assert_eq!(inserted, expected);
    assert_eq!(store.list_all().await.unwrap().len(), 40);
    assert_eq!(channel.sent().await.len(), 40);
}

#[tokio::test]
async fn failed_notification_stays_pending() {
    let browser = ScriptedBrowser::ready(scenario_page());
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let channel = RecordingChannel::rejecting("Find a rock");
    let svc = service(&browser, Arc::clone(&store), &channel);

    let report = svc.start_crawl().await.wait().await.unwrap();

    assert_eq!(report.counts.inserted_and_notified, 1);
    assert_eq!(report.counts.inserted_notify_failed, 1);
    let pending = svc.list_unnotified().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].number(), TaskNumber::new(101));

    // 再実行しても重複扱いで、再送はしない
    let again = svc.start_crawl().await.wait().await.unwrap();
    assert_eq!(again.counts.duplicate, 2);
    assert_eq!(channel.sent().await.len(), 1);
}

#[tokio::test]
async fn cancelling_mid_ingest_keeps_inserted_tasks_queryable() {
    let browser = ScriptedBrowser::ready(scenario_page());
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let channel = RecordingChannel::slow(Duration::from_secs(10));
    let svc = service(&browser, Arc::clone(&store), &channel);

    let handle = svc.start_crawl().await;
    let run_id = handle.run_id();
    let mut states = handle.subscribe();
    states
        .wait_for(|state| *state == RunState::Ingesting)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    assert_eq!(handle.wait().await, Err(RunError::Cancelled));
    assert_eq!(svc.run_status(run_id).await.unwrap().state, RunState::Failed);
    assert!(channel.sent().await.is_empty());
    assert_eq!(svc.list_unnotified().await.unwrap().len(), 2);
    assert_eq!(browser.open_sessions(), 0);
}

#[tokio::test]
async fn storage_outage_fails_the_run() {
    let browser = ScriptedBrowser::ready(scenario_page());
    let channel = RecordingChannel::new();
    let svc = service(&browser, Arc::new(UnavailableStore), &channel);

    let handle = svc.start_crawl().await;
    let run_id = handle.run_id();
    let err = handle.wait().await.unwrap_err();

    assert!(matches!(err, RunError::Storage(StorageError::Unavailable(_))));
    assert!(channel.sent().await.is_empty());
    assert_eq!(svc.run_status(run_id).await.unwrap().state, RunState::Failed);
}

#[tokio::test]
async fn rows_without_link_or_category_do_not_block_others() {
    let page = task_table(&[
        (101, "3", "Find a rock", None),
        (102, "42", "Unknown kind", Some("/files/102.pdf")),
    ]);
    let browser = ScriptedBrowser::ready(page);
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let channel = RecordingChannel::new();
    let svc = service(&browser, Arc::clone(&store), &channel);

    let report = svc.start_crawl().await.wait().await.unwrap();

    assert_eq!(report.counts.found, 2);
    assert_eq!(report.counts.extraction_errors, 1);
    assert_eq!(report.inserted_numbers(), vec![TaskNumber::new(101)]);
    let stored = svc.list_tasks().await.unwrap();
    assert_eq!(stored[0].task.pdf_path, None);
    assert_eq!(
        channel.messages().await,
        vec!["Nova tarefa: 🔍 Diversas\n101 - ".to_string()]
    );
}

#[tokio::test]
async fn sqlite_store_backs_the_whole_pipeline() {
    let browser = ScriptedBrowser::ready(scenario_page());
    let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::in_memory().await.unwrap());
    let channel = RecordingChannel::new();
    let svc = service(&browser, Arc::clone(&store), &channel);

    let first = svc.start_crawl().await.wait().await.unwrap();
    let second = svc.start_crawl().await.wait().await.unwrap();

    assert_eq!(first.counts.inserted_and_notified, 2);
    assert_eq!(second.counts.duplicate, 2);
    assert_eq!(channel.sent().await.len(), 2);
    let stored = svc.list_tasks().await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|t| t.is_notified()));
}
