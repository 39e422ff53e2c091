//! Test doubles for the ports.
//!
//! ユニットテストと `tests/` の両方から使うので `pub` にしている。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use url::Url;

use crate::domain::{
    BrowserError, InsertOutcome, NotifyError, Sent, StorageError, StoredTask, Task, TaskNumber,
};
use crate::ports::{Browser, NotificationChannel, PageSession, TaskStore};

/// Build a task page in the organizers' markup.
///
/// Each row is `(number, category code, name, href)`.
pub fn task_table(rows: &[(u32, &str, &str, Option<&str>)]) -> String {
    let mut body = String::new();
    for (number, category, name, href) in rows {
        let name_cell = match href {
            Some(href) => format!(r#"<a href="{href}">{name}</a>"#),
            None => name.to_string(),
        };
        body.push_str(&format!(
            r#"<tr data-category="{category}"><td>{number}</td><td>{name_cell}</td><td>10/02/2024 20:00</td></tr>"#
        ));
    }
    format!(
        r#"<html><head><title>Tarefas</title></head><body><table class="table-tasks"><tbody>{body}</tbody></table></body></html>"#
    )
}

#[derive(Default)]
struct BrowserCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    title_reads: AtomicUsize,
}

/// A browser whose page title goes through a fixed script.
///
/// Titles are served in order; the last one repeats forever.
#[derive(Clone)]
pub struct ScriptedBrowser {
    titles: Arc<Vec<String>>,
    html: Arc<Mutex<String>>,
    navigation_error: Option<String>,
    counters: Arc<BrowserCounters>,
}

impl ScriptedBrowser {
    pub fn new(titles: Vec<&str>, html: String) -> Self {
        Self {
            titles: Arc::new(titles.into_iter().map(str::to_string).collect()),
            html: Arc::new(Mutex::new(html)),
            navigation_error: None,
            counters: Arc::default(),
        }
    }

    /// A page that is ready on the first title read.
    pub fn ready(html: String) -> Self {
        Self::new(vec!["Tarefas"], html)
    }

    pub fn failing_navigation(message: &str) -> Self {
        let mut browser = Self::new(vec![], String::new());
        browser.navigation_error = Some(message.to_string());
        browser
    }

    /// Swap the document served to sessions opened afterwards.
    pub async fn set_html(&self, html: String) {
        *self.html.lock().await = html;
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst) - self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn title_reads(&self) -> usize {
        self.counters.title_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn open(&self) -> Result<Box<dyn PageSession>, BrowserError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            browser: self.clone(),
            html: self.html.lock().await.clone(),
            navigated: false,
            reads: 0,
        }))
    }
}

struct ScriptedSession {
    browser: ScriptedBrowser,
    html: String,
    navigated: bool,
    reads: usize,
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn navigate(&mut self, url: &Url) -> Result<(), BrowserError> {
        if let Some(message) = &self.browser.navigation_error {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: message.clone(),
            });
        }
        self.navigated = true;
        Ok(())
    }

    async fn title(&mut self) -> Result<String, BrowserError> {
        if !self.navigated {
            return Err(BrowserError::NotNavigated);
        }
        self.browser.counters.title_reads.fetch_add(1, Ordering::SeqCst);
        let titles = &self.browser.titles;
        let title = titles
            .get(self.reads)
            .or_else(|| titles.last())
            .cloned()
            .unwrap_or_default();
        self.reads += 1;
        Ok(title)
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        if !self.navigated {
            return Err(BrowserError::NotNavigated);
        }
        Ok(self.html.clone())
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.browser.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A channel that keeps every message it accepts.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    reject_containing: Option<String>,
    delay: Option<Duration>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any message containing `needle`.
    pub fn rejecting(needle: &str) -> Self {
        Self {
            reject_containing: Some(needle.to_string()),
            ..Self::default()
        }
    }

    /// Hold every send for `delay` before accepting it.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn messages(&self) -> Vec<String> {
        self.sent().await.into_iter().map(|(_, m)| m).collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, destination: &str, message: &str) -> Result<Sent, NotifyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(needle) = &self.reject_containing
            && message.contains(needle.as_str())
        {
            return Err(NotifyError::Rejected(format!("refused message for {destination}")));
        }
        self.sent
            .lock()
            .await
            .push((destination.to_string(), message.to_string()));
        Ok(Sent)
    }
}

/// A store whose backend is always down.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl UnavailableStore {
    fn down() -> StorageError {
        StorageError::Unavailable("connection refused".into())
    }
}

#[async_trait]
impl TaskStore for UnavailableStore {
    async fn exists(&self, _number: TaskNumber) -> Result<bool, StorageError> {
        Err(Self::down())
    }

    async fn insert_if_absent(&self, _task: &Task) -> Result<InsertOutcome, StorageError> {
        Err(Self::down())
    }

    async fn mark_notified(&self, _number: TaskNumber) -> Result<(), StorageError> {
        Err(Self::down())
    }

    async fn list_all(&self) -> Result<Vec<StoredTask>, StorageError> {
        Err(Self::down())
    }

    async fn list_unnotified(&self) -> Result<Vec<StoredTask>, StorageError> {
        Err(Self::down())
    }
}
