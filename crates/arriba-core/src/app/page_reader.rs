//! PageReader - ページの準備完了を待ち、タスク表の行を読み出す
//!
//! # フロー
//! 1. Browser::open() で新しいセッションを取得
//! 2. navigate → タイトルを poll_interval ごとに再読込（Loading）
//! 3. タイトルに readiness marker が含まれたら Ready
//! 4. HTML を取得して行を RawTaskRow に変換
//! 5. どの経路で抜けてもセッションを close
//!
//! 待機は ready_timeout と CancellationToken で必ず打ち切られる。

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CrawlerConfig;
use crate::domain::{NotReadyReason, PageError, RawTaskRow};
use crate::ports::{Browser, PageSession};

static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("static selector is valid"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("static selector is valid"));

/// Tagged result of the bounded readiness wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready { title: String },
    TimedOut { last_title: Option<String> },
    NavigationFailed(String),
    Cancelled,
}

pub struct PageReader {
    browser: Arc<dyn Browser>,
    url: Url,
    readiness_marker: String,
    row_selector: String,
    poll_interval: Duration,
    ready_timeout: Duration,
}

impl PageReader {
    /// Validates the page url and the row selector up front.
    pub fn new(browser: Arc<dyn Browser>, config: &CrawlerConfig) -> Result<Self, PageError> {
        let url = config
            .page_url()
            .map_err(|e| PageError::InvalidUrl(format!("{}: {e}", config.page_path)))?;
        Selector::parse(&config.row_selector)
            .map_err(|_| PageError::InvalidSelector(config.row_selector.clone()))?;

        Ok(Self {
            browser,
            url,
            readiness_marker: config.readiness_marker.clone(),
            row_selector: config.row_selector.clone(),
            poll_interval: config.poll_interval,
            ready_timeout: config.ready_timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Load the page, wait until it is ready and read every task row.
    pub async fn read(&self, cancel: &CancellationToken) -> Result<Vec<RawTaskRow>, PageError> {
        let mut session = self.browser.open().await.map_err(|e| {
            PageError::not_ready(self.url.as_str(), NotReadyReason::Browser(e.to_string()))
        })?;

        let result = self.read_with(session.as_mut(), cancel).await;

        // close の失敗は本来の結果を上書きしない
        if let Err(e) = session.close().await {
            warn!(url = %self.url, error = %e, "failed to close page session");
        }
        result
    }

    async fn read_with(
        &self,
        session: &mut dyn PageSession,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawTaskRow>, PageError> {
        let reason = match self.await_ready(session, cancel).await {
            Readiness::Ready { title } => {
                info!(url = %self.url, %title, "page ready");
                None
            }
            Readiness::TimedOut { last_title } => Some(NotReadyReason::TimedOut { last_title }),
            Readiness::NavigationFailed(message) => Some(NotReadyReason::NavigationFailed(message)),
            Readiness::Cancelled => Some(NotReadyReason::Cancelled),
        };
        if let Some(reason) = reason {
            return Err(PageError::not_ready(self.url.as_str(), reason));
        }

        let html = session.content().await.map_err(|e| {
            PageError::not_ready(self.url.as_str(), NotReadyReason::Browser(e.to_string()))
        })?;
        parse_rows(&html, &self.row_selector)
    }

    /// Navigate and poll the title until the marker shows up, the timeout
    /// elapses or `cancel` fires. Navigation counts against the timeout.
    pub async fn await_ready(
        &self,
        session: &mut dyn PageSession,
        cancel: &CancellationToken,
    ) -> Readiness {
        // 極端に大きい timeout は Instant を溢れさせるので、期限なしとして扱う
        let deadline = Instant::now().checked_add(self.ready_timeout);
        let mut last_title = None;

        let finished = {
            let poll = self.poll_until_ready(session, &mut last_title);
            let expiry = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(Readiness::Cancelled),
                _ = expiry => None,
                readiness = poll => Some(readiness),
            }
        };

        finished.unwrap_or_else(|| {
            warn!(url = %self.url, timeout = ?self.ready_timeout, ?last_title, "page never became ready");
            Readiness::TimedOut { last_title }
        })
    }

    async fn poll_until_ready(
        &self,
        session: &mut dyn PageSession,
        last_title: &mut Option<String>,
    ) -> Readiness {
        if let Err(e) = session.navigate(&self.url).await {
            return Readiness::NavigationFailed(e.to_string());
        }
        debug!(url = %self.url, "opened page");

        loop {
            match session.title().await {
                Ok(title) if title.contains(&self.readiness_marker) => {
                    return Readiness::Ready { title };
                }
                Ok(title) => {
                    debug!(%title, marker = %self.readiness_marker, "waiting for page");
                    *last_title = Some(title);
                }
                // 読み込み途中の一時的な失敗として扱い、待機を続ける
                Err(e) => debug!(error = %e, "title not readable yet"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Turn every row matching `row_selector` into a [`RawTaskRow`].
///
/// A missing cell only blanks its own field.
pub fn parse_rows(html: &str, row_selector: &str) -> Result<Vec<RawTaskRow>, PageError> {
    let selector = Selector::parse(row_selector)
        .map_err(|_| PageError::InvalidSelector(row_selector.to_string()))?;
    let document = Html::parse_document(html);

    Ok(document.select(&selector).map(parse_row).collect())
}

fn parse_row(row: ElementRef<'_>) -> RawTaskRow {
    let first_cell = row.select(&CELL).next();
    let last_cell = row.select(&CELL).last();
    let anchor = row.select(&ANCHOR).next();

    RawTaskRow {
        number: first_cell.map(text_of),
        name: anchor.map(text_of),
        pdf_path: anchor.and_then(|a| a.value().attr("href")).map(str::to_string),
        category: row.value().attr("data-category").map(str::to_string),
        published_at: last_cell.map(text_of),
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
