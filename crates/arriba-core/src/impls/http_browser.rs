//! HttpBrowser - reqwest による Browser 実装
//!
//! JavaScript は実行しない。サーバが最終的な HTML を返すページ向け。
//! 準備完了の待機に合わせ、navigate 直後の 1 回を除いて `title()` のたびに
//! ページを取り直す（reload 相当）。

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::domain::BrowserError;
use crate::ports::{Browser, PageSession};

const USER_AGENT: &str = concat!("arriba/", env!("CARGO_PKG_VERSION"));

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("static selector is valid"));

#[derive(Clone)]
pub struct HttpBrowser {
    client: Client,
}

impl HttpBrowser {
    /// `request_timeout` bounds each individual fetch.
    pub fn new(request_timeout: Duration) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| BrowserError::Other(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn open(&self) -> Result<Box<dyn PageSession>, BrowserError> {
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            url: None,
            html: None,
            fresh: false,
        }))
    }
}

struct HttpSession {
    client: Client,
    url: Option<Url>,
    html: Option<String>,
    /// The held document was fetched by `navigate` and not yet looked at.
    fresh: bool,
}

impl HttpSession {
    async fn fetch(&self, url: &Url) -> Result<String, BrowserError> {
        let navigation = |e: reqwest::Error| BrowserError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(navigation)?;
        response.text().await.map_err(navigation)
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn navigate(&mut self, url: &Url) -> Result<(), BrowserError> {
        let html = self.fetch(url).await?;
        debug!(%url, bytes = html.len(), "fetched page");
        self.url = Some(url.clone());
        self.html = Some(html);
        self.fresh = true;
        Ok(())
    }

    async fn title(&mut self) -> Result<String, BrowserError> {
        let url = self.url.clone().ok_or(BrowserError::NotNavigated)?;
        if !self.fresh {
            self.html = Some(self.fetch(&url).await?);
        }
        self.fresh = false;
        Ok(self.html.as_deref().map(parse_title).unwrap_or_default())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        self.html.clone().ok_or(BrowserError::NotNavigated)
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// Text of the document's `<title>`, or an empty string.
pub fn parse_title(html: &str) -> String {
    Html::parse_document(html)
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
