//! Browser port - ページ描画エンジンの抽象化
//!
//! Core が必要とするのは「URL を開く」「タイトルを読む」「DOM 相当の HTML を読む」
//! 「セッションを閉じる」の 4 つだけ。描画エンジン自体は不透明なまま扱う。
//!
//! # 実装
//! - **HttpBrowser**: reqwest で HTML を取得（タイトル読み取りは再取得 = reload）
//! - テスト用の scripted session は `testing` モジュール

use async_trait::async_trait;
use url::Url;

use crate::domain::BrowserError;

/// Browser は run ごとに新しいセッションを開く
#[async_trait]
pub trait Browser: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>, BrowserError>;
}

/// One automation session, owned by a single page load.
///
/// The page reader calls [`PageSession::close`] on every exit path.
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &Url) -> Result<(), BrowserError>;

    /// Current document title. Called repeatedly while polling for readiness.
    async fn title(&mut self) -> Result<String, BrowserError>;

    /// Current document as HTML.
    async fn content(&mut self) -> Result<String, BrowserError>;

    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}
