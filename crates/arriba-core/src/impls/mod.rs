//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SqliteTaskStore**: 本番用の正本（sqlx）
//! - **InMemoryTaskStore**: 開発用・テスト用の正本（dashmap）
//! - **HttpBrowser**: reqwest でページを取得する Browser
//! - **WebhookChannel**: JSON POST で通知を中継
//! - **LogChannel**: 通知をログに出すだけ

pub mod http_browser;
pub mod inmem_store;
pub mod log_channel;
pub mod sqlite_store;
pub mod webhook_channel;

// 主要な型を再エクスポート
pub use self::http_browser::HttpBrowser;
pub use self::inmem_store::InMemoryTaskStore;
pub use self::log_channel::LogChannel;
pub use self::sqlite_store::SqliteTaskStore;
pub use self::webhook_channel::WebhookChannel;
