//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。各 trait は外部システム
//! （ページ描画エンジン、永続ストア、通知チャネル）への契約だけを定義し、
//! 実装の詳細は `impls` に置きます。

pub mod browser;
pub mod channel;
pub mod clock;
pub mod id_generator;
pub mod task_store;

pub use self::browser::{Browser, PageSession};
pub use self::channel::NotificationChannel;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::TaskStore;
