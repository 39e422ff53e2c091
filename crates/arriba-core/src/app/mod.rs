//! App - アプリケーション層
//!
//! ports を組み合わせて crawl → dedup → notify のパイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **PageReader**: ページの準備完了待ちと行の読み出し
//! - **extractor**: 生の行 → Task
//! - **DedupIngestor**: insert-if-absent による新規判定
//! - **Notifier**: 新規 Task ごとに 1 通
//! - **Crawler**: 1 run の状態機械
//! - **CrawlService**: run の起動（spawn）と照会

pub mod extractor;
pub mod ingestor;
pub mod notifier;
pub mod orchestrator;
pub mod page_reader;
pub mod service;
pub mod status;

// 主要な型を再エクスポート
pub use self::extractor::{extract, extract_all};
pub use self::ingestor::DedupIngestor;
pub use self::notifier::{Notifier, format_message};
pub use self::orchestrator::Crawler;
pub use self::page_reader::{PageReader, Readiness, parse_rows};
pub use self::service::{CrawlHandle, CrawlService};
pub use self::status::{RunRegistry, RunStatus};
