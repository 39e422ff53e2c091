//! arriba-core
//!
//! Core building blocks for the gincana task watcher: read the organizers'
//! task page, store each task once, announce the new ones.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（task, category, ids, outcome, state, errors）
//! - **ports**: 抽象化レイヤー（Browser, TaskStore, NotificationChannel, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（page_reader, extractor, ingestor, notifier, orchestrator, service）
//! - **impls**: 実装（SQLite / in-memory store, HTTP browser, webhook / log channel）
//! - **config**: 環境変数からの設定
//! - **testing**: ports のテスト用実装

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod testing;
