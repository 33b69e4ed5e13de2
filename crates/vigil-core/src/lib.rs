//! vigil-core
//!
//! Supervised, bounded-latency executor for component status commands.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, command, result, context, signal, errors）
//! - **ports**: 抽象化レイヤー（CommandSource, ResultSink, OrchestrationBackend）
//! - **app**: アプリケーションロジック（watchdog, worker_loop, supervisor, config）
//! - **impls**: 実装（InMemoryQueue など開発用）
//! - **observability**: tracing subscriber の初期化

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
