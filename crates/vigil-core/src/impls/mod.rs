//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryQueue**: command / result 両方向の in-memory チャネル
//!
//! 本番の backend や上流スケジューラとの接続はこのクレートの外に置きます。

pub mod inmem_queue;

pub use self::inmem_queue::{InMemoryCommandQueue, InMemoryQueue, InMemoryResultQueue};
