//! Ports - 外部コラボレータとの境界
//!
//! ワーカーが触る外部システムは 3 つだけです。
//! - **CommandSource**: 上流スケジューラが積む status command の受信キュー
//! - **ResultSink**: 下流に結果を流す送信キュー
//! - **OrchestrationBackend**: 実際の status / security status チェック
//!
//! どれも `Send + Sync` で `Arc<dyn ...>` として共有し、
//! supervisor がワーカーを作り直しても同じインスタンスを使い続けます。

pub mod backend;
pub mod command_source;
pub mod result_sink;

pub use self::backend::OrchestrationBackend;
pub use self::command_source::CommandSource;
pub use self::result_sink::ResultSink;
