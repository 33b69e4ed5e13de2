//! App - アプリケーション層
//!
//! ports を組み合わせて status command の実行パイプラインを組み立てます。
//!
//! # 主要コンポーネント
//! - **StatusWorker**: command 実行ループ（dequeue → arm → backend → publish → disarm）
//! - **CheckRunner**: backend 呼び出しを専用スレッドで実行（ブロックしても巻き込まれない）
//! - **Watchdog**: command 1 件ごとのタイムアウト検知（signal のみ、止めない）
//! - **Supervisor**: ワーカーの死活とタイムアウトを見て作り直す
//! - **config**: `[agent]` セクションの読み込み

mod check_runner;
pub mod config;
pub mod supervisor;
pub mod watchdog;
pub mod worker_loop;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型を再エクスポート
pub use self::config::{AgentConfig, ConfigError, FaultPolicy, SupervisorConfig, WorkerConfig};
pub use self::supervisor::{Supervisor, SupervisorHandle};
pub use self::watchdog::{Disarmed, Watchdog, WatchdogHandle};
pub use self::worker_loop::{StatusWorker, WorkerHandle};
