//! CommandSource port - inbound command channel

use async_trait::async_trait;

use crate::domain::{QueueError, StatusCommand};

/// Ordered, blocking pull interface.
///
/// # 設計原則
/// - `next()` は command が来るまで協調的に待つ（polling しない）
/// - close 済みで空になったら `Ok(None)`
/// - cancel-safe であること: 待機中に呼び出し側の task が abort されても command を失わない
#[async_trait]
pub trait CommandSource: Send + Sync {
    async fn next(&self) -> Result<Option<StatusCommand>, QueueError>;
}
