//! ResultSink port - outbound result channel

use async_trait::async_trait;

use crate::domain::{ExecutionResult, QueueError};

/// Ordered push interface for completed results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish(&self, result: ExecutionResult) -> Result<(), QueueError>;
}
