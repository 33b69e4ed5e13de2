//! InMemoryQueue - 開発・テスト用の FIFO チャネル
//!
//! 同じ実装を受信側（`CommandSource`）と送信側（`ResultSink`）の両方に使います。
//!
//! # 実装詳細
//! - `tokio::sync::Mutex<VecDeque<T>>` + `Notify` による blocking pop
//! - pop はロックを取った poll の中で完結するので cancel-safe
//! - `close()` 後も残っている要素は取り出せる。空になったら `None`

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::{ExecutionResult, QueueError, StatusCommand};
use crate::ports::{CommandSource, ResultSink};

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

#[derive(Debug)]
pub struct InMemoryQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

/// Inbound command channel.
pub type InMemoryCommandQueue = InMemoryQueue<StatusCommand>;

/// Outbound result channel.
pub type InMemoryResultQueue = InMemoryQueue<ExecutionResult>;

impl<T: Send> InMemoryQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append an item and wake one waiter.
    pub async fn push(&self, item: T) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.items.push_back(item);
        drop(state);
        self.notify.notify_one();
        Ok(())
    }

    /// Wait for the next item. `None` once closed and drained.
    pub async fn recv(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.state.lock().await;
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Take everything currently queued without waiting.
    pub async fn drain(&self) -> Vec<T> {
        let mut state = self.state.lock().await;
        state.items.drain(..).collect()
    }

    /// Stop accepting new items and wake all waiters.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<T: Send> Default for InMemoryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandSource for InMemoryQueue<StatusCommand> {
    async fn next(&self) -> Result<Option<StatusCommand>, QueueError> {
        Ok(self.recv().await)
    }
}

#[async_trait]
impl ResultSink for InMemoryQueue<ExecutionResult> {
    async fn publish(&self, result: ExecutionResult) -> Result<(), QueueError> {
        self.push(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn preserves_fifo_order() {
        let queue = InMemoryCommandQueue::new();
        queue.push(StatusCommand::status("NAMENODE")).await.unwrap();
        queue.push(StatusCommand::status("DATANODE")).await.unwrap();

        let first = queue.next().await.unwrap().unwrap();
        let second = queue.next().await.unwrap().unwrap();
        assert_eq!(first.component_name, "NAMENODE");
        assert_eq!(second.component_name, "DATANODE");
    }

    #[tokio::test(start_paused = true)]
    async fn push_wakes_waiting_consumer() {
        let queue = Arc::new(InMemoryCommandQueue::new());
        let consumer = tokio::spawn({
            let queue = queue.clone();
            async move { queue.next().await }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!consumer.is_finished());

        queue.push(StatusCommand::status("ZOOKEEPER_SERVER")).await.unwrap();
        let command = consumer.await.unwrap().unwrap().unwrap();
        assert_eq!(command.component_name, "ZOOKEEPER_SERVER");
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let queue = InMemoryCommandQueue::new();
        queue.push(StatusCommand::status("NAMENODE")).await.unwrap();
        queue.close().await;

        assert_eq!(
            queue.push(StatusCommand::status("DATANODE")).await,
            Err(QueueError::Closed)
        );
        assert!(queue.next().await.unwrap().is_some());
        assert!(queue.next().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn close_wakes_idle_consumer() {
        let queue = Arc::new(InMemoryCommandQueue::new());
        let consumer = tokio::spawn({
            let queue = queue.clone();
            async move { queue.next().await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        queue.close().await;

        assert!(consumer.await.unwrap().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_consumer_does_not_lose_commands() {
        let queue = Arc::new(InMemoryCommandQueue::new());
        let consumer = tokio::spawn({
            let queue = queue.clone();
            async move { queue.next().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        consumer.abort();
        let _ = consumer.await;

        queue.push(StatusCommand::status("HBASE_MASTER")).await.unwrap();
        assert_eq!(queue.len().await, 1);
        let command = queue.next().await.unwrap().unwrap();
        assert_eq!(command.component_name, "HBASE_MASTER");
    }
}
