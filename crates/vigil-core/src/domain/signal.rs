//! TimeoutSignal - ワーカー 1 incarnation 分のタイムアウトフラグ
//!
//! watchdog が発火するたびに `set()` され、自動でクリアされることはありません。
//! supervisor やテストは `is_set()` で読むか、`wait()` で待ちます。
//! 再起動時は supervisor が新しい signal を持つワーカーを作ります。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct SignalInner {
    set: AtomicBool,
    occurrences: AtomicU64,
    notify: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct TimeoutSignal {
    inner: Arc<SignalInner>,
}

impl TimeoutSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one timeout occurrence and wake every waiter.
    pub fn set(&self) {
        self.inner.occurrences.fetch_add(1, Ordering::AcqRel);
        self.inner.set.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.inner.set.load(Ordering::Acquire)
    }

    /// Number of timeouts recorded so far.
    pub fn occurrences(&self) -> u64 {
        self.inner.occurrences.load(Ordering::Acquire)
    }

    /// Wait until the signal is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // register before checking so a concurrent set() is not missed
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}
