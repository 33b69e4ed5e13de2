//! Supervisor - ワーカーの生死を監視して作り直す
//!
//! ワーカーは自分では再起動しません（fail-fast）。supervisor がその契約の反対側です。
//!
//! # フロー
//! 1. 新しい StatusWorker（新しい WorkerId と TimeoutSignal）を spawn
//! 2. 次のどれかを待つ
//!    - shutdown 要求 → ワーカーを terminate して終了
//!    - ワーカー終了
//!      - `Ok`（command source が close された）→ 監視も終了
//!      - `Err` / panic / 外部からの terminate → `restart_delay` 後に作り直す
//!    - TimeoutSignal（`restart_on_timeout` のときだけ）→ terminate して作り直す
//!
//! チャネルと backend は incarnation をまたいで共有します。
//! in-memory チャネルは cancel-safe なので、terminate で command を失うことはありません
//! （実行中だった command は破棄されます）。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::config::{SupervisorConfig, WorkerConfig};
use super::worker_loop::StatusWorker;
use crate::domain::{ContextState, WorkerError, WorkerId};
use crate::ports::{CommandSource, OrchestrationBackend, ResultSink};

pub struct Supervisor {
    config: SupervisorConfig,
    worker_config: WorkerConfig,
    commands: Arc<dyn CommandSource>,
    results: Arc<dyn ResultSink>,
    backend: Arc<dyn OrchestrationBackend>,
    baseline: ContextState,
}

#[derive(Debug, Default)]
struct SupervisorStats {
    incarnations: AtomicU64,
    restarts: AtomicU64,
    timeout_restarts: AtomicU64,
}

/// Why one incarnation ended.
enum Exit {
    Shutdown,
    SourceClosed,
    Crashed(WorkerError),
    TimedOut,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        worker_config: WorkerConfig,
        commands: Arc<dyn CommandSource>,
        results: Arc<dyn ResultSink>,
        backend: Arc<dyn OrchestrationBackend>,
    ) -> Self {
        Self {
            config,
            worker_config,
            commands,
            results,
            backend,
            baseline: ContextState::default(),
        }
    }

    /// Execution context every incarnation starts from.
    pub fn with_context(mut self, baseline: ContextState) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn spawn(self) -> SupervisorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (current_tx, current_rx) = watch::channel(None);
        let stats = Arc::new(SupervisorStats::default());

        let join = tokio::spawn({
            let stats = Arc::clone(&stats);
            async move { self.run(shutdown_rx, current_tx, stats).await }
        });

        SupervisorHandle {
            shutdown_tx,
            current: current_rx,
            stats,
            join,
        }
    }

    fn new_worker(&self) -> StatusWorker {
        StatusWorker::new(
            self.worker_config.clone(),
            Arc::clone(&self.commands),
            Arc::clone(&self.results),
            Arc::clone(&self.backend),
        )
        .with_context(self.baseline.clone())
    }

    async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        current_tx: watch::Sender<Option<WorkerId>>,
        stats: Arc<SupervisorStats>,
    ) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let mut handle = self.new_worker().spawn();
            let worker = handle.id();
            let signal = handle.timeout_signal().clone();
            stats.incarnations.fetch_add(1, Ordering::Relaxed);
            current_tx.send_replace(Some(worker));
            info!(worker = %worker, "spawned status worker");

            let exit = tokio::select! {
                // a dropped handle counts as a shutdown request
                _ = shutdown_rx.changed() => Exit::Shutdown,
                res = handle.wait() => match res {
                    Ok(()) => Exit::SourceClosed,
                    Err(err) => Exit::Crashed(err),
                },
                _ = signal.wait(), if self.config.restart_on_timeout => Exit::TimedOut,
            };

            match exit {
                Exit::Shutdown => {
                    handle.terminate();
                    let _ = handle.wait().await;
                    break;
                }
                Exit::SourceClosed => {
                    info!(worker = %worker, "command source closed, supervision finished");
                    break;
                }
                Exit::Crashed(err) => {
                    warn!(worker = %worker, error = %err, "status worker died, restarting");
                }
                Exit::TimedOut => {
                    warn!(
                        worker = %worker,
                        "status worker timed out, terminating and respawning"
                    );
                    handle.terminate();
                    let _ = handle.wait().await;
                    stats.timeout_restarts.fetch_add(1, Ordering::Relaxed);
                }
            }
            stats.restarts.fetch_add(1, Ordering::Relaxed);
            current_tx.send_replace(None);

            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(self.config.restart_delay) => {}
            }
        }

        current_tx.send_replace(None);
        info!("status supervisor stopped");
    }
}

/// Handle to a running supervisor.
/// - dropping it (or `shutdown_and_join`) stops supervision and terminates the worker
/// - `join()` waits for supervision to end on its own (command source closed)
#[derive(Debug)]
pub struct SupervisorHandle {
    shutdown_tx: watch::Sender<bool>,
    current: watch::Receiver<Option<WorkerId>>,
    stats: Arc<SupervisorStats>,
    join: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Id of the worker incarnation currently running, if any.
    pub fn current_worker(&self) -> Option<WorkerId> {
        *self.current.borrow()
    }

    /// Number of workers spawned so far.
    pub fn incarnations(&self) -> u64 {
        self.stats.incarnations.load(Ordering::Relaxed)
    }

    /// Number of times a worker was replaced after dying or timing out.
    pub fn restarts(&self) -> u64 {
        self.stats.restarts.load(Ordering::Relaxed)
    }

    /// Restarts caused by a timeout signal.
    pub fn timeout_restarts(&self) -> u64 {
        self.stats.timeout_restarts.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }

    pub async fn join(self) {
        let _ = self.join.await;
    }
}
