//! CheckRunner - backend 呼び出し専用スレッド
//!
//! backend はスレッドをブロックしたまま戻ってこないことがあります（協調的な中断は期待できない）。
//! ワーカーのタスクと watchdog のタイマーを巻き込まないよう、
//! backend 呼び出しは incarnation ごとの専用 OS スレッドで、そのスレッド専用の
//! current-thread runtime 上で実行します。
//!
//! # 受け渡し
//! 1. ワーカーが command と ExecutionContext を move してジョブを送る
//! 2. runner スレッドが `block_on` で backend を呼ぶ
//! 3. 結果と ExecutionContext を oneshot で返す
//!
//! ワーカーは oneshot を await しているだけなので、terminate すればその場で止まります。
//! 実行中だった呼び出しは放置され、返ってきた結果は誰にも届きません。

use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::domain::{
    BackendError, ExecutionContext, SecurityReport, StatusCommand, StatusReport, WorkerId,
};
use crate::ports::OrchestrationBackend;

type Job = Box<dyn FnOnce(&Runtime) + Send>;

/// The runner thread went away before replying (the backend panicked).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunnerLost;

/// Handle to one incarnation's backend thread.
///
/// Dropping it closes the job channel; the thread exits once its current call
/// (if any) returns.
pub(crate) struct CheckRunner {
    backend: Arc<dyn OrchestrationBackend>,
    jobs: mpsc::UnboundedSender<Job>,
}

impl CheckRunner {
    pub(crate) fn start(
        worker: WorkerId,
        backend: Arc<dyn OrchestrationBackend>,
    ) -> std::io::Result<Self> {
        let (jobs, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name(format!("{worker}-checks"))
            .spawn(move || serve(worker, rx))?;
        Ok(Self { backend, jobs })
    }

    pub(crate) async fn check_status(
        &self,
        command: &StatusCommand,
        ctx: &mut ExecutionContext,
    ) -> Result<Result<StatusReport, BackendError>, RunnerLost> {
        let backend = Arc::clone(&self.backend);
        let command = command.clone();
        let mut moved = std::mem::take(ctx);
        let (outcome, returned) = self
            .submit(move |runtime| {
                let outcome = runtime.block_on(backend.check_component_status(&command, &mut moved));
                (outcome, moved)
            })
            .await?;
        *ctx = returned;
        Ok(outcome)
    }

    pub(crate) async fn check_security_status(
        &self,
        command: &StatusCommand,
        ctx: &mut ExecutionContext,
    ) -> Result<Result<SecurityReport, BackendError>, RunnerLost> {
        let backend = Arc::clone(&self.backend);
        let command = command.clone();
        let mut moved = std::mem::take(ctx);
        let (outcome, returned) = self
            .submit(move |runtime| {
                let outcome = runtime
                    .block_on(backend.check_component_security_status(&command, &mut moved));
                (outcome, moved)
            })
            .await?;
        *ctx = returned;
        Ok(outcome)
    }

    async fn submit<T, F>(&self, call: F) -> Result<T, RunnerLost>
    where
        T: Send + 'static,
        F: FnOnce(&Runtime) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.jobs
            .send(Box::new(move |runtime: &Runtime| {
                // the worker may be gone by now
                let _ = reply_tx.send(call(runtime));
            }))
            .map_err(|_| RunnerLost)?;
        reply_rx.await.map_err(|_| RunnerLost)
    }
}

fn serve(worker: WorkerId, mut jobs: mpsc::UnboundedReceiver<Job>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(worker = %worker, error = %err, "failed to build backend runtime");
            return;
        }
    };

    while let Some(job) = jobs.blocking_recv() {
        job(&runtime);
    }
    debug!(worker = %worker, "backend thread stopped");
}
