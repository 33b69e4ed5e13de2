//! WorkerLoop - status command 実行ループ
//!
//! # フロー（1 command ごと）
//! 1. CommandSource::next() で command を待つ（協調的に suspend、polling しない）
//! 2. ExecutionContext を baseline に戻す
//! 3. Watchdog を `status_command_timeout` で arm
//! 4. component status → component security status の順に backend を呼ぶ
//!    （呼び出しは CheckRunner の専用スレッドで実行）
//! 5. ExecutionResult を ResultSink に publish
//! 6. Watchdog を disarm（すでに発火していれば何もしない）
//!
//! # 失敗時の方針（let it crash）
//! ループ内の失敗はすべてログに残してから `Err` で返し、ワーカーを終わらせます。
//! ループ自体のリトライはしません。再起動は supervisor の責務です。
//!
//! # タイムアウト時
//! watchdog は warning を出して TimeoutSignal を立てるだけです。
//! 止まっている backend 呼び出しは中断できないので、返ってきた結果は遅れても publish します。
//! `timed_out` は publish 直前に読みます。publish 中に発火した場合は結果に印が付かず、
//! disarm 時にログだけ残ります。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use super::check_runner::{CheckRunner, RunnerLost};
use super::config::{FaultPolicy, WorkerConfig};
use super::watchdog::{Disarmed, Watchdog};
use crate::domain::{
    BackendError, CheckFailure, ContextState, ExecutionContext, ExecutionResult, StatusCommand,
    TimeoutSignal, WorkerError, WorkerId,
};
use crate::ports::{CommandSource, OrchestrationBackend, ResultSink};

/// One worker incarnation: drains the command source strictly sequentially.
pub struct StatusWorker {
    id: WorkerId,
    config: WorkerConfig,
    commands: Arc<dyn CommandSource>,
    results: Arc<dyn ResultSink>,
    backend: Arc<dyn OrchestrationBackend>,
    watchdog: Watchdog,
    context: ExecutionContext,
    signal: TimeoutSignal,
    terminated: Arc<AtomicBool>,
}

impl StatusWorker {
    pub fn new(
        config: WorkerConfig,
        commands: Arc<dyn CommandSource>,
        results: Arc<dyn ResultSink>,
        backend: Arc<dyn OrchestrationBackend>,
    ) -> Self {
        Self {
            id: WorkerId::generate(),
            config,
            commands,
            results,
            backend,
            watchdog: Watchdog::new(),
            context: ExecutionContext::default(),
            signal: TimeoutSignal::new(),
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use `baseline` as the state every command starts from.
    pub fn with_context(mut self, baseline: ContextState) -> Self {
        self.context = ExecutionContext::new(baseline);
        self
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn timeout_signal(&self) -> TimeoutSignal {
        self.signal.clone()
    }

    /// A view of the watchdog slot (shows whether a command is in flight).
    pub fn watchdog(&self) -> Watchdog {
        self.watchdog.clone()
    }

    /// Run the worker as its own task.
    pub fn spawn(self) -> WorkerHandle {
        let id = self.id;
        let signal = self.signal.clone();
        let terminated = Arc::clone(&self.terminated);
        let join = tokio::spawn(self.run());
        WorkerHandle {
            id,
            signal,
            terminated,
            join,
            exit: None,
        }
    }

    /// Serve commands until the source is closed or something fails.
    pub async fn run(mut self) -> Result<(), WorkerError> {
        info!(
            worker = %self.id,
            timeout = ?self.config.status_command_timeout,
            fault_policy = ?self.config.fault_policy,
            "status worker started"
        );

        match self.run_loop().await {
            Ok(()) => {
                warn!(worker = %self.id, "status worker has finished");
                Ok(())
            }
            Err(WorkerError::Terminated(id)) => Err(WorkerError::Terminated(id)),
            Err(err) => {
                error!(worker = %self.id, error = %err, details = ?err, "status worker failed");
                Err(err)
            }
        }
    }

    async fn run_loop(&mut self) -> Result<(), WorkerError> {
        let checks = CheckRunner::start(self.id, Arc::clone(&self.backend))
            .map_err(|err| WorkerError::BackendThread(err.to_string()))?;

        while let Some(command) = self.commands.next().await.map_err(WorkerError::Source)? {
            self.execute(&checks, command).await?;
        }
        Ok(())
    }

    async fn execute(
        &mut self,
        checks: &CheckRunner,
        command: StatusCommand,
    ) -> Result<(), WorkerError> {
        debug!(
            worker = %self.id,
            command_id = %command.id,
            command_type = %command.command_type,
            component = %command.component_name,
            "executing status command"
        );

        match self.context.revert() {
            Ok(true) => debug!(worker = %self.id, "reverted execution context left by previous command"),
            Ok(false) => {}
            Err(source) => {
                return Err(WorkerError::ContextReset {
                    command_type: command.command_type,
                    component: command.component_name,
                    source,
                });
            }
        }

        let guard = self.watchdog.arm(
            command.clone(),
            self.config.status_command_timeout,
            on_timeout(self.id, self.config.status_command_timeout, self.signal.clone()),
        )?;

        let status = checks
            .check_status(&command, &mut self.context)
            .await
            .map_err(|RunnerLost| lost(&command))?;
        let status = self.settle(&command, status)?;

        let security_status = checks
            .check_security_status(&command, &mut self.context)
            .await
            .map_err(|RunnerLost| lost(&command))?;
        let security_status = self.settle(&command, security_status)?;

        let timed_out = guard.has_fired();
        if timed_out {
            info!(
                worker = %self.id,
                command_id = %command.id,
                component = %command.component_name,
                "late result for timed out command, publishing anyway"
            );
        }

        // terminate() may land while this poll is still running
        if self.terminated.load(Ordering::Acquire) {
            debug!(
                worker = %self.id,
                command_id = %command.id,
                "worker terminated, dropping result"
            );
            return Err(WorkerError::Terminated(self.id));
        }

        let command_id = command.id;
        let command_type = command.command_type;
        let component = command.component_name.clone();
        let result = ExecutionResult {
            command,
            status,
            security_status,
            worker: self.id,
            timed_out,
            completed_at: Utc::now(),
        };
        self.results
            .publish(result)
            .await
            .map_err(|source| WorkerError::Sink {
                command_type,
                component: component.clone(),
                source,
            })?;

        if guard.disarm() == Disarmed::AlreadyFired && !timed_out {
            info!(
                worker = %self.id,
                command_id = %command_id,
                component = %component,
                "watchdog fired while the result was being published"
            );
        }
        Ok(())
    }

    /// Apply the fault policy to one backend outcome.
    fn settle<T>(
        &self,
        command: &StatusCommand,
        outcome: Result<T, BackendError>,
    ) -> Result<Result<T, CheckFailure>, WorkerError> {
        match outcome {
            Ok(report) => Ok(Ok(report)),
            Err(err) if self.config.fault_policy == FaultPolicy::Isolate => {
                warn!(
                    worker = %self.id,
                    command_id = %command.id,
                    command_type = %command.command_type,
                    component = %command.component_name,
                    error = %err,
                    "status check failed, publishing failure marker"
                );
                Ok(Err(CheckFailure::new(err.to_string())))
            }
            Err(source) => Err(WorkerError::Backend {
                command_type: command.command_type,
                component: command.component_name.clone(),
                source,
            }),
        }
    }
}

fn lost(command: &StatusCommand) -> WorkerError {
    WorkerError::BackendLost {
        command_type: command.command_type,
        component: command.component_name.clone(),
    }
}

/// The watchdog's fire handler.
///
/// Despite the traditional "respawn" name this restarts nothing: it logs and
/// sets the signal. Respawn is the supervisor's decision.
fn on_timeout(
    worker: WorkerId,
    timeout: Duration,
    signal: TimeoutSignal,
) -> impl FnOnce(&StatusCommand) + Send + 'static {
    move |command: &StatusCommand| {
        warn!(
            worker = %worker,
            command_id = %command.id,
            command_type = %command.command_type,
            component = %command.component_name,
            timeout_secs = timeout.as_secs_f64(),
            "Command {} for {} is running for more than {:?}, signalling timeout",
            command.command_type,
            command.component_name,
            timeout
        );
        signal.set();
    }
}

/// Handle to a spawned worker, addressed by its id.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    signal: TimeoutSignal,
    terminated: Arc<AtomicBool>,
    join: JoinHandle<Result<(), WorkerError>>,
    exit: Option<Result<(), WorkerError>>,
}

impl WorkerHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn timeout_signal(&self) -> &TimeoutSignal {
        &self.signal
    }

    pub fn is_finished(&self) -> bool {
        self.exit.is_some() || self.join.is_finished()
    }

    /// Kill the worker immediately.
    ///
    /// No cleanup: the in-flight backend call is abandoned on its thread and
    /// its result is never published.
    pub fn terminate(&self) {
        warn!(worker = %self.id, "terminating status worker");
        self.terminated.store(true, Ordering::Release);
        self.join.abort();
    }

    /// Wait for the worker to end. Later calls return the same exit.
    pub async fn wait(&mut self) -> Result<(), WorkerError> {
        if let Some(exit) = &self.exit {
            return exit.clone();
        }
        let id = self.id;
        let exit = (&mut self.join)
            .await
            .unwrap_or_else(|err| Err(exit_from_join_error(id, err)));
        self.exit = Some(exit.clone());
        exit
    }

    pub async fn join(mut self) -> Result<(), WorkerError> {
        self.wait().await
    }
}

fn exit_from_join_error(worker: WorkerId, err: JoinError) -> WorkerError {
    if err.is_cancelled() {
        return WorkerError::Terminated(worker);
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    WorkerError::Panicked { worker, message }
}
