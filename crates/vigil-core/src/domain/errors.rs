//! Errors - エラー型と分類
//!
//! タイムアウトはエラーではありません（warning ログ + TimeoutSignal）。
//! ここにあるのは、ワーカーを止める（または結果に埋め込まれる）失敗だけです。

use std::fmt;

use thiserror::Error;

use super::command::CommandType;
use super::ids::{CommandId, WorkerId};

/// Which backend check an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Status,
    SecurityStatus,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Status => f.write_str("component status"),
            CheckKind::SecurityStatus => f.write_str("component security status"),
        }
    }
}

/// Inbound/outbound channel failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,

    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

/// Failure reported by the orchestration backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{check} check for {component} failed: {reason}")]
    CheckFailed {
        check: CheckKind,
        component: String,
        reason: String,
    },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("execution context is poisoned: {0}")]
    Poisoned(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchdogError {
    /// A second watchdog was armed while one was still active.
    #[error("watchdog already armed for {armed_for}, refusing to arm for {requested}")]
    AlreadyArmed {
        armed_for: CommandId,
        requested: CommandId,
    },
}

/// Fatal worker fault. Any of these ends the worker; restart is the supervisor's job.
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    #[error("command source failed: {0}")]
    Source(#[source] QueueError),

    #[error("result sink failed for {command_type} {component}: {source}")]
    Sink {
        command_type: CommandType,
        component: String,
        #[source]
        source: QueueError,
    },

    #[error("backend fault for {command_type} {component}: {source}")]
    Backend {
        command_type: CommandType,
        component: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to reset execution context before {command_type} {component}: {source}")]
    ContextReset {
        command_type: CommandType,
        component: String,
        #[source]
        source: ContextError,
    },

    #[error("backend thread died during {command_type} {component}")]
    BackendLost {
        command_type: CommandType,
        component: String,
    },

    #[error("failed to start backend thread: {0}")]
    BackendThread(String),

    #[error(transparent)]
    Watchdog(#[from] WatchdogError),

    #[error("{0} was terminated")]
    Terminated(WorkerId),

    #[error("{worker} panicked: {message}")]
    Panicked { worker: WorkerId, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_names_check_and_component() {
        let err = BackendError::CheckFailed {
            check: CheckKind::SecurityStatus,
            component: "DATANODE".to_string(),
            reason: "timeout talking to KDC".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "component security status check for DATANODE failed: timeout talking to KDC"
        );
    }

    #[test]
    fn worker_error_carries_command_context() {
        let err = WorkerError::Backend {
            command_type: CommandType::StatusCommand,
            component: "NAMENODE".to_string(),
            source: BackendError::Unavailable("agent socket closed".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("STATUS_COMMAND"));
        assert!(msg.contains("NAMENODE"));
        assert!(msg.contains("agent socket closed"));
    }
}
