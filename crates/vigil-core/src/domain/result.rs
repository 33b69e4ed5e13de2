//! Execution results published to the outbound channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::command::StatusCommand;
use super::ids::WorkerId;

/// Live state of a component as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentStatus {
    Started,
    Installed,
    Unknown,
}

/// Security state of a component as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityState {
    SecuredKerberos,
    Unsecured,
    Unknown,
    Error,
}

/// Outcome of `check_component_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub exit_code: i32,
    pub status: ComponentStatus,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl StatusReport {
    pub fn new(status: ComponentStatus) -> Self {
        let exit_code = match status {
            ComponentStatus::Started => 0,
            ComponentStatus::Installed | ComponentStatus::Unknown => 1,
        };
        Self {
            exit_code,
            status,
            detail: serde_json::Value::Null,
        }
    }
}

/// Outcome of `check_component_security_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub state: SecurityState,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl SecurityReport {
    pub fn new(state: SecurityState) -> Self {
        Self {
            state,
            detail: serde_json::Value::Null,
        }
    }
}

/// Error marker for a check that failed while the worker kept running.
///
/// Only produced under `FaultPolicy::Isolate`; consumers must accept it in
/// place of either report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    pub reason: String,
}

impl CheckFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// ExecutionResult は (command, status, security status) の組
///
/// 1 command につき 1 回だけ生成されます。
/// `timed_out` は watchdog が publish 前に発火したかどうかの注釈で、
/// 結果そのものの抑止には使いません（遅れて返ってきた結果もそのまま流す）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub command: StatusCommand,
    pub status: Result<StatusReport, CheckFailure>,
    pub security_status: Result<SecurityReport, CheckFailure>,
    pub worker: WorkerId,
    pub timed_out: bool,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn is_complete(&self) -> bool {
        self.status.is_ok() && self.security_status.is_ok()
    }
}
