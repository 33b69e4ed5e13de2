//! Status command: one check request pulled from the inbound channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::CommandId;

/// Kind of status check requested by the scheduler.
///
/// The worker always runs both backend checks; the type is carried for
/// routing on the consumer side and for log context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    #[serde(alias = "STATUS")]
    StatusCommand,
    #[serde(alias = "SECURITY_STATUS")]
    SecurityStatusCommand,
}

impl CommandType {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandType::StatusCommand => "STATUS_COMMAND",
            CommandType::SecurityStatusCommand => "SECURITY_STATUS_COMMAND",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// StatusCommand は 1 件のステータス確認リクエスト
///
/// Wire format は camelCase（`commandType`, `componentName`）。
/// `id` が無いレコードは受信時に採番します。
/// dequeue 後は不変として扱い、ワーカーは clone して watchdog と結果に渡します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCommand {
    #[serde(default = "CommandId::generate")]
    pub id: CommandId,
    pub command_type: CommandType,
    pub component_name: String,
    /// Backend-specific payload, opaque to the executor.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl StatusCommand {
    pub fn new(
        command_type: CommandType,
        component_name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: CommandId::generate(),
            command_type,
            component_name: component_name.into(),
            payload,
        }
    }

    /// Shorthand for a plain status check without payload.
    pub fn status(component_name: impl Into<String>) -> Self {
        Self::new(
            CommandType::StatusCommand,
            component_name,
            serde_json::Value::Null,
        )
    }

    /// Shorthand for a security status check without payload.
    pub fn security_status(component_name: impl Into<String>) -> Self {
        Self::new(
            CommandType::SecurityStatusCommand,
            component_name,
            serde_json::Value::Null,
        )
    }
}
