//! OrchestrationBackend port - status / security status checks

use async_trait::async_trait;

use crate::domain::{
    BackendError, ExecutionContext, SecurityReport, StatusCommand, StatusReport,
};

/// Performs the actual checks for a command.
///
/// Either call may take arbitrarily long or never return; the executor does
/// not expect cooperative cancellation. Calls run on a thread owned by the
/// worker incarnation, so blocking that thread is allowed. Any change a check makes to the
/// ambient state must go through `ctx`, which the worker reverts before the
/// next command.
#[async_trait]
pub trait OrchestrationBackend: Send + Sync {
    async fn check_component_status(
        &self,
        command: &StatusCommand,
        ctx: &mut ExecutionContext,
    ) -> Result<StatusReport, BackendError>;

    async fn check_component_security_status(
        &self,
        command: &StatusCommand,
        ctx: &mut ExecutionContext,
    ) -> Result<SecurityReport, BackendError>;
}
