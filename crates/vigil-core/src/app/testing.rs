//! Scripted backend for worker / supervisor tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::watchdog::Watchdog;
use crate::domain::{
    BackendError, CheckKind, ComponentStatus, ContextState, ExecutionContext, SecurityReport,
    SecurityState, StatusCommand, StatusReport,
};
use crate::ports::OrchestrationBackend;

/// Behaviour for one component name.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    pub status_delay: Duration,
    /// Blocks the calling thread instead of yielding.
    pub status_block: Duration,
    pub status_panic: bool,
    pub security_delay: Duration,
    pub status_error: Option<String>,
    pub security_error: Option<String>,
    pub dirty_context: bool,
    pub poison_context: bool,
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<(String, String)>>,
    contexts_seen: Mutex<Vec<ContextState>>,
    armed_during_calls: Mutex<Vec<bool>>,
    observed: Mutex<Option<Watchdog>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(&self, component: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(component.to_string(), script);
    }

    /// Record whether `watchdog` is armed at the start of every call.
    pub(crate) fn observe(&self, watchdog: Watchdog) {
        *self.observed.lock().unwrap() = Some(watchdog);
    }

    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn contexts_seen(&self) -> Vec<ContextState> {
        self.contexts_seen.lock().unwrap().clone()
    }

    pub(crate) fn armed_during_calls(&self) -> Vec<bool> {
        self.armed_during_calls.lock().unwrap().clone()
    }

    fn enter(&self, kind: &str, command: &StatusCommand, ctx: &ExecutionContext) -> Script {
        self.calls
            .lock()
            .unwrap()
            .push((kind.to_string(), command.component_name.clone()));
        self.contexts_seen.lock().unwrap().push(ctx.current().clone());
        if let Some(watchdog) = self.observed.lock().unwrap().as_ref() {
            self.armed_during_calls
                .lock()
                .unwrap()
                .push(watchdog.is_armed());
        }
        self.scripts
            .lock()
            .unwrap()
            .get(&command.component_name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl OrchestrationBackend for ScriptedBackend {
    async fn check_component_status(
        &self,
        command: &StatusCommand,
        ctx: &mut ExecutionContext,
    ) -> Result<StatusReport, BackendError> {
        let script = self.enter("status", command, ctx);
        if !script.status_delay.is_zero() {
            tokio::time::sleep(script.status_delay).await;
        }
        if !script.status_block.is_zero() {
            std::thread::sleep(script.status_block);
        }
        if script.status_panic {
            panic!("status script for {} blew up", command.component_name);
        }
        if script.dirty_context {
            ctx.push_search_path(format!("/var/lib/stacks/{}/scripts", command.component_name));
            ctx.set_env("CHECK_COMPONENT", command.component_name.clone());
        }
        if script.poison_context {
            ctx.poison(format!("{} loaded a native module", command.component_name));
        }
        match script.status_error {
            Some(reason) => Err(BackendError::CheckFailed {
                check: CheckKind::Status,
                component: command.component_name.clone(),
                reason,
            }),
            None => Ok(StatusReport::new(ComponentStatus::Started)),
        }
    }

    async fn check_component_security_status(
        &self,
        command: &StatusCommand,
        ctx: &mut ExecutionContext,
    ) -> Result<SecurityReport, BackendError> {
        let script = self.enter("security", command, ctx);
        if !script.security_delay.is_zero() {
            tokio::time::sleep(script.security_delay).await;
        }
        match script.security_error {
            Some(reason) => Err(BackendError::CheckFailed {
                check: CheckKind::SecurityStatus,
                component: command.component_name.clone(),
                reason,
            }),
            None => Ok(SecurityReport::new(SecurityState::Unsecured)),
        }
    }
}
