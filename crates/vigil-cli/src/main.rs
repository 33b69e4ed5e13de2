use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use vigil_core::app::{AgentConfig, Supervisor};
use vigil_core::domain::{
    BackendError, CheckKind, ComponentStatus, ExecutionContext, SecurityReport, SecurityState,
    StatusCommand, StatusReport,
};
use vigil_core::impls::{InMemoryCommandQueue, InMemoryResultQueue};
use vigil_core::observability::init_logging;
use vigil_core::ports::OrchestrationBackend;

/// What the simulated backend reads from a command's payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SimulatedCheck {
    delay_ms: u64,
    fail: Option<String>,
    secured: bool,
}

/// Backend stand-in: sleeps and answers according to the payload.
struct SimulatedBackend;

impl SimulatedBackend {
    fn plan(command: &StatusCommand) -> SimulatedCheck {
        serde_json::from_value(command.payload.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OrchestrationBackend for SimulatedBackend {
    async fn check_component_status(
        &self,
        command: &StatusCommand,
        ctx: &mut ExecutionContext,
    ) -> Result<StatusReport, BackendError> {
        let plan = Self::plan(command);
        ctx.set_env("COMPONENT_NAME", command.component_name.clone());
        tokio::time::sleep(Duration::from_millis(plan.delay_ms)).await;

        if let Some(reason) = plan.fail {
            return Err(BackendError::CheckFailed {
                check: CheckKind::Status,
                component: command.component_name.clone(),
                reason,
            });
        }
        Ok(StatusReport::new(ComponentStatus::Started))
    }

    async fn check_component_security_status(
        &self,
        command: &StatusCommand,
        _ctx: &mut ExecutionContext,
    ) -> Result<SecurityReport, BackendError> {
        let state = if Self::plan(command).secured {
            SecurityState::SecuredKerberos
        } else {
            SecurityState::Unsecured
        };
        Ok(SecurityReport::new(state))
    }
}

/// stdin: one JSON status command per line
/// stdout: one JSON execution result per line
///
/// ```text
/// {"commandType":"STATUS","componentName":"NAMENODE","payload":{"delayMs":200}}
/// ```
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("info");

    // (A) 設定を読む（引数があればそのファイル、なければ既定値 + 環境変数）
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AgentConfig::load(config_path.as_deref()).context("loading agent config")?;
    info!(?config, "agent config loaded");

    // (B) チャネルと backend を用意して supervisor を起動
    let commands = Arc::new(InMemoryCommandQueue::new());
    let results = Arc::new(InMemoryResultQueue::new());
    let supervisor = Supervisor::new(
        config.supervisor_config(),
        config.worker_config(),
        commands.clone(),
        results.clone(),
        Arc::new(SimulatedBackend),
    )
    .spawn();

    // (C) 結果を stdout に流す
    let printer = tokio::spawn({
        let results = results.clone();
        async move {
            let mut stdout = tokio::io::stdout();
            while let Some(result) = results.recv().await {
                let mut line = serde_json::to_vec(&result)?;
                line.push(b'\n');
                stdout.write_all(&line).await?;
                stdout.flush().await?;
            }
            anyhow::Ok(())
        }
    });

    // (D) stdin の各行を command として投入
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StatusCommand>(&line) {
            Ok(command) => commands.push(command).await?,
            Err(err) => warn!(error = %err, line = %line, "skipping malformed command"),
        }
    }

    // (E) 入力が尽きたら閉じて、ワーカーが空にするのを待つ
    commands.close().await;
    supervisor.join().await;
    results.close().await;
    printer.await.context("result printer panicked")??;
    Ok(())
}
