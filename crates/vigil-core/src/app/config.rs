//! Agent configuration.
//!
//! Values live under the `[agent]` section of the agent config file and can be
//! overridden from the environment (`VIGIL__AGENT__STATUS_COMMAND_TIMEOUT=10`).
//! Everything is read once when the worker / supervisor is constructed.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_STATUS_COMMAND_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_RESTART_DELAY_MS: u64 = 100;

const ENV_PREFIX: &str = "VIGIL";

/// What the worker does when a backend check returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// The error is fatal: the worker logs it and exits, no result is published.
    #[default]
    FailFast,
    /// The error is packaged into the result and the worker keeps serving.
    Isolate,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load agent config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid agent config: {0}")]
    Invalid(String),
}

/// Settings for one status worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub status_command_timeout: Duration,
    pub fault_policy: FaultPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            status_command_timeout: Duration::from_secs(DEFAULT_STATUS_COMMAND_TIMEOUT_SECS),
            fault_policy: FaultPolicy::default(),
        }
    }
}

/// Settings for the supervision loop.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Terminate and respawn the worker as soon as its timeout signal is set.
    pub restart_on_timeout: bool,
    /// Pause between a worker exit and the next incarnation.
    pub restart_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_on_timeout: true,
            restart_delay: Duration::from_millis(DEFAULT_RESTART_DELAY_MS),
        }
    }
}

/// The `[agent]` section as it appears on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    pub status_command_timeout: u64,
    pub status_command_fault_policy: FaultPolicy,
    pub restart_on_timeout: bool,
    pub restart_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub agent: AgentSection,
}

impl AgentConfig {
    /// Load defaults, then the optional file, then environment overrides.
    ///
    /// The file format follows its extension (`.ini`, `.toml`, `.yaml`, `.json`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Same as [`AgentConfig::load`], reading overrides from `env` instead of
    /// the process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default(
                "agent.status_command_timeout",
                DEFAULT_STATUS_COMMAND_TIMEOUT_SECS,
            )?
            .set_default("agent.status_command_fault_policy", "fail_fast")?
            .set_default("agent.restart_on_timeout", true)?
            .set_default("agent.restart_delay_ms", DEFAULT_RESTART_DELAY_MS)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let loaded: AgentConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .prefix_separator("__")
                    .separator("__")
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.status_command_timeout == 0 {
            return Err(ConfigError::Invalid(
                "status_command_timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            status_command_timeout: Duration::from_secs(self.agent.status_command_timeout),
            fault_policy: self.agent.status_command_fault_policy,
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            restart_on_timeout: self.agent.restart_on_timeout,
            restart_delay: Duration::from_millis(self.agent.restart_delay_ms),
        }
    }
}
