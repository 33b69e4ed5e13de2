//! Domain model (ids, commands, results, execution context, signals, errors).

pub mod command;
pub mod context;
pub mod errors;
pub mod ids;
pub mod result;
pub mod signal;

pub use command::{CommandType, StatusCommand};
pub use context::{ContextState, ExecutionContext};
pub use errors::{BackendError, CheckKind, ContextError, QueueError, WatchdogError, WorkerError};
pub use ids::{CommandId, WorkerId};
pub use result::{
    CheckFailure, ComponentStatus, ExecutionResult, SecurityReport, SecurityState, StatusReport,
};
pub use signal::TimeoutSignal;
