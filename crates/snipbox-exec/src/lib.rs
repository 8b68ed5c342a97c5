//! Containment around a snippet engine: an execution filter consulted on
//! every symbol use, a fail-closed sandbox, a deadline watchdog, bounded
//! output capture and the [`Evaluator`] façade that composes them.

pub mod audit;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod output;
pub mod render;
pub mod sandbox;
pub mod watchdog;

pub use audit::{AuditEntry, AuditLogger, AuditResult};
pub use config::{AuditDestination, BlockedConfig, Config};
pub use error::{ConfigError, EvalError, SandboxError, WatchdogError};
pub use evaluator::{EvaluationResult, Evaluator};
pub use filter::{ExecutionFilter, Verdict};
pub use output::{CaptureSink, OutputCapture, OutputEncoding};
pub use sandbox::Sandbox;
pub use watchdog::Watchdog;
