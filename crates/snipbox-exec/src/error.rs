use std::path::PathBuf;
use std::time::Duration;

use snipbox_engine::EngineError;
use thiserror::Error;

/// Construction-time misconfiguration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("malformed blocked method entry {entry:?}: expected Class#method")]
    MalformedMethod { entry: String },

    #[error("unsupported output encoding {0:?}: only UTF-8 is available")]
    UnsupportedEncoding(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SandboxError {
    #[error("a sandboxed action is already running")]
    AlreadyActive,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatchdogError {
    /// The deadline elapsed. `stopped` tells whether the action wound down
    /// within the stop grace period after the forced stop.
    #[error("evaluation exceeded the {}ms deadline", deadline.as_millis())]
    Timeout { deadline: Duration, stopped: bool },
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Timeout(#[from] WatchdogError),

    #[error("engine panicked during evaluation")]
    EnginePanicked,

    #[error("evaluator retired after a forced stop; build a new one")]
    Retired,

    #[error("evaluator is closed")]
    Closed,
}

impl EvalError {
    /// True when this error leaves the evaluator unusable.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::EnginePanicked | Self::Retired | Self::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let err = WatchdogError::Timeout {
            deadline: Duration::from_millis(5000),
            stopped: true,
        };
        assert_eq!(err.to_string(), "evaluation exceeded the 5000ms deadline");
        assert_eq!(
            EvalError::from(err).to_string(),
            "evaluation exceeded the 5000ms deadline"
        );
    }

    #[test]
    fn malformed_method_display() {
        let err = ConfigError::MalformedMethod {
            entry: "java.lang.Systemexit".into(),
        };
        assert!(err.to_string().contains("Class#method"));
    }

    #[test]
    fn terminal_errors() {
        assert!(EvalError::Retired.is_terminal());
        assert!(EvalError::EnginePanicked.is_terminal());
        assert!(!EvalError::Sandbox(SandboxError::AlreadyActive).is_terminal());
    }
}
