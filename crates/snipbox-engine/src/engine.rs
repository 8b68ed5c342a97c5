use std::io::Write;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::gate::AccessGate;
use crate::snippet::{Diagnostic, SnippetEvent, SnippetId};

/// Everything a host hands an engine when building it.
pub struct EngineHost {
    /// Target of the snippet's standard output.
    pub out: Box<dyn Write + Send>,
    /// Target of the snippet's standard error.
    pub err: Box<dyn Write + Send>,
    /// Consulted on every symbol resolution.
    pub gate: Arc<dyn AccessGate>,
    /// Hard stop signal. Once cancelled the engine must abandon the current
    /// evaluation as soon as it next observes the token.
    pub stop: CancellationToken,
}

impl std::fmt::Debug for EngineHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHost")
            .field("stopped", &self.stop.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// A stateful, single-threaded snippet engine.
///
/// Compile and runtime failures are reported as [`SnippetEvent`]s, never as
/// errors: they are the expected outcome of running untrusted code.
pub trait Engine: Send {
    /// Decompose `source` into snippets, compile and run them in order.
    fn eval(&mut self, source: &str) -> Vec<SnippetEvent>;

    /// Diagnostics recorded for a snippet. Does not change engine state.
    fn diagnostics(&self, snippet: SnippetId) -> Vec<Diagnostic>;

    /// Release resources held by the engine. Called at most once.
    fn close(&mut self) {}
}

/// Builds engines wired to a host's output sinks, gate and stop signal.
pub trait EngineFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns [`EngineError`] when the engine cannot be constructed.
    fn create(&self, host: EngineHost) -> Result<Box<dyn Engine>, EngineError>;
}
