//! The evaluation façade: one engine, its sandbox, watchdog and output
//! capture, driven one command at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use snipbox_engine::{
    Diagnostic, Engine, EngineFactory, EngineHost, InterpreterFactory, SnippetEvent,
};
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditEntry, AuditLogger, AuditResult};
use crate::config::Config;
use crate::error::EvalError;
use crate::filter::ExecutionFilter;
use crate::output::OutputCapture;
use crate::sandbox::Sandbox;
use crate::watchdog::Watchdog;

/// Outcome of one [`Evaluator::eval`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationResult {
    /// Snippet events in the order the command decomposed into.
    pub events: Vec<SnippetEvent>,
    /// Everything written to standard output and error during the call.
    pub output: String,
}

impl EvaluationResult {
    /// Events for snippets that were rejected or threw.
    pub fn failures(&self) -> impl Iterator<Item = &SnippetEvent> {
        self.events.iter().filter(|e| e.is_failure())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    /// The engine was force-stopped or panicked and has been dropped.
    Retired,
    Closed,
}

/// Clears the capture on every exit path of an evaluation.
struct ResetOnDrop(OutputCapture);

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        self.0.reset();
    }
}

/// Runs untrusted commands against a single engine session.
///
/// Evaluations are serialized by `&mut self`. After a timeout or an engine
/// panic the evaluator is retired: the engine is dropped and every later
/// call fails with [`EvalError::Retired`]. Build a new evaluator to continue.
pub struct Evaluator {
    engine: Option<Box<dyn Engine>>,
    state: State,
    sandbox: Sandbox,
    watchdog: Watchdog,
    output: OutputCapture,
    stop: CancellationToken,
    audit: Option<AuditLogger>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("state", &self.state)
            .field("watchdog", &self.watchdog)
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    /// Evaluator backed by the built-in interpreter.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Config`] for an invalid configuration and
    /// [`EvalError::Engine`] if the engine cannot be built.
    pub fn new(config: &Config) -> Result<Self, EvalError> {
        Self::with_factory(config, &InterpreterFactory)
    }

    /// Evaluator backed by an engine from `factory`. The engine's output
    /// sinks, access gate and stop signal are wired here.
    ///
    /// # Errors
    ///
    /// Same as [`Evaluator::new`].
    pub fn with_factory(config: &Config, factory: &dyn EngineFactory) -> Result<Self, EvalError> {
        config.validate()?;
        let filter = ExecutionFilter::from_config(&config.blocked)?;
        let output = OutputCapture::from_config(&config.output)?;
        let sandbox = Sandbox::new(filter);
        let stop = CancellationToken::new();

        let engine = factory.create(EngineHost {
            out: Box::new(output.sink()),
            err: Box::new(output.sink()),
            gate: Arc::new(sandbox.clone()),
            stop: stop.clone(),
        })?;

        tracing::debug!(
            timeout_ms = config.execution.timeout_ms,
            max_output_bytes = config.output.max_bytes,
            "evaluator ready"
        );
        Ok(Self {
            engine: Some(engine),
            state: State::Ready,
            sandbox,
            watchdog: Watchdog::from_config(&config.execution),
            output,
            stop,
            audit: None,
        })
    }

    /// Record every evaluation with `logger`.
    #[must_use]
    pub fn with_audit(mut self, logger: AuditLogger) -> Self {
        self.audit = Some(logger);
        self
    }

    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.state == State::Retired
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.watchdog.deadline()
    }

    /// Evaluate `command` inside the sandbox under the deadline.
    ///
    /// Compile and runtime failures of the command, including policy
    /// denials, are reported in the returned events.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Timeout`] when the deadline elapses,
    /// [`EvalError::EnginePanicked`] when the engine crashes, and
    /// [`EvalError::Retired`] / [`EvalError::Closed`] once the evaluator can
    /// no longer run commands.
    pub async fn eval(&mut self, command: &str) -> Result<EvaluationResult, EvalError> {
        match self.state {
            State::Ready => {}
            State::Retired => return Err(EvalError::Retired),
            State::Closed => return Err(EvalError::Closed),
        }

        tracing::debug!(command_bytes = command.len(), "evaluation started");
        let started = Instant::now();
        let result = self.run(command).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(r) => tracing::debug!(
                events = r.events.len(),
                failures = r.failures().count(),
                output_bytes = r.output.len(),
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "evaluation finished"
            ),
            Err(e) => tracing::warn!(error = %e, "evaluation failed"),
        }
        if let Some(audit) = &self.audit {
            audit
                .log(&AuditEntry::now(
                    command,
                    audit_result(&result),
                    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                ))
                .await;
        }
        result
    }

    async fn run(&mut self, command: &str) -> Result<EvaluationResult, EvalError> {
        let Some(mut engine) = self.engine.take() else {
            self.state = State::Retired;
            return Err(EvalError::Retired);
        };
        let _reset = ResetOnDrop(self.output.clone());
        // Stays retired unless the engine comes back, which also covers this
        // future being dropped mid-evaluation.
        self.state = State::Retired;

        let sandbox = self.sandbox.clone();
        let command = command.to_owned();
        let task = tokio::task::spawn_blocking(move || {
            let events = sandbox.run_in_sandbox(|| engine.eval(&command));
            (engine, events)
        });
        let stop = self.stop.clone();

        match self.watchdog.run_watched(task, move || stop.cancel()).await {
            Ok(Ok((engine, events))) => {
                self.engine = Some(engine);
                self.state = State::Ready;
                Ok(EvaluationResult {
                    events: events?,
                    output: self.output.drain(),
                })
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "engine panicked, retiring evaluator");
                Err(EvalError::EnginePanicked)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Diagnostics the engine recorded for `event`'s snippet. Does not
    /// change the session and may be called any number of times.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Retired`] or [`EvalError::Closed`] when the
    /// engine is gone.
    pub fn diagnostics(&self, event: &SnippetEvent) -> Result<Vec<Diagnostic>, EvalError> {
        match (&self.engine, self.state) {
            (Some(engine), State::Ready) => Ok(engine.diagnostics(event.snippet.id)),
            (_, State::Closed) => Err(EvalError::Closed),
            _ => Err(EvalError::Retired),
        }
    }

    /// Release the engine. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.close();
            tracing::debug!("evaluator closed");
        }
        self.state = State::Closed;
    }
}

impl Drop for Evaluator {
    fn drop(&mut self) {
        self.close();
    }
}

fn audit_result(result: &Result<EvaluationResult, EvalError>) -> AuditResult {
    match result {
        Ok(r) => match r.failures().count() {
            0 => AuditResult::Success,
            failures => AuditResult::Failed { failures },
        },
        Err(EvalError::Timeout(_)) => AuditResult::Timeout,
        Err(e) => AuditResult::Error {
            message: e.to_string(),
        },
    }
}
