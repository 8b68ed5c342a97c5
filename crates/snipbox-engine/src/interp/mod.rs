//! Reference engine: a small Java-flavoured snippet interpreter.
//!
//! A command is split into top-level snippets, each of which is tokenized,
//! parsed, resolved against the session and the class library, and executed.
//! Session state (variables and imports) survives across `eval` calls.

mod ast;
mod exec;
mod lexer;
mod library;
mod parser;
mod resolve;
mod split;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use self::ast::Stmt;
use self::exec::{Flow, Machine, Value};
use self::lexer::{Span, tokenize};
use self::parser::parse_snippet;
use self::resolve::Resolver;
use self::split::split_snippets;
use crate::engine::{Engine, EngineFactory, EngineHost};
use crate::error::EngineError;
use crate::gate::AccessGate;
use crate::snippet::{
    Diagnostic, Severity, Snippet, SnippetEvent, SnippetException, SnippetId, SnippetKind,
};

/// Exception class reported for a snippet interrupted by the host.
pub const STOPPED: &str = "Stopped";

#[derive(Debug)]
struct Global {
    value: Value,
    snippet: Snippet,
}

/// Names visible to snippets across evaluations.
#[derive(Debug, Default)]
struct Session {
    globals: HashMap<String, Global>,
    /// Simple name to fully-qualified class.
    imports: HashMap<String, String>,
    wildcards: Vec<String>,
    /// Snippet being executed; owns any session variable it declares.
    current: Option<Snippet>,
    /// Declarations replaced by the current snippet.
    displaced: Vec<Snippet>,
}

impl Session {
    fn declare(&mut self, name: &str, value: Value) {
        let Some(snippet) = self.current.clone() else {
            return;
        };
        if let Some(previous) = self
            .globals
            .insert(name.to_owned(), Global { value, snippet })
        {
            self.displaced.push(previous.snippet);
        }
    }
}

pub struct Interpreter {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    gate: Arc<dyn AccessGate>,
    stop: CancellationToken,
    session: Session,
    next_id: u64,
    diagnostics: HashMap<SnippetId, Vec<Diagnostic>>,
    closed: bool,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("next_id", &self.next_id)
            .field("variables", &self.session.globals.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    #[must_use]
    pub fn new(host: EngineHost) -> Self {
        Self {
            out: host.out,
            err: host.err,
            gate: host.gate,
            stop: host.stop,
            session: Session::default(),
            next_id: 1,
            diagnostics: HashMap::new(),
            closed: false,
        }
    }

    fn next_snippet(&mut self, kind: SnippetKind, source: &str) -> Snippet {
        let id = SnippetId(self.next_id);
        self.next_id += 1;
        Snippet {
            id,
            kind,
            source: source.to_owned(),
        }
    }

    fn reject(&mut self, snippet: Snippet, span: Span, message: String) -> SnippetEvent {
        self.diagnostics.insert(
            snippet.id,
            vec![Diagnostic {
                snippet: snippet.id,
                severity: Severity::Error,
                start: span.start,
                end: span.end,
                message,
            }],
        );
        SnippetEvent::rejected(snippet)
    }

    /// Compile and run one fragment. Returns its event followed by any
    /// `Overwritten` events it caused.
    fn eval_fragment(&mut self, source: &str) -> Vec<SnippetEvent> {
        let tokens = match tokenize(source) {
            Ok(tokens) => tokens,
            Err(e) => {
                let snippet = self.next_snippet(SnippetKind::Statement, source);
                return vec![self.reject(snippet, e.span, e.message)];
            }
        };
        let mut stmt = match parse_snippet(&tokens) {
            Ok(stmt) => stmt,
            Err(e) => {
                let snippet = self.next_snippet(SnippetKind::Statement, source);
                return vec![self.reject(snippet, e.span, e.message)];
            }
        };
        let kind = match &stmt {
            Stmt::Import { .. } => SnippetKind::Import,
            Stmt::Decl { name, .. } => SnippetKind::Variable {
                name: name.name.clone(),
            },
            Stmt::Expr(_) => SnippetKind::Expression,
            _ => SnippetKind::Statement,
        };
        let snippet = self.next_snippet(kind, source);

        let findings = Resolver::new(&self.session).resolve(&mut stmt);
        let rejected = findings.iter().any(|f| f.severity == Severity::Error);
        let diagnostics: Vec<Diagnostic> = findings
            .into_iter()
            .map(|f| Diagnostic {
                snippet: snippet.id,
                severity: f.severity,
                start: f.span.start,
                end: f.span.end,
                message: f.message,
            })
            .collect();
        if !diagnostics.is_empty() {
            self.diagnostics.insert(snippet.id, diagnostics);
        }
        if rejected {
            tracing::debug!(snippet = %snippet.id, "snippet rejected");
            return vec![SnippetEvent::rejected(snippet)];
        }

        self.session.current = Some(snippet.clone());
        let result = {
            let Self {
                out,
                err,
                gate,
                stop,
                session,
                ..
            } = self;
            let mut machine = Machine::new(session, out.as_mut(), err.as_mut(), gate.as_ref(), stop);
            machine.exec(&stmt)
        };
        self.session.current = None;
        let displaced = std::mem::take(&mut self.session.displaced);

        let mut events = vec![match result {
            Ok(value) => {
                let value = match &stmt {
                    Stmt::Decl { name, .. } => self
                        .session
                        .globals
                        .get(&name.name)
                        .and_then(|g| g.value.render()),
                    Stmt::Expr(_) => value.render(),
                    _ => None,
                };
                SnippetEvent::valid(snippet.clone(), value)
            }
            Err(Flow::Throw(exception)) => SnippetEvent::failed(snippet.clone(), exception),
            Err(Flow::Stopped) => SnippetEvent::failed(
                snippet.clone(),
                SnippetException::new(STOPPED, "evaluation stopped by host"),
            ),
            Err(Flow::Break | Flow::Continue) => SnippetEvent::valid(snippet.clone(), None),
        }];
        events.extend(
            displaced
                .into_iter()
                .map(|previous| SnippetEvent::overwritten(previous, snippet.id)),
        );
        events
    }
}

impl Engine for Interpreter {
    fn eval(&mut self, source: &str) -> Vec<SnippetEvent> {
        if self.closed {
            tracing::warn!("eval on a closed interpreter");
            return Vec::new();
        }
        let mut events = Vec::new();
        for fragment in split_snippets(source) {
            if self.stop.is_cancelled() {
                break;
            }
            let produced = self.eval_fragment(fragment);
            let stopped = produced
                .first()
                .and_then(|e| e.exception.as_ref())
                .is_some_and(|e| e.class_name == STOPPED);
            events.extend(produced);
            if stopped {
                break;
            }
        }
        events
    }

    fn diagnostics(&self, snippet: SnippetId) -> Vec<Diagnostic> {
        self.diagnostics.get(&snippet).cloned().unwrap_or_default()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.out.flush();
        let _ = self.err.flush();
        self.session = Session::default();
        self.diagnostics.clear();
    }
}

/// Builds an [`Interpreter`] per host.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpreterFactory;

impl EngineFactory for InterpreterFactory {
    fn create(&self, host: EngineHost) -> Result<Box<dyn Engine>, EngineError> {
        Ok(Box::new(Interpreter::new(host)))
    }
}
