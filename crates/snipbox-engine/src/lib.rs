//! Engine boundary for snippet evaluation and a reference interpreter.
//!
//! The containment layer in `snipbox-exec` only talks to engines through the
//! [`Engine`] and [`EngineFactory`] traits and hands them an [`AccessGate`] to
//! consult on every symbol resolution.

pub mod engine;
pub mod error;
pub mod gate;
pub mod interp;
pub mod snippet;

pub use engine::{Engine, EngineFactory, EngineHost};
pub use error::EngineError;
pub use gate::{Access, AccessDenied, AccessGate, AllowAll};
pub use interp::{Interpreter, InterpreterFactory};
pub use snippet::{
    Diagnostic, Severity, Snippet, SnippetEvent, SnippetException, SnippetId, SnippetKind,
    SnippetStatus,
};
