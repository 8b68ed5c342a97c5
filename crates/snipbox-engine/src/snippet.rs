use std::fmt;

/// Session-unique snippet identifier, assigned in source order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnippetId(pub u64);

impl fmt::Display for SnippetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnippetKind {
    Import,
    Variable { name: String },
    Expression,
    Statement,
}

/// One compiled/executable unit a command decomposes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub id: SnippetId,
    pub kind: SnippetKind,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetStatus {
    /// Compiled; may still carry a runtime exception.
    Valid,
    /// Failed to compile. Diagnostics explain why.
    Rejected,
    /// Replaced by a later definition of the same name.
    Overwritten,
}

impl SnippetStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Rejected => "rejected",
            Self::Overwritten => "overwritten",
        }
    }
}

/// Exception raised by untrusted code, including policy denials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetException {
    pub class_name: String,
    pub message: String,
}

impl SnippetException {
    #[must_use]
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SnippetException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.class_name)
        } else {
            write!(f, "{}: {}", self.class_name, self.message)
        }
    }
}

/// Recorded outcome of processing one snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetEvent {
    pub snippet: Snippet,
    pub status: SnippetStatus,
    /// REPL rendering of the produced value, if any.
    pub value: Option<String>,
    pub exception: Option<SnippetException>,
    /// For `Overwritten` events, the snippet that replaced this one.
    pub caused_by: Option<SnippetId>,
}

impl SnippetEvent {
    #[must_use]
    pub fn valid(snippet: Snippet, value: Option<String>) -> Self {
        Self {
            snippet,
            status: SnippetStatus::Valid,
            value,
            exception: None,
            caused_by: None,
        }
    }

    #[must_use]
    pub fn rejected(snippet: Snippet) -> Self {
        Self {
            snippet,
            status: SnippetStatus::Rejected,
            value: None,
            exception: None,
            caused_by: None,
        }
    }

    #[must_use]
    pub fn failed(snippet: Snippet, exception: SnippetException) -> Self {
        Self {
            snippet,
            status: SnippetStatus::Valid,
            value: None,
            exception: Some(exception),
            caused_by: None,
        }
    }

    #[must_use]
    pub fn overwritten(snippet: Snippet, by: SnippetId) -> Self {
        Self {
            snippet,
            status: SnippetStatus::Overwritten,
            value: None,
            exception: None,
            caused_by: Some(by),
        }
    }

    /// True when the snippet was rejected or threw.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == SnippetStatus::Rejected || self.exception.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Compile-time message tied to a snippet. Offsets are byte positions in
/// [`Snippet::source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub snippet: SnippetId,
    pub severity: Severity,
    pub start: usize,
    pub end: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level} at {}..{}: {}", self.start, self.end, self.message)
    }
}
