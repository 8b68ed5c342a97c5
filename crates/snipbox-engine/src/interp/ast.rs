use super::lexer::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Str(String),
    Bool(bool),
    Null,
    /// Dotted identifier chain not yet resolved into variables, classes and fields.
    Name(Vec<Ident>),
    /// Resolved local or session variable.
    Var(String),
    /// Static field of a resolved class.
    StaticField { class: String, field: Ident },
    /// Field access on a runtime value.
    Field { target: Box<Expr>, field: Ident },
    /// Method call. `target` is `None` for a bare `name(...)` call.
    Call {
        target: Option<Box<Expr>>,
        method: Ident,
        args: Vec<Expr>,
    },
    /// Static method call on a resolved class.
    StaticCall {
        class: String,
        method: Ident,
        args: Vec<Expr>,
    },
    New {
        class: Vec<Ident>,
        args: Vec<Expr>,
    },
    /// Constructor call on a resolved class.
    Construct { class: String, args: Vec<Expr> },
    Unary { op: UnOp, operand: Box<Expr> },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `name = value` or compound `name op= value`.
    Assign {
        target: Ident,
        op: Option<BinOp>,
        value: Box<Expr>,
    },
    /// Postfix `name++` / `name--`; yields the previous value.
    PostIncrement { target: Ident, delta: i64 },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Declared type of a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeName {
    Var,
    Primitive(String),
    /// Class type, resolved to a fully-qualified name by the resolver.
    Class { path: Vec<Ident>, resolved: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Import {
        path: Vec<Ident>,
        wildcard: bool,
    },
    Decl {
        ty: TypeName,
        name: Ident,
        init: Option<Expr>,
    },
    Expr(Expr),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    Break(Span),
    Continue(Span),
    Empty,
}

pub fn join_path(path: &[Ident]) -> String {
    path.iter()
        .map(|i| i.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

pub fn path_span(path: &[Ident]) -> Span {
    match (path.first(), path.last()) {
        (Some(first), Some(last)) => first.span.to(last.span),
        _ => Span::default(),
    }
}
