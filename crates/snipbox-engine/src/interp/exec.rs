//! Tree-walking executor for resolved snippets.
//!
//! Every use of a class, static member, constructor or instance method is
//! checked against the [`AccessGate`] at the moment it runs, and the stop
//! token is polled on every statement, loop iteration and call.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use super::Session;
use super::ast::{BinOp, Expr, ExprKind, Ident, Stmt, TypeName, UnOp, join_path};
use super::library::{self, OBJECT_METHODS};
use crate::gate::{Access, AccessGate};
use crate::snippet::SnippetException;

/// Longest string a snippet may build, in bytes.
pub const MAX_STRING_BYTES: usize = 1 << 20;

const SLEEP_SLICE: Duration = Duration::from_millis(10);

pub const SECURITY_EXCEPTION: &str = "java.lang.SecurityException";
const ARITHMETIC_EXCEPTION: &str = "java.lang.ArithmeticException";
const NULL_POINTER_EXCEPTION: &str = "java.lang.NullPointerException";
const INDEX_EXCEPTION: &str = "java.lang.StringIndexOutOfBoundsException";
const NUMBER_FORMAT_EXCEPTION: &str = "java.lang.NumberFormatException";
const ILLEGAL_ARGUMENT_EXCEPTION: &str = "java.lang.IllegalArgumentException";
const CLASS_CAST_EXCEPTION: &str = "java.lang.ClassCastException";
const OUT_OF_MEMORY_ERROR: &str = "java.lang.OutOfMemoryError";
const NO_SUCH_METHOD_ERROR: &str = "java.lang.NoSuchMethodError";
const NO_SUCH_FIELD_ERROR: &str = "java.lang.NoSuchFieldError";
const NO_SUCH_FILE_EXCEPTION: &str = "java.nio.file.NoSuchFileException";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Out,
    Err,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Stream(Stream),
    File(PathBuf),
    Path(PathBuf),
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Null,
    /// Result of a call with no return value.
    Void,
    Object(Object),
}

impl Value {
    /// Fully-qualified class of the value, `None` for `null` and `void`.
    pub fn class_name(&self) -> Option<&'static str> {
        match self {
            Self::Int(_) => Some("java.lang.Integer"),
            Self::Bool(_) => Some("java.lang.Boolean"),
            Self::Str(_) => Some("java.lang.String"),
            Self::Null | Self::Void => None,
            Self::Object(Object::Stream(_)) => Some("java.io.PrintStream"),
            Self::Object(Object::File(_)) => Some("java.io.File"),
            Self::Object(Object::Path(_)) => Some("java.nio.file.Path"),
            Self::Object(Object::Runtime) => Some("java.lang.Runtime"),
        }
    }

    /// What `String.valueOf` would produce.
    pub fn to_java_string(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Str(s) => s.clone(),
            Self::Null => "null".into(),
            Self::Void => String::new(),
            Self::Object(Object::Stream(Stream::Out)) => "java.io.PrintStream@out".into(),
            Self::Object(Object::Stream(Stream::Err)) => "java.io.PrintStream@err".into(),
            Self::Object(Object::File(p) | Object::Path(p)) => p.display().to_string(),
            Self::Object(Object::Runtime) => "java.lang.Runtime@runtime".into(),
        }
    }

    /// REPL rendering: strings are quoted and escaped, `void` renders as nothing.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Void => None,
            Self::Str(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for ch in s.chars() {
                    match ch {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        other => out.push(other),
                    }
                }
                out.push('"');
                Some(out)
            }
            other => Some(other.to_java_string()),
        }
    }

    fn hash_code(&self) -> i64 {
        match self {
            Self::Int(n) => *n,
            Self::Bool(true) => 1231,
            Self::Bool(false) => 1237,
            Self::Str(s) => i64::from(
                s.encode_utf16()
                    .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit))),
            ),
            _ => 0,
        }
    }
}

/// Non-local control flow out of a statement or expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Throw(SnippetException),
    Break,
    Continue,
    /// The host cancelled the stop token.
    Stopped,
}

type Exec<T> = Result<T, Flow>;

fn throw<T>(class_name: &str, message: impl Into<String>) -> Exec<T> {
    Err(Flow::Throw(SnippetException::new(class_name, message)))
}

pub struct Machine<'a> {
    session: &'a mut Session,
    out: &'a mut dyn Write,
    err: &'a mut dyn Write,
    gate: &'a dyn AccessGate,
    stop: &'a CancellationToken,
    scopes: Vec<HashMap<String, Value>>,
}

impl<'a> Machine<'a> {
    pub fn new(
        session: &'a mut Session,
        out: &'a mut dyn Write,
        err: &'a mut dyn Write,
        gate: &'a dyn AccessGate,
        stop: &'a CancellationToken,
    ) -> Self {
        Self {
            session,
            out,
            err,
            gate,
            stop,
            scopes: Vec::new(),
        }
    }

    fn tick(&self) -> Exec<()> {
        if self.stop.is_cancelled() {
            Err(Flow::Stopped)
        } else {
            Ok(())
        }
    }

    fn check(&self, access: &Access<'_>) -> Exec<()> {
        self.gate
            .check(access)
            .map_err(|denied| Flow::Throw(SnippetException::new(SECURITY_EXCEPTION, denied.message)))
    }

    fn exec_import(&mut self, path: &[Ident], wildcard: bool) -> Exec<()> {
        self.tick()?;
        let name = join_path(path);
        if wildcard {
            self.check(&Access::Package(&name))?;
            if !self.session.wildcards.contains(&name) {
                self.session.wildcards.push(name);
            }
            return Ok(());
        }
        let package = name.rsplit_once('.').map_or("", |(pkg, _)| pkg);
        self.check(&Access::Package(package))?;
        self.check(&Access::Class(&name))?;
        let simple = library::simple_name(&name).to_owned();
        self.session.imports.insert(simple, name);
        Ok(())
    }

    /// Evaluate the value a declaration binds, checking the declared type.
    fn declared_value(&mut self, ty: &TypeName, init: Option<&Expr>) -> Exec<Value> {
        if let TypeName::Class {
            resolved: Some(class),
            ..
        } = ty
        {
            self.check(&Access::Class(class))?;
        }
        let value = match init {
            Some(init) => self.eval(init)?,
            None => default_value(ty),
        };
        if value == Value::Void {
            return throw(CLASS_CAST_EXCEPTION, "'void' type not allowed here");
        }
        if !type_accepts(ty, &value) {
            let found = value.class_name().unwrap_or("null");
            return throw(
                CLASS_CAST_EXCEPTION,
                format!("incompatible types: {found} cannot be converted to {}", type_label(ty)),
            );
        }
        Ok(value)
    }

    pub fn exec(&mut self, stmt: &Stmt) -> Exec<Value> {
        self.tick()?;
        match stmt {
            Stmt::Import { path, wildcard } => {
                self.exec_import(path, *wildcard)?;
                Ok(Value::Void)
            }
            Stmt::Decl { ty, name, init } => {
                let value = self.declared_value(ty, init.as_ref())?;
                match self.scopes.last_mut() {
                    Some(scope) => {
                        scope.insert(name.name.clone(), value);
                    }
                    None => self.session.declare(&name.name, value),
                }
                Ok(Value::Void)
            }
            Stmt::Expr(expr) => self.eval(expr),
            Stmt::Block(body) => {
                self.scopes.push(HashMap::new());
                let result = body.iter().try_for_each(|stmt| self.exec(stmt).map(drop));
                self.scopes.pop();
                result.map(|()| Value::Void)
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval_bool(cond)? {
                    self.exec_nested(then)?;
                } else if let Some(otherwise) = otherwise {
                    self.exec_nested(otherwise)?;
                }
                Ok(Value::Void)
            }
            Stmt::While { cond, body } => {
                while self.eval_bool(cond)? {
                    match self.exec_nested(body) {
                        Ok(()) | Err(Flow::Continue) => {}
                        Err(Flow::Break) => break,
                        Err(other) => return Err(other),
                    }
                    self.tick()?;
                }
                Ok(Value::Void)
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                self.scopes.push(HashMap::new());
                let result = self.exec_for(init.as_deref(), cond.as_ref(), update.as_ref(), body);
                self.scopes.pop();
                result.map(|()| Value::Void)
            }
            Stmt::Break(_) => Err(Flow::Break),
            Stmt::Continue(_) => Err(Flow::Continue),
            Stmt::Empty => Ok(Value::Void),
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
    ) -> Exec<()> {
        if let Some(init) = init {
            self.exec(init)?;
        }
        loop {
            if let Some(cond) = cond
                && !self.eval_bool(cond)?
            {
                return Ok(());
            }
            match self.exec_nested(body) {
                Ok(()) | Err(Flow::Continue) => {}
                Err(Flow::Break) => return Ok(()),
                Err(other) => return Err(other),
            }
            if let Some(update) = update {
                self.eval(update)?;
            }
            self.tick()?;
        }
    }

    fn exec_nested(&mut self, stmt: &Stmt) -> Exec<()> {
        self.scopes.push(HashMap::new());
        let result = self.exec(stmt);
        self.scopes.pop();
        result.map(drop)
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.session.globals.get(name).map(|g| &g.value))
    }

    fn assign(&mut self, name: &str, value: Value) {
        if let Some(slot) = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
        {
            *slot = value;
        } else if let Some(global) = self.session.globals.get_mut(name) {
            global.value = value;
        }
    }

    fn eval_bool(&mut self, expr: &Expr) -> Exec<bool> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => throw(
                CLASS_CAST_EXCEPTION,
                format!(
                    "incompatible types: {} cannot be converted to boolean",
                    other.class_name().unwrap_or("null")
                ),
            ),
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Var(name) => Ok(self.lookup(name).cloned().unwrap_or(Value::Null)),
            ExprKind::Name(path) => {
                // Unresolved chains never reach execution; treat as a missing symbol.
                throw(NO_SUCH_FIELD_ERROR, join_path(path))
            }
            ExprKind::StaticField { class, field } => self.static_field(class, &field.name),
            ExprKind::Field { target, field } => {
                let target = self.eval(target)?;
                if target == Value::Null {
                    return throw(NULL_POINTER_EXCEPTION, "");
                }
                throw(NO_SUCH_FIELD_ERROR, field.name.clone())
            }
            ExprKind::Call {
                target,
                method,
                args,
            } => {
                self.tick()?;
                let Some(target) = target else {
                    return throw(NO_SUCH_METHOD_ERROR, method.name.clone());
                };
                let target = self.eval(target)?;
                let args = self.eval_args(args)?;
                self.call_instance(target, &method.name, args)
            }
            ExprKind::StaticCall {
                class,
                method,
                args,
            } => {
                self.tick()?;
                self.check(&Access::Class(class))?;
                self.check(&Access::Method {
                    class,
                    method: &method.name,
                })?;
                let args = self.eval_args(args)?;
                self.call_static(class, &method.name, args)
            }
            ExprKind::New { class, .. } => throw(NO_SUCH_METHOD_ERROR, join_path(class)),
            ExprKind::Construct { class, args } => {
                self.tick()?;
                self.check(&Access::Class(class))?;
                self.check(&Access::Method {
                    class,
                    method: "<init>",
                })?;
                let args = self.eval_args(args)?;
                construct(class, args)
            }
            ExprKind::Unary { op, operand } => match (op, self.eval(operand)?) {
                (UnOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
                (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (op, value) => {
                    let symbol = if *op == UnOp::Neg { "-" } else { "!" };
                    throw(
                        CLASS_CAST_EXCEPTION,
                        format!(
                            "bad operand type {} for unary operator '{symbol}'",
                            value.class_name().unwrap_or("null")
                        ),
                    )
                }
            },
            ExprKind::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } => Ok(Value::Bool(self.eval_bool(lhs)? && self.eval_bool(rhs)?)),
            ExprKind::Binary {
                op: BinOp::Or,
                lhs,
                rhs,
            } => Ok(Value::Bool(self.eval_bool(lhs)? || self.eval_bool(rhs)?)),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, lhs, rhs)
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if self.eval_bool(cond)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            ExprKind::Assign { target, op, value } => {
                let value = self.eval(value)?;
                let value = match op {
                    Some(op) => {
                        let current = self.lookup(&target.name).cloned().unwrap_or(Value::Null);
                        binary(*op, current, value)?
                    }
                    None => value,
                };
                self.assign(&target.name, value.clone());
                Ok(value)
            }
            ExprKind::PostIncrement { target, delta } => {
                match self.lookup(&target.name).cloned() {
                    Some(Value::Int(n)) => {
                        self.assign(&target.name, Value::Int(n.wrapping_add(*delta)));
                        Ok(Value::Int(n))
                    }
                    _ => throw(
                        CLASS_CAST_EXCEPTION,
                        format!("bad operand type for {}", target.name),
                    ),
                }
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Exec<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn static_field(&self, class: &str, field: &str) -> Exec<Value> {
        self.check(&Access::Class(class))?;
        match (class, field) {
            ("java.lang.System", "out") => Ok(Value::Object(Object::Stream(Stream::Out))),
            ("java.lang.System", "err") => Ok(Value::Object(Object::Stream(Stream::Err))),
            ("java.lang.Integer", "MAX_VALUE") => Ok(Value::Int(i64::from(i32::MAX))),
            ("java.lang.Integer", "MIN_VALUE") => Ok(Value::Int(i64::from(i32::MIN))),
            _ => throw(NO_SUCH_FIELD_ERROR, format!("{class}.{field}")),
        }
    }

    fn call_static(&mut self, class: &str, method: &str, args: Vec<Value>) -> Exec<Value> {
        let simple = library::simple_name(class);
        match (simple, method, args.as_slice()) {
            ("System", "currentTimeMillis", []) => {
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
                Ok(Value::Int(millis))
            }
            ("System", "nanoTime", []) => {
                let nanos = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX));
                Ok(Value::Int(nanos))
            }
            ("System", "exit", [_]) => throw(SECURITY_EXCEPTION, "System.exit is not permitted"),
            ("System", "getProperty", [key]) => Ok(system_property(&str_arg(key)?)),
            ("System", "getenv", [_]) => Ok(Value::Null),
            ("System", "lineSeparator", []) => Ok(Value::Str("\n".into())),
            ("Math", "abs", [a]) => Ok(Value::Int(int_arg(a)?.wrapping_abs())),
            ("Math", "max", [a, b]) => Ok(Value::Int(int_arg(a)?.max(int_arg(b)?))),
            ("Math", "min", [a, b]) => Ok(Value::Int(int_arg(a)?.min(int_arg(b)?))),
            ("Math", "floorMod", [a, b]) => {
                let (a, b) = (int_arg(a)?, int_arg(b)?);
                if b == 0 {
                    return throw(ARITHMETIC_EXCEPTION, "/ by zero");
                }
                let r = a.wrapping_rem(b);
                Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
            }
            ("String", "valueOf", [value]) => Ok(Value::Str(value.to_java_string())),
            ("Integer", "parseInt", [s]) => {
                let s = str_arg(s)?;
                s.parse::<i32>().map(|n| Value::Int(i64::from(n))).or_else(|_| {
                    throw(NUMBER_FORMAT_EXCEPTION, format!("For input string: \"{s}\""))
                })
            }
            ("Integer", "toString", [n]) => Ok(Value::Str(int_arg(n)?.to_string())),
            ("Boolean", "parseBoolean", [s]) => Ok(Value::Bool(match s {
                Value::Str(s) => s.eq_ignore_ascii_case("true"),
                _ => false,
            })),
            ("Thread", "sleep", [ms]) => {
                let ms = int_arg(ms)?;
                let Ok(ms) = u64::try_from(ms) else {
                    return throw(ILLEGAL_ARGUMENT_EXCEPTION, "timeout value is negative");
                };
                self.sleep(Duration::from_millis(ms))?;
                Ok(Value::Void)
            }
            ("Runtime", "getRuntime", []) => Ok(Value::Object(Object::Runtime)),
            ("Files", "exists", [path]) => Ok(Value::Bool(path_arg(path)?.exists())),
            ("Files", "readString", [path]) => read_string(&path_arg(path)?),
            ("Path", "of", [first, rest @ ..]) => {
                let mut path = PathBuf::from(str_arg(first)?);
                for part in rest {
                    path.push(str_arg(part)?);
                }
                Ok(Value::Object(Object::Path(path)))
            }
            _ => throw(
                ILLEGAL_ARGUMENT_EXCEPTION,
                format!(
                    "method {method} in class {simple} cannot be applied to {} argument(s)",
                    args.len()
                ),
            ),
        }
    }

    fn call_instance(&mut self, target: Value, method: &str, args: Vec<Value>) -> Exec<Value> {
        let Some(class) = target.class_name() else {
            return throw(
                NULL_POINTER_EXCEPTION,
                format!("Cannot invoke \"{method}()\" because value is null"),
            );
        };
        self.check(&Access::Method { class, method })?;

        if OBJECT_METHODS.contains(&method) {
            return match (method, args.as_slice()) {
                ("toString", []) => Ok(Value::Str(target.to_java_string())),
                ("equals", [other]) => Ok(Value::Bool(target == *other)),
                ("hashCode", []) => Ok(Value::Int(target.hash_code())),
                _ => throw(ILLEGAL_ARGUMENT_EXCEPTION, format!("bad arguments to {method}")),
            };
        }

        let known = library::class(class).is_some_and(|def| def.instance_methods.contains(&method));
        if !known {
            let simple = library::simple_name(class);
            return throw(NO_SUCH_METHOD_ERROR, format!("{simple}.{method}"));
        }

        match (target, method, args.as_slice()) {
            (Value::Object(Object::Stream(stream)), "println" | "print", args) => {
                let mut text = match args {
                    [] => String::new(),
                    [value] => value.to_java_string(),
                    _ => return throw(ILLEGAL_ARGUMENT_EXCEPTION, "too many arguments"),
                };
                if method == "println" {
                    text.push('\n');
                }
                let sink: &mut dyn Write = match stream {
                    Stream::Out => &mut *self.out,
                    Stream::Err => &mut *self.err,
                };
                // A failing sink must not take the snippet down with it.
                let _ = sink.write_all(text.as_bytes());
                let _ = sink.flush();
                Ok(Value::Void)
            }
            (Value::Str(s), method, args) => string_method(&s, method, args),
            (Value::Object(Object::Runtime), "availableProcessors", []) => {
                let n = std::thread::available_parallelism().map_or(1, std::num::NonZero::get);
                Ok(Value::Int(i64::try_from(n).unwrap_or(1)))
            }
            (Value::Object(Object::Runtime), "exec", [_]) => {
                throw(SECURITY_EXCEPTION, "Runtime.exec is not permitted")
            }
            (Value::Object(Object::File(path)), "exists", []) => Ok(Value::Bool(path.exists())),
            (Value::Object(Object::File(path)), "getName", []) => Ok(Value::Str(file_name(&path))),
            (Value::Object(Object::File(path)), "getPath", []) => {
                Ok(Value::Str(path.display().to_string()))
            }
            (Value::Object(Object::Path(path)), "getFileName", []) => Ok(path
                .file_name()
                .map_or(Value::Null, |name| {
                    Value::Object(Object::Path(PathBuf::from(name)))
                })),
            (_, method, args) => throw(
                ILLEGAL_ARGUMENT_EXCEPTION,
                format!("method {method} cannot be applied to {} argument(s)", args.len()),
            ),
        }
    }

    fn sleep(&self, duration: Duration) -> Exec<()> {
        let deadline = Instant::now().checked_add(duration);
        loop {
            self.tick()?;
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => SLEEP_SLICE,
            };
            if remaining.is_zero() {
                return Ok(());
            }
            std::thread::sleep(SLEEP_SLICE.min(remaining));
        }
    }
}

fn construct(class: &str, args: Vec<Value>) -> Exec<Value> {
    match (class, args.as_slice()) {
        ("java.io.File", [path]) => Ok(Value::Object(Object::File(PathBuf::from(str_arg(path)?)))),
        _ => throw(
            ILLEGAL_ARGUMENT_EXCEPTION,
            format!(
                "constructor {} cannot be applied to {} argument(s)",
                library::simple_name(class),
                args.len()
            ),
        ),
    }
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> Exec<Value> {
    match (op, lhs, rhs) {
        (BinOp::Add, Value::Str(a), b) => concat(a, &b.to_java_string()),
        (BinOp::Add, a, Value::Str(b)) if a != Value::Void => concat(a.to_java_string(), &b),
        (BinOp::Add, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(b))),
        (BinOp::Sub, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(b))),
        (BinOp::Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(b))),
        (BinOp::Div | BinOp::Rem, Value::Int(_), Value::Int(0)) => {
            throw(ARITHMETIC_EXCEPTION, "/ by zero")
        }
        (BinOp::Div, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_div(b))),
        (BinOp::Rem, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem(b))),
        (BinOp::Eq, a, b) => Ok(Value::Bool(a == b)),
        (BinOp::Ne, a, b) => Ok(Value::Bool(a != b)),
        (BinOp::Lt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
        (BinOp::Le, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
        (BinOp::Gt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
        (BinOp::Ge, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
        (BinOp::And, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a && b)),
        (BinOp::Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a || b)),
        (op, a, b) => throw(
            CLASS_CAST_EXCEPTION,
            format!(
                "bad operand types for binary operator '{}': {} and {}",
                op.symbol(),
                a.class_name().unwrap_or("null"),
                b.class_name().unwrap_or("null")
            ),
        ),
    }
}

fn concat(mut a: String, b: &str) -> Exec<Value> {
    if a.len() + b.len() > MAX_STRING_BYTES {
        return throw(OUT_OF_MEMORY_ERROR, "Java heap space");
    }
    a.push_str(b);
    Ok(Value::Str(a))
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Exec<Value> {
    let char_len = s.chars().count();
    match (method, args) {
        ("length", []) => Ok(Value::Int(to_i64(char_len))),
        ("isEmpty", []) => Ok(Value::Bool(s.is_empty())),
        ("toUpperCase", []) => Ok(Value::Str(s.to_uppercase())),
        ("toLowerCase", []) => Ok(Value::Str(s.to_lowercase())),
        ("trim", []) => Ok(Value::Str(s.trim().to_owned())),
        ("contains", [needle]) => Ok(Value::Bool(s.contains(str_arg(needle)?.as_str()))),
        ("startsWith", [prefix]) => Ok(Value::Bool(s.starts_with(str_arg(prefix)?.as_str()))),
        ("endsWith", [suffix]) => Ok(Value::Bool(s.ends_with(str_arg(suffix)?.as_str()))),
        ("indexOf", [needle]) => {
            let needle = str_arg(needle)?;
            Ok(Value::Int(
                s.find(needle.as_str())
                    .map_or(-1, |byte| to_i64(s[..byte].chars().count())),
            ))
        }
        ("charAt", [index]) => {
            let index = int_arg(index)?;
            usize::try_from(index)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|ch| Value::Str(ch.to_string()))
                .map_or_else(
                    || {
                        throw(
                            INDEX_EXCEPTION,
                            format!("Index {index} out of bounds for length {char_len}"),
                        )
                    },
                    Ok,
                )
        }
        ("substring", [begin]) => substring(s, int_arg(begin)?, to_i64(char_len)),
        ("substring", [begin, end]) => substring(s, int_arg(begin)?, int_arg(end)?),
        ("repeat", [count]) => {
            let count = int_arg(count)?;
            let Ok(times) = usize::try_from(count) else {
                return throw(
                    ILLEGAL_ARGUMENT_EXCEPTION,
                    format!("count is negative: {count}"),
                );
            };
            if s.len().saturating_mul(times) > MAX_STRING_BYTES {
                return throw(OUT_OF_MEMORY_ERROR, "Java heap space");
            }
            Ok(Value::Str(s.repeat(times)))
        }
        _ => throw(
            ILLEGAL_ARGUMENT_EXCEPTION,
            format!("method {method} cannot be applied to {} argument(s)", args.len()),
        ),
    }
}

fn substring(s: &str, begin: i64, end: i64) -> Exec<Value> {
    let len = to_i64(s.chars().count());
    if begin < 0 || end > len || begin > end {
        return throw(
            INDEX_EXCEPTION,
            format!("begin {begin}, end {end}, length {len}"),
        );
    }
    let (Ok(begin), Ok(end)) = (usize::try_from(begin), usize::try_from(end)) else {
        return throw(INDEX_EXCEPTION, format!("begin {begin}, end {end}, length {len}"));
    };
    Ok(Value::Str(s.chars().skip(begin).take(end - begin).collect()))
}

fn read_string(path: &Path) -> Exec<Value> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_STRING_BYTES as u64 => {
            return throw(OUT_OF_MEMORY_ERROR, "Java heap space");
        }
        Ok(_) => {}
        Err(_) => return throw(NO_SUCH_FILE_EXCEPTION, path.display().to_string()),
    }
    std::fs::read_to_string(path)
        .map(Value::Str)
        .or_else(|e| throw("java.io.IOException", e.to_string()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn system_property(key: &str) -> Value {
    match key {
        "java.version" => Value::Str("17".into()),
        "line.separator" => Value::Str("\n".into()),
        "os.name" => Value::Str(std::env::consts::OS.into()),
        _ => Value::Null,
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn int_arg(value: &Value) -> Exec<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        other => throw(
            CLASS_CAST_EXCEPTION,
            format!(
                "incompatible types: {} cannot be converted to int",
                other.class_name().unwrap_or("null")
            ),
        ),
    }
}

fn str_arg(value: &Value) -> Exec<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        Value::Null => throw(NULL_POINTER_EXCEPTION, ""),
        other => throw(
            CLASS_CAST_EXCEPTION,
            format!(
                "incompatible types: {} cannot be converted to java.lang.String",
                other.class_name().unwrap_or("null")
            ),
        ),
    }
}

fn path_arg(value: &Value) -> Exec<PathBuf> {
    match value {
        Value::Object(Object::Path(path)) => Ok(path.clone()),
        Value::Null => throw(NULL_POINTER_EXCEPTION, ""),
        other => throw(
            CLASS_CAST_EXCEPTION,
            format!(
                "incompatible types: {} cannot be converted to java.nio.file.Path",
                other.class_name().unwrap_or("null")
            ),
        ),
    }
}

fn default_value(ty: &TypeName) -> Value {
    match ty {
        TypeName::Primitive(p) if p == "boolean" => Value::Bool(false),
        TypeName::Primitive(p) if p == "char" => Value::Str("\0".into()),
        TypeName::Primitive(_) => Value::Int(0),
        TypeName::Var | TypeName::Class { .. } => Value::Null,
    }
}

fn type_accepts(ty: &TypeName, value: &Value) -> bool {
    match (ty, value) {
        (TypeName::Var, _) => true,
        (TypeName::Primitive(p), Value::Int(_)) => p != "boolean" && p != "char",
        (TypeName::Primitive(p), Value::Bool(_)) => p == "boolean",
        (TypeName::Primitive(p), Value::Str(s)) => p == "char" && s.chars().count() == 1,
        (TypeName::Primitive(_), _) => false,
        (TypeName::Class { .. }, Value::Null) => true,
        (TypeName::Class { resolved, .. }, value) => {
            resolved.as_deref() == Some("java.lang.Object")
                || resolved.as_deref() == value.class_name()
        }
    }
}

fn type_label(ty: &TypeName) -> String {
    match ty {
        TypeName::Var => "var".into(),
        TypeName::Primitive(p) => p.clone(),
        TypeName::Class { resolved, path } => resolved.clone().unwrap_or_else(|| join_path(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_quotes_strings() {
        assert_eq!(Value::Str("a\"b\n".into()).render().as_deref(), Some("\"a\\\"b\\n\""));
        assert_eq!(Value::Int(-3).render().as_deref(), Some("-3"));
        assert_eq!(Value::Null.render().as_deref(), Some("null"));
        assert_eq!(Value::Void.render(), None);
    }

    #[test]
    fn arithmetic_wraps_and_divides() {
        assert_eq!(
            binary(BinOp::Add, Value::Int(i64::MAX), Value::Int(1)),
            Ok(Value::Int(i64::MIN))
        );
        assert_eq!(binary(BinOp::Div, Value::Int(7), Value::Int(2)), Ok(Value::Int(3)));
        assert_eq!(binary(BinOp::Rem, Value::Int(-7), Value::Int(2)), Ok(Value::Int(-1)));
        let Err(Flow::Throw(e)) = binary(BinOp::Div, Value::Int(1), Value::Int(0)) else {
            panic!("expected ArithmeticException");
        };
        assert_eq!(e.class_name, ARITHMETIC_EXCEPTION);
        assert_eq!(e.message, "/ by zero");
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            binary(BinOp::Add, Value::Str("n=".into()), Value::Int(4)),
            Ok(Value::Str("n=4".into()))
        );
        assert_eq!(
            binary(BinOp::Add, Value::Null, Value::Str("!".into())),
            Ok(Value::Str("null!".into()))
        );
    }

    #[test]
    fn concat_is_capped() {
        let big = "x".repeat(MAX_STRING_BYTES);
        let Err(Flow::Throw(e)) = concat(big, "y") else {
            panic!("expected OutOfMemoryError");
        };
        assert_eq!(e.class_name, OUT_OF_MEMORY_ERROR);
    }

    #[test]
    fn string_methods() {
        assert_eq!(string_method("héllo", "length", &[]), Ok(Value::Int(5)));
        assert_eq!(
            string_method("héllo", "substring", &[Value::Int(1), Value::Int(3)]),
            Ok(Value::Str("él".into()))
        );
        assert_eq!(
            string_method("abc", "indexOf", &[Value::Str("c".into())]),
            Ok(Value::Int(2))
        );
        assert_eq!(
            string_method("ab", "repeat", &[Value::Int(3)]),
            Ok(Value::Str("ababab".into()))
        );
        let Err(Flow::Throw(e)) = string_method("abc", "charAt", &[Value::Int(5)]) else {
            panic!("expected index exception");
        };
        assert_eq!(e.message, "Index 5 out of bounds for length 3");
        let Err(Flow::Throw(e)) = string_method("abc", "substring", &[Value::Int(2), Value::Int(1)])
        else {
            panic!("expected index exception");
        };
        assert_eq!(e.message, "begin 2, end 1, length 3");
    }

    #[test]
    fn string_hash_matches_jvm() {
        assert_eq!(Value::Str("hello".into()).hash_code(), 99_162_322);
        assert_eq!(Value::Str(String::new()).hash_code(), 0);
    }

    #[test]
    fn declared_types() {
        assert!(type_accepts(&TypeName::Primitive("int".into()), &Value::Int(1)));
        assert!(!type_accepts(&TypeName::Primitive("int".into()), &Value::Str("1".into())));
        let string = TypeName::Class {
            path: Vec::new(),
            resolved: Some("java.lang.String".into()),
        };
        assert!(type_accepts(&string, &Value::Str("s".into())));
        assert!(type_accepts(&string, &Value::Null));
        assert!(!type_accepts(&string, &Value::Int(1)));
    }
}
