//! Compile-time name resolution: turns identifier chains into variables,
//! classes and static members, and reports unknown symbols.
//!
//! Resolution only checks that symbols exist. Whether untrusted code may use
//! them is decided at execution time through the access gate.

use std::collections::HashSet;

use super::Session;
use super::ast::{Expr, ExprKind, Ident, Stmt, TypeName, join_path, path_span};
use super::lexer::Span;
use super::library::{self, AUTO_IMPORTED_PACKAGE};
use crate::snippet::Severity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub span: Span,
    pub message: String,
}

pub struct Resolver<'s> {
    session: &'s Session,
    scopes: Vec<HashSet<String>>,
    loop_depth: usize,
    findings: Vec<Finding>,
}

impl<'s> Resolver<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            scopes: Vec::new(),
            loop_depth: 0,
            findings: Vec::new(),
        }
    }

    /// Resolve a top-level statement in place and return what was found.
    pub fn resolve(mut self, stmt: &mut Stmt) -> Vec<Finding> {
        match stmt {
            Stmt::Import { path, wildcard } => self.resolve_import(path, *wildcard),
            _ => self.resolve_stmt(stmt),
        }
        self.findings
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.findings.push(Finding {
            severity: Severity::Error,
            span,
            message: message.into(),
        });
    }

    fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.findings.push(Finding {
            severity: Severity::Warning,
            span,
            message: message.into(),
        });
    }

    fn is_var(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name)) || self.session.globals.contains_key(name)
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_owned());
        }
    }

    fn resolve_import(&mut self, path: &[Ident], wildcard: bool) {
        let name = join_path(path);
        let span = path_span(path);
        if wildcard {
            if !library::has_package(&name) {
                self.error(span, format!("package {name} does not exist"));
            }
            return;
        }
        if library::class(&name).is_none() {
            let package = name.rsplit_once('.').map_or("", |(pkg, _)| pkg);
            if library::has_package(package) {
                let simple = library::simple_name(&name);
                self.error(
                    span,
                    format!("cannot find symbol: class {simple} in package {package}"),
                );
            } else {
                self.error(span, format!("package {package} does not exist"));
            }
            return;
        }
        let simple = library::simple_name(&name);
        if self.session.imports.get(simple) == Some(&name) {
            self.warning(span, format!("duplicate import: {name}"));
        }
    }

    /// Map a simple class name to its fully-qualified name.
    fn lookup_simple_class(&self, simple: &str) -> Option<String> {
        if let Some(fqcn) = self.session.imports.get(simple) {
            return Some(fqcn.clone());
        }
        self.session
            .wildcards
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(AUTO_IMPORTED_PACKAGE))
            .map(|pkg| format!("{pkg}.{simple}"))
            .find(|fqcn| library::class(fqcn).is_some())
    }

    /// Longest prefix of `path` naming a class, with the number of segments used.
    fn class_prefix(&self, path: &[Ident]) -> Option<(String, usize)> {
        let first = path.first()?;
        if let Some(fqcn) = self.lookup_simple_class(&first.name) {
            return Some((fqcn, 1));
        }
        (2..=path.len()).rev().find_map(|k| {
            let name = join_path(&path[..k]);
            library::class(&name).map(|_| (name, k))
        })
    }

    fn resolve_type(&mut self, ty: &mut TypeName) {
        if let TypeName::Class { path, resolved } = ty {
            match self.class_prefix(path) {
                Some((fqcn, used)) if used == path.len() => *resolved = Some(fqcn),
                _ => {
                    let span = path_span(path);
                    let name = join_path(path);
                    self.error(span, format!("cannot find symbol: class {name}"));
                }
            }
        }
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Import { .. } => {}
            Stmt::Decl { ty, name, init } => {
                self.resolve_type(ty);
                if let Some(init) = init {
                    self.resolve_expr(init);
                }
                if self.scopes.iter().any(|s| s.contains(&name.name)) {
                    let message = format!("variable {} is already defined", name.name);
                    self.error(name.span, message);
                }
                self.declare(&name.name);
            }
            Stmt::Expr(expr) => self.resolve_expr(expr),
            Stmt::Block(body) => {
                self.scopes.push(HashSet::new());
                for stmt in body {
                    self.resolve_stmt(stmt);
                }
                self.scopes.pop();
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                self.resolve_expr(cond);
                self.resolve_nested(then);
                if let Some(otherwise) = otherwise {
                    self.resolve_nested(otherwise);
                }
            }
            Stmt::While { cond, body } => {
                self.resolve_expr(cond);
                self.loop_depth += 1;
                self.resolve_nested(body);
                self.loop_depth -= 1;
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                self.scopes.push(HashSet::new());
                if let Some(init) = init {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = cond {
                    self.resolve_expr(cond);
                }
                if let Some(update) = update {
                    self.resolve_expr(update);
                }
                self.loop_depth += 1;
                self.resolve_nested(body);
                self.loop_depth -= 1;
                self.scopes.pop();
            }
            Stmt::Break(span) => {
                if self.loop_depth == 0 {
                    self.error(*span, "break outside switch or loop");
                }
            }
            Stmt::Continue(span) => {
                if self.loop_depth == 0 {
                    self.error(*span, "continue outside of loop");
                }
            }
            Stmt::Empty => {}
        }
    }

    /// Bodies of `if`/`while`/`for` get their own scope even without braces.
    fn resolve_nested(&mut self, stmt: &mut Stmt) {
        self.scopes.push(HashSet::new());
        self.resolve_stmt(stmt);
        self.scopes.pop();
    }

    fn resolve_expr(&mut self, expr: &mut Expr) {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Int(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Var(_)
            | ExprKind::StaticField { .. }
            | ExprKind::StaticCall { .. }
            | ExprKind::Construct { .. } => {}
            ExprKind::Name(path) => {
                let path = std::mem::take(path);
                expr.kind = self.resolve_name(path, span).unwrap_or(ExprKind::Null);
            }
            ExprKind::Field { target, .. } => self.resolve_expr(target),
            ExprKind::Call {
                target: None,
                method,
                ..
            } => {
                let message = format!("cannot find symbol: method {}", method.name);
                self.error(method.span, message);
            }
            ExprKind::Call {
                target: Some(target),
                method,
                args,
            } => {
                for arg in args.iter_mut() {
                    self.resolve_expr(arg);
                }
                if let Some(class) = self.static_target(target) {
                    let def = library::class(&class);
                    if def.is_some_and(|d| d.has_static_method(&method.name)) {
                        let call = ExprKind::StaticCall {
                            class,
                            method: method.clone(),
                            args: std::mem::take(args),
                        };
                        expr.kind = call;
                    } else {
                        let simple = library::simple_name(&class);
                        let message =
                            format!("cannot find symbol: method {} in class {simple}", method.name);
                        self.error(method.span, message);
                    }
                } else {
                    self.resolve_expr(target);
                }
            }
            ExprKind::New { class, args } => {
                for arg in args.iter_mut() {
                    self.resolve_expr(arg);
                }
                match self.class_prefix(class) {
                    Some((fqcn, used)) if used == class.len() => {
                        if library::class(&fqcn).is_some_and(|d| d.constructible) {
                            let construct = ExprKind::Construct {
                                class: fqcn,
                                args: std::mem::take(args),
                            };
                            expr.kind = construct;
                        } else {
                            let simple = library::simple_name(&fqcn).to_owned();
                            self.error(
                                path_span(class),
                                format!("{simple} has no accessible constructor"),
                            );
                        }
                    }
                    _ => {
                        let name = join_path(class);
                        self.error(path_span(class), format!("cannot find symbol: class {name}"));
                    }
                }
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.resolve_expr(cond);
                self.resolve_expr(then);
                self.resolve_expr(otherwise);
            }
            ExprKind::Assign { target, value, .. } => {
                if !self.is_var(&target.name) {
                    let message = format!("cannot find symbol: variable {}", target.name);
                    self.error(target.span, message);
                }
                self.resolve_expr(value);
            }
            ExprKind::PostIncrement { target, .. } => {
                if !self.is_var(&target.name) {
                    let message = format!("cannot find symbol: variable {}", target.name);
                    self.error(target.span, message);
                }
            }
        }
    }

    /// If `target` names a class (and not a variable), the class name.
    fn static_target(&self, target: &Expr) -> Option<String> {
        let ExprKind::Name(path) = &target.kind else {
            return None;
        };
        if self.is_var(&path.first()?.name) {
            return None;
        }
        match self.class_prefix(path) {
            Some((fqcn, used)) if used == path.len() => Some(fqcn),
            _ => None,
        }
    }

    fn resolve_name(&mut self, mut path: Vec<Ident>, span: Span) -> Option<ExprKind> {
        let first = path.first()?.clone();
        let (mut kind, used) = if self.is_var(&first.name) {
            (ExprKind::Var(first.name.clone()), 1)
        } else if let Some((class, used)) = self.class_prefix(&path) {
            let Some(field) = path.get(used).cloned() else {
                let simple = library::simple_name(&class).to_owned();
                self.error(span, format!("cannot find symbol: variable {simple}"));
                return None;
            };
            if !library::class(&class).is_some_and(|d| d.has_static_field(&field.name)) {
                let simple = library::simple_name(&class).to_owned();
                let message = format!("cannot find symbol: variable {} in class {simple}", field.name);
                self.error(field.span, message);
                return None;
            }
            (ExprKind::StaticField { class, field }, used + 1)
        } else {
            self.error(
                first.span,
                format!("cannot find symbol: variable {}", first.name),
            );
            return None;
        };

        let mut kind_span = path_span(&path[..used]);
        for field in path.drain(used..) {
            let field_span = kind_span.to(field.span);
            kind = ExprKind::Field {
                target: Box::new(Expr::new(kind, kind_span)),
                field,
            };
            kind_span = field_span;
        }
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::super::parser::parse_snippet;
    use super::*;

    fn resolve(session: &Session, source: &str) -> (Stmt, Vec<Finding>) {
        let mut stmt = parse_snippet(&tokenize(source).unwrap()).unwrap();
        let findings = Resolver::new(session).resolve(&mut stmt);
        (stmt, findings)
    }

    fn errors(session: &Session, source: &str) -> Vec<String> {
        resolve(session, source)
            .1
            .into_iter()
            .filter(|f| f.severity == Severity::Error)
            .map(|f| f.message)
            .collect()
    }

    #[test]
    fn auto_imported_static_call() {
        let (stmt, findings) = resolve(&Session::default(), "Math.max(1, 2)");
        assert!(findings.is_empty());
        let Stmt::Expr(expr) = stmt else {
            panic!("expected expression");
        };
        assert!(matches!(
            expr.kind,
            ExprKind::StaticCall { ref class, .. } if class == "java.lang.Math"
        ));
    }

    #[test]
    fn static_field_then_instance_call() {
        let (stmt, findings) = resolve(&Session::default(), "System.out.println(1)");
        assert!(findings.is_empty());
        let Stmt::Expr(Expr {
            kind: ExprKind::Call {
                target: Some(target),
                ..
            },
            ..
        }) = stmt
        else {
            panic!("expected instance call");
        };
        assert!(matches!(
            target.kind,
            ExprKind::StaticField { ref class, ref field } if class == "java.lang.System" && field.name == "out"
        ));
    }

    #[test]
    fn fully_qualified_constructor() {
        let (stmt, findings) = resolve(&Session::default(), "new java.io.File(\"x\")");
        assert!(findings.is_empty());
        let Stmt::Expr(expr) = stmt else {
            panic!("expected expression");
        };
        assert!(matches!(
            expr.kind,
            ExprKind::Construct { ref class, .. } if class == "java.io.File"
        ));
    }

    #[test]
    fn simple_name_needs_import() {
        assert_eq!(
            errors(&Session::default(), "new File(\"x\")"),
            vec!["cannot find symbol: class File"]
        );
        let mut session = Session::default();
        session
            .imports
            .insert("File".into(), "java.io.File".into());
        assert!(errors(&session, "new File(\"x\")").is_empty());
    }

    #[test]
    fn wildcard_import_resolves() {
        let mut session = Session::default();
        session.wildcards.push("java.nio.file".into());
        assert!(errors(&session, "Files.exists(Path.of(\"x\"))").is_empty());
    }

    #[test]
    fn unknown_symbols() {
        let session = Session::default();
        assert_eq!(
            errors(&session, "foo + 1"),
            vec!["cannot find symbol: variable foo"]
        );
        assert_eq!(
            errors(&session, "Math.sqrtt(4)"),
            vec!["cannot find symbol: method sqrtt in class Math"]
        );
        assert_eq!(
            errors(&session, "launch()"),
            vec!["cannot find symbol: method launch"]
        );
        assert_eq!(
            errors(&session, "Integer.MAX"),
            vec!["cannot find symbol: variable MAX in class Integer"]
        );
    }

    #[test]
    fn imports_checked_against_library() {
        let session = Session::default();
        assert!(errors(&session, "import java.io.File").is_empty());
        assert_eq!(
            errors(&session, "import java.io.Nope"),
            vec!["cannot find symbol: class Nope in package java.io"]
        );
        assert_eq!(
            errors(&session, "import javax.swing.*"),
            vec!["package javax.swing does not exist"]
        );
    }

    #[test]
    fn duplicate_import_warns() {
        let mut session = Session::default();
        session
            .imports
            .insert("File".into(), "java.io.File".into());
        let (_, findings) = resolve(&session, "import java.io.File");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn block_scopes() {
        let session = Session::default();
        assert!(errors(&session, "{ int x = 1; x++; }").is_empty());
        assert!(errors(&session, "for (int i = 0; i < 3; i++) { int j = i; }").is_empty());
        assert_eq!(
            errors(&session, "{ int x = 1; int x = 2; }"),
            vec!["variable x is already defined"]
        );
    }

    #[test]
    fn break_outside_loop() {
        let session = Session::default();
        assert_eq!(
            errors(&session, "if (true) break"),
            vec!["break outside switch or loop"]
        );
        assert!(errors(&session, "while (true) break").is_empty());
    }

    #[test]
    fn unknown_declared_type() {
        assert_eq!(
            errors(&Session::default(), "Widget w = null"),
            vec!["cannot find symbol: class Widget"]
        );
    }
}
