use super::ast::{BinOp, Expr, ExprKind, Ident, Stmt, TypeName, UnOp};
use super::lexer::{Span, Tok, Token};

const PRIMITIVES: &[&str] = &["int", "long", "short", "byte", "char", "boolean"];
const RESERVED: &[&str] = &[
    "if", "else", "while", "for", "new", "import", "break", "continue", "true", "false", "null",
    "return", "class", "do", "switch",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

type PResult<T> = Result<T, ParseError>;

/// Deepest statement or expression nesting a snippet may use. Execution
/// walks the tree recursively, so this also bounds its stack use.
pub const MAX_NESTING: usize = 100;

/// Parse one top-level snippet. A single trailing `;` is allowed.
///
/// # Errors
///
/// Returns [`ParseError`] for syntax errors or trailing input.
pub fn parse_snippet(tokens: &[Token]) -> PResult<Stmt> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let stmt = if parser.peek_ident("import") {
        parser.parse_import()?
    } else {
        parser.parse_statement()?
    };
    parser.eat(";");
    if !matches!(parser.peek(), Tok::Eof) {
        return Err(parser.error_here("';' expected"));
    }
    Ok(stmt)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Tok {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Tok {
        self.tokens
            .get(self.pos + ahead)
            .or_else(|| self.tokens.last())
            .map_or(&Tok::Eof, |t| &t.tok)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or_else(Span::default, |t| t.span)
    }

    fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|p| self.tokens.get(p))
            .map_or_else(|| self.span(), |t| t.span)
    }

    fn advance(&mut self) -> Token {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .unwrap_or_else(|| Token {
                tok: Tok::Eof,
                span: self.span(),
            });
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn peek_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Tok::Punct(q) if *q == p)
    }

    fn peek_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Tok::Ident(n) if n == name)
    }

    fn eat(&mut self, p: &str) -> bool {
        if self.peek_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, p: &str) -> PResult<Span> {
        if self.peek_punct(p) {
            Ok(self.advance().span)
        } else {
            Err(self.error_here(&format!("'{p}' expected")))
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        ParseError {
            span: self.span(),
            message: message.to_owned(),
        }
    }

    /// Count one more level of nesting. Callers undo it with [`Self::leave`]
    /// on success; an error aborts the whole parse.
    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_here("code too deeply nested"));
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn ident(&mut self) -> PResult<Ident> {
        let is_name = matches!(self.peek(), Tok::Ident(n) if !RESERVED.contains(&n.as_str()));
        if !is_name {
            return Err(self.error_here("<identifier> expected"));
        }
        let token = self.advance();
        match token.tok {
            Tok::Ident(name) => Ok(Ident {
                name,
                span: token.span,
            }),
            _ => Err(self.error_here("<identifier> expected")),
        }
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        self.advance();
        let mut path = vec![self.ident()?];
        let mut wildcard = false;
        while self.eat(".") {
            if self.eat("*") {
                wildcard = true;
                break;
            }
            path.push(self.ident()?);
        }
        Ok(Stmt::Import { path, wildcard })
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        self.enter()?;
        let stmt = self.parse_statement_inner()?;
        self.leave(1);
        Ok(stmt)
    }

    fn parse_statement_inner(&mut self) -> PResult<Stmt> {
        match self.peek().clone() {
            Tok::Punct("{") => self.parse_block(),
            Tok::Punct(";") => Ok(Stmt::Empty),
            Tok::Ident(kw) => match kw.as_str() {
                "if" => self.parse_if(),
                "while" => self.parse_while(),
                "for" => self.parse_for(),
                "break" => Ok(Stmt::Break(self.advance().span)),
                "continue" => Ok(Stmt::Continue(self.advance().span)),
                "else" => Err(self.error_here("'else' without 'if'")),
                _ if self.looks_like_decl() => self.parse_decl(),
                _ => Ok(Stmt::Expr(self.parse_expr()?)),
            },
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    /// Statement nested in a block or body, followed by its terminator.
    fn parse_nested(&mut self) -> PResult<Stmt> {
        let stmt = self.parse_statement()?;
        match stmt {
            Stmt::Block(_) | Stmt::If { .. } | Stmt::While { .. } | Stmt::For { .. } => {}
            Stmt::Empty => {
                self.expect(";")?;
            }
            _ => {
                if !self.eat(";")
                    && !matches!(self.peek(), Tok::Eof | Tok::Punct("}"))
                    && !self.peek_ident("else")
                {
                    return Err(self.error_here("';' expected"));
                }
            }
        }
        Ok(stmt)
    }

    fn parse_block(&mut self) -> PResult<Stmt> {
        self.expect("{")?;
        let mut body = Vec::new();
        while !self.peek_punct("}") {
            if matches!(self.peek(), Tok::Eof) {
                return Err(self.error_here("reached end of input while parsing"));
            }
            body.push(self.parse_nested()?);
        }
        self.advance();
        Ok(Stmt::Block(body))
    }

    fn parse_condition(&mut self) -> PResult<Expr> {
        self.expect("(")?;
        let cond = self.parse_expr()?;
        self.expect(")")?;
        Ok(cond)
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.advance();
        let cond = self.parse_condition()?;
        let then = Box::new(self.parse_nested()?);
        let otherwise = if self.peek_ident("else") {
            self.advance();
            Some(Box::new(self.parse_nested()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        self.advance();
        let cond = self.parse_condition()?;
        let body = Box::new(self.parse_nested()?);
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect("(")?;
        let init = if self.peek_punct(";") {
            None
        } else if self.looks_like_decl() {
            Some(Box::new(self.parse_decl()?))
        } else {
            Some(Box::new(Stmt::Expr(self.parse_expr()?)))
        };
        self.expect(";")?;
        let cond = if self.peek_punct(";") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(";")?;
        let update = if self.peek_punct(")") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(")")?;
        let body = Box::new(self.parse_nested()?);
        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
        })
    }

    /// `Type name =`, `Type name;` or `Type name` at end of input, where
    /// `Type` is a possibly dotted identifier.
    fn looks_like_decl(&self) -> bool {
        let is_name = |tok: &Tok| matches!(tok, Tok::Ident(n) if !RESERVED.contains(&n.as_str()));
        if !is_name(self.peek()) {
            return false;
        }
        let mut ahead = 1;
        while matches!(self.peek_at(ahead), Tok::Punct(".")) && is_name(self.peek_at(ahead + 1)) {
            ahead += 2;
        }
        is_name(self.peek_at(ahead))
            && matches!(
                self.peek_at(ahead + 1),
                Tok::Punct("=" | ";") | Tok::Eof
            )
    }

    fn parse_decl(&mut self) -> PResult<Stmt> {
        let mut path = vec![self.ident()?];
        while self.eat(".") {
            path.push(self.ident()?);
        }
        let ty = match path.as_slice() {
            [single] if single.name == "var" => TypeName::Var,
            [single] if PRIMITIVES.contains(&single.name.as_str()) => {
                TypeName::Primitive(single.name.clone())
            }
            _ => TypeName::Class {
                path,
                resolved: None,
            },
        };
        let name = self.ident()?;
        let init = if self.eat("=") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        if matches!(ty, TypeName::Var) && init.is_none() {
            return Err(ParseError {
                span: name.span,
                message: "cannot infer type for local variable without initializer".into(),
            });
        }
        Ok(Stmt::Decl { ty, name, init })
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.enter()?;
        let expr = self.parse_assignment()?;
        self.leave(1);
        Ok(expr)
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        let lhs = self.parse_ternary()?;
        let op = match self.peek() {
            Tok::Punct("=") => None,
            Tok::Punct("+=") => Some(BinOp::Add),
            Tok::Punct("-=") => Some(BinOp::Sub),
            Tok::Punct("*=") => Some(BinOp::Mul),
            Tok::Punct("/=") => Some(BinOp::Div),
            Tok::Punct("%=") => Some(BinOp::Rem),
            _ => return Ok(lhs),
        };
        let ExprKind::Name(mut path) = lhs.kind else {
            return Err(ParseError {
                span: lhs.span,
                message: "unexpected type: required variable, found value".into(),
            });
        };
        if path.len() != 1 {
            return Err(ParseError {
                span: lhs.span,
                message: "cannot assign a value to this target".into(),
            });
        }
        self.advance();
        let value = self.parse_expr()?;
        let span = lhs.span.to(value.span);
        Ok(Expr::new(
            ExprKind::Assign {
                target: path.remove(0),
                op,
                value: Box::new(value),
            },
            span,
        ))
    }

    fn parse_ternary(&mut self) -> PResult<Expr> {
        let cond = self.parse_binary(0)?;
        if !self.eat("?") {
            return Ok(cond);
        }
        self.enter()?;
        let then = self.parse_ternary()?;
        self.expect(":")?;
        let otherwise = self.parse_ternary()?;
        self.leave(1);
        let span = cond.span.to(otherwise.span);
        Ok(Expr::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            span,
        ))
    }

    fn binary_op(&self, level: usize) -> Option<BinOp> {
        let Tok::Punct(p) = self.peek() else {
            return None;
        };
        let op = match (level, *p) {
            (0, "||") => BinOp::Or,
            (1, "&&") => BinOp::And,
            (2, "==") => BinOp::Eq,
            (2, "!=") => BinOp::Ne,
            (3, "<") => BinOp::Lt,
            (3, "<=") => BinOp::Le,
            (3, ">") => BinOp::Gt,
            (3, ">=") => BinOp::Ge,
            (4, "+") => BinOp::Add,
            (4, "-") => BinOp::Sub,
            (5, "*") => BinOp::Mul,
            (5, "/") => BinOp::Div,
            (5, "%") => BinOp::Rem,
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, level: usize) -> PResult<Expr> {
        if level > 5 {
            return self.parse_unary();
        }
        let mut lhs = self.parse_binary(level + 1)?;
        let mut chained = 0;
        while let Some(op) = self.binary_op(level) {
            self.enter()?;
            chained += 1;
            self.advance();
            let rhs = self.parse_binary(level + 1)?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        self.leave(chained);
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.span();
        let op = if self.eat("-") {
            UnOp::Neg
        } else if self.eat("!") {
            UnOp::Not
        } else if self.eat("+") {
            self.enter()?;
            let operand = self.parse_unary()?;
            self.leave(1);
            return Ok(operand);
        } else {
            return self.parse_postfix();
        };
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave(1);
        let span = start.to(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        let mut chained = 0;
        loop {
            if self.eat(".") {
                self.enter()?;
                chained += 1;
                let member = self.ident()?;
                if self.peek_punct("(") {
                    let args = self.parse_args()?;
                    let span = expr.span.to(self.prev_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            target: Some(Box::new(expr)),
                            method: member,
                            args,
                        },
                        span,
                    );
                } else {
                    let span = expr.span.to(member.span);
                    expr = match expr.kind {
                        ExprKind::Name(mut path) => {
                            path.push(member);
                            Expr::new(ExprKind::Name(path), span)
                        }
                        kind => Expr::new(
                            ExprKind::Field {
                                target: Box::new(Expr::new(kind, expr.span)),
                                field: member,
                            },
                            span,
                        ),
                    };
                }
            } else if self.peek_punct("++") || self.peek_punct("--") {
                let delta = if self.peek_punct("++") { 1 } else { -1 };
                let ExprKind::Name(mut path) = expr.kind else {
                    return Err(ParseError {
                        span: expr.span,
                        message: "unexpected type: required variable, found value".into(),
                    });
                };
                if path.len() != 1 {
                    return Err(ParseError {
                        span: expr.span,
                        message: "cannot assign a value to this target".into(),
                    });
                }
                let span = expr.span.to(self.advance().span);
                expr = Expr::new(
                    ExprKind::PostIncrement {
                        target: path.remove(0),
                        delta,
                    },
                    span,
                );
            } else {
                self.leave(chained);
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect("(")?;
        let mut args = Vec::new();
        if self.eat(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(")") {
                return Ok(args);
            }
            self.expect(",")?;
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let span = self.span();
        match self.peek().clone() {
            Tok::Int(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Int(n), span))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(s), span))
            }
            Tok::Punct("(") => {
                self.advance();
                let inner = self.parse_expr()?;
                let close = self.expect(")")?;
                Ok(Expr::new(inner.kind, span.to(close)))
            }
            Tok::Ident(name) => match name.as_str() {
                "true" | "false" => {
                    self.advance();
                    Ok(Expr::new(ExprKind::Bool(name == "true"), span))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::new(ExprKind::Null, span))
                }
                "new" => {
                    self.advance();
                    let mut class = vec![self.ident()?];
                    while self.eat(".") {
                        class.push(self.ident()?);
                    }
                    let args = self.parse_args()?;
                    let span = span.to(self.prev_span());
                    Ok(Expr::new(ExprKind::New { class, args }, span))
                }
                _ if RESERVED.contains(&name.as_str()) => {
                    Err(self.error_here("illegal start of expression"))
                }
                _ => {
                    let ident = self.ident()?;
                    if self.peek_punct("(") {
                        let args = self.parse_args()?;
                        let span = span.to(self.prev_span());
                        Ok(Expr::new(
                            ExprKind::Call {
                                target: None,
                                method: ident,
                                args,
                            },
                            span,
                        ))
                    } else {
                        Ok(Expr::new(ExprKind::Name(vec![ident]), span))
                    }
                }
            },
            Tok::Eof => Err(self.error_here("reached end of input while parsing")),
            _ => Err(self.error_here("illegal start of expression")),
        }
    }
}
