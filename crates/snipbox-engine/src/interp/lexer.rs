/// Byte range in a snippet's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end.max(self.end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    Int(i64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub tok: Tok,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

// Longest first so that `+=` wins over `+`.
const PUNCTS: &[&str] = &[
    "&&", "||", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "++", "--", "(", ")", "{",
    "}", "[", "]", ";", ",", ".", "+", "-", "*", "/", "%", "=", "<", ">", "!", "?", ":",
];

/// Tokenize one snippet. The returned vector always ends with [`Tok::Eof`].
///
/// # Errors
///
/// Returns [`LexError`] on unterminated strings or comments, malformed
/// escapes, integer literals that overflow, and unexpected characters.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if source[i..].starts_with("//") {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if source[i..].starts_with("/*") {
            let Some(end) = source[i + 2..].find("*/") else {
                return Err(LexError {
                    span: Span::new(i, bytes.len()),
                    message: "unclosed comment".into(),
                });
            };
            i += end + 4;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
                i += 1;
            }
            // `L` suffix for long literals is accepted and ignored.
            let digits: String = source[start..i].chars().filter(|c| *c != '_').collect();
            if i < bytes.len() && (bytes[i] == b'L' || bytes[i] == b'l') {
                i += 1;
            }
            let value = digits.parse::<i64>().map_err(|_| LexError {
                span: Span::new(start, i),
                message: "integer number too large".into(),
            })?;
            tokens.push(Token {
                tok: Tok::Int(value),
                span: Span::new(start, i),
            });
            continue;
        }
        if c == b'"' {
            let (value, end) = lex_string(source, i)?;
            tokens.push(Token {
                tok: Tok::Str(value),
                span: Span::new(i, end),
            });
            i = end;
            continue;
        }
        if c == b'\'' {
            let (value, end) = lex_char(source, i)?;
            tokens.push(Token {
                tok: Tok::Str(value),
                span: Span::new(i, end),
            });
            i = end;
            continue;
        }
        if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            let start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
            {
                i += 1;
            }
            tokens.push(Token {
                tok: Tok::Ident(source[start..i].to_owned()),
                span: Span::new(start, i),
            });
            continue;
        }
        if let Some(p) = PUNCTS.iter().find(|p| source[i..].starts_with(**p)) {
            tokens.push(Token {
                tok: Tok::Punct(*p),
                span: Span::new(i, i + p.len()),
            });
            i += p.len();
            continue;
        }
        let ch = source[i..].chars().next().unwrap_or('?');
        return Err(LexError {
            span: Span::new(i, i + ch.len_utf8()),
            message: format!("illegal character: '{ch}'"),
        });
    }

    tokens.push(Token {
        tok: Tok::Eof,
        span: Span::new(bytes.len(), bytes.len()),
    });
    Ok(tokens)
}

fn lex_string(source: &str, open: usize) -> Result<(String, usize), LexError> {
    let mut value = String::new();
    let mut chars = source[open + 1..].char_indices();
    while let Some((offset, ch)) = chars.next() {
        let pos = open + 1 + offset;
        match ch {
            '"' => return Ok((value, pos + 1)),
            '\n' => break,
            '\\' => {
                let Some((_, esc)) = chars.next() else {
                    break;
                };
                value.push(unescape(esc).ok_or_else(|| LexError {
                    span: Span::new(pos, pos + 1 + esc.len_utf8()),
                    message: "illegal escape character".into(),
                })?);
            }
            other => value.push(other),
        }
    }
    Err(LexError {
        span: Span::new(open, source.len()),
        message: "unclosed string literal".into(),
    })
}

fn lex_char(source: &str, open: usize) -> Result<(String, usize), LexError> {
    let rest = &source[open + 1..];
    let mut chars = rest.chars();
    let unclosed = || LexError {
        span: Span::new(open, source.len()),
        message: "unclosed character literal".into(),
    };
    let (ch, consumed) = match chars.next() {
        Some('\\') => {
            let esc = chars.next().ok_or_else(unclosed)?;
            let ch = unescape(esc).ok_or_else(|| LexError {
                span: Span::new(open + 1, open + 2 + esc.len_utf8()),
                message: "illegal escape character".into(),
            })?;
            (ch, 1 + esc.len_utf8())
        }
        Some(c) if c != '\'' => (c, c.len_utf8()),
        _ => return Err(unclosed()),
    };
    if rest[consumed..].starts_with('\'') {
        Ok((ch.to_string(), open + 1 + consumed + 1))
    } else {
        Err(unclosed())
    }
}

fn unescape(esc: char) -> Option<char> {
    match esc {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '0' => Some('\0'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        _ => None,
    }
}
