//! Decomposition of a command into top-level snippet sources.

const BLOCK_KEYWORDS: &[&str] = &["if", "while", "for"];

/// Split `source` into top-level fragments.
///
/// A fragment ends at a `;` outside brackets, literals and comments, or at
/// the `}` closing a top-level block statement (`if`, `while`, `for`, bare
/// block) unless an `else` follows. Fragments are trimmed; blank ones are dropped.
#[must_use]
pub fn split_snippets(source: &str) -> Vec<&str> {
    let bytes = source.as_bytes();
    let mut fragments = Vec::new();
    let mut start = 0;
    let mut depth: usize = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0
                    && starts_block_statement(&source[start..i])
                    && !next_word_is(&source[i + 1..], "else")
                {
                    push_fragment(&mut fragments, &source[start..=i]);
                    start = i + 1;
                }
            }
            b';' if depth == 0 => {
                push_fragment(&mut fragments, &source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    push_fragment(&mut fragments, &source[start..]);
    fragments
}

fn push_fragment<'a>(fragments: &mut Vec<&'a str>, fragment: &'a str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() && !is_only_comments(trimmed) {
        fragments.push(trimmed);
    }
}

fn is_only_comments(fragment: &str) -> bool {
    let mut rest = fragment.trim_start();
    loop {
        if rest.is_empty() {
            return true;
        }
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |n| &after[n..]).trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |n| &after[n + 2..]).trim_start();
        } else {
            return false;
        }
    }
}

/// Index just past the closing quote of the string or char literal starting
/// at `open`. A newline also ends it.
fn skip_quoted(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i + 1,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn starts_block_statement(fragment: &str) -> bool {
    let trimmed = fragment.trim_start();
    if trimmed.starts_with('{') {
        return true;
    }
    BLOCK_KEYWORDS.iter().any(|kw| next_word_is(trimmed, kw))
}

fn next_word_is(text: &str, word: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.strip_prefix(word).is_some_and(|rest| {
        !rest
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
    })
}
