//! Plain-text rendering of evaluation results for chat replies.

use std::fmt::Write;

use snipbox_engine::{Diagnostic, SnippetEvent, SnippetStatus};

use crate::evaluator::EvaluationResult;

pub const MAX_REPLY_BYTES: usize = 2_000;

/// One line per event followed by the captured output, cut with a head+tail
/// split when longer than [`MAX_REPLY_BYTES`].
#[must_use]
pub fn render_result(result: &EvaluationResult) -> String {
    let mut reply = String::new();
    for event in &result.events {
        if let Some(line) = event_line(event) {
            reply.push_str(&line);
            reply.push('\n');
        }
    }
    if !result.output.is_empty() {
        reply.push_str(&result.output);
    }
    truncate_reply(reply.trim_end_matches('\n'))
}

fn event_line(event: &SnippetEvent) -> Option<String> {
    match event.status {
        SnippetStatus::Overwritten => None,
        SnippetStatus::Rejected => Some(format!("✗ rejected: {}", event.snippet.source.trim())),
        SnippetStatus::Valid => match (&event.exception, &event.value) {
            (Some(exception), _) => Some(format!("✗ {exception}")),
            (None, Some(value)) => Some(format!("✓ {value}")),
            (None, None) => None,
        },
    }
}

/// Diagnostics listing, one per line, prefixed with the snippet id.
#[must_use]
pub fn render_diagnostics(event: &SnippetEvent, diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics {
        let _ = writeln!(out, "{}: {diagnostic}", event.snippet.id);
    }
    truncate_reply(out.trim_end_matches('\n'))
}

fn truncate_reply(text: &str) -> String {
    if text.len() <= MAX_REPLY_BYTES {
        return text.to_owned();
    }

    let half = MAX_REPLY_BYTES / 2;
    let head_end = text.floor_char_boundary(half);
    let tail_start = text.ceil_char_boundary(text.len() - half);
    let truncated = tail_start - head_end;
    format!(
        "{}\n... [truncated {truncated} bytes] ...\n{}",
        &text[..head_end],
        &text[tail_start..]
    )
}

#[cfg(test)]
mod tests {
    use snipbox_engine::{Severity, Snippet, SnippetException, SnippetId, SnippetKind};

    use super::*;

    fn snippet(id: u64, source: &str) -> Snippet {
        Snippet {
            id: SnippetId(id),
            kind: SnippetKind::Expression,
            source: source.into(),
        }
    }

    #[test]
    fn value_and_output() {
        let result = EvaluationResult {
            events: vec![
                SnippetEvent::valid(snippet(1, "1+1"), Some("2".into())),
                SnippetEvent::valid(snippet(2, "System.out.println(\"hi\")"), None),
            ],
            output: "hi\n".into(),
        };
        assert_eq!(render_result(&result), "✓ 2\nhi");
    }

    #[test]
    fn failures_rendered() {
        let result = EvaluationResult {
            events: vec![
                SnippetEvent::rejected(snippet(1, "int x = ;")),
                SnippetEvent::failed(
                    snippet(2, "1/0"),
                    SnippetException::new("java.lang.ArithmeticException", "/ by zero"),
                ),
                SnippetEvent::overwritten(snippet(3, "int y = 1;"), SnippetId(4)),
            ],
            output: String::new(),
        };
        assert_eq!(
            render_result(&result),
            "✗ rejected: int x = ;\n✗ java.lang.ArithmeticException: / by zero"
        );
    }

    #[test]
    fn empty_result_is_empty() {
        assert_eq!(render_result(&EvaluationResult::default()), "");
    }

    #[test]
    fn long_output_head_and_tail() {
        let output = format!("{}{}", "a".repeat(3_000), "z".repeat(3_000));
        let result = EvaluationResult {
            events: Vec::new(),
            output,
        };
        let reply = render_result(&result);
        assert!(reply.starts_with("aaa"));
        assert!(reply.ends_with("zzz"));
        assert!(reply.contains("[truncated 4000 bytes]"));
        assert!(reply.len() < MAX_REPLY_BYTES + 64);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "✓".repeat(1_000);
        let reply = truncate_reply(&text);
        assert!(reply.contains("truncated"));
        assert!(reply.chars().filter(|c| *c == '✓').count() < 1_000);
        // 3-byte chars: head ends at 999, tail starts at 2001
        assert!(reply.contains("[truncated 1002 bytes]"));
    }

    #[test]
    fn diagnostics_listing() {
        let event = SnippetEvent::rejected(snippet(7, "foo()"));
        let diagnostics = vec![Diagnostic {
            snippet: SnippetId(7),
            severity: Severity::Error,
            start: 0,
            end: 3,
            message: "cannot find symbol: method foo".into(),
        }];
        assert_eq!(
            render_diagnostics(&event, &diagnostics),
            "#7: error at 0..3: cannot find symbol: method foo"
        );
        assert_eq!(render_diagnostics(&event, &[]), "");
    }
}
