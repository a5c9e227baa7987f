//! User-facing diagnostic rendering.
//!
//! Each error renders as a one-line header followed by the offending
//! source line with a caret span:
//!
//! ```text
//! demo.sb:3:9: parse error: expected ';', found '}'
//!     int x = 1
//!         ^
//! ```
//!
//! Errors are printed in the order they were recorded, which follows
//! the pipeline stages and source order within a stage.

use sable_base::{CompileError, Interner};
use std::fmt::Write as _;

/// Renders every error against its source line.
pub fn render_diagnostics(source: &str, errors: &[CompileError], interner: &Interner) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut out = String::new();
    for error in errors {
        render_one(error, &lines, interner, &mut out);
    }
    out
}

fn render_one(error: &CompileError, lines: &[&str], interner: &Interner, out: &mut String) {
    let file = interner.resolve(error.location.file);
    let _ = writeln!(
        out,
        "{}:{}:{}: {}: {}",
        file, error.location.line_start, error.location.col_start, error.kind, error.message
    );

    let line_no = error.location.line_start as usize;
    let Some(line) = line_no.checked_sub(1).and_then(|i| lines.get(i)) else {
        return;
    };
    let _ = writeln!(out, "    {line}");

    // Caret span under the offending columns; multi-line ranges mark
    // the start column only.
    let start = error.location.col_start.max(1) as usize;
    let end = if error.location.line_end == error.location.line_start {
        (error.location.col_end as usize).max(start + 1)
    } else {
        start + 1
    };
    let width = (end - start).max(1).min(line.chars().count().saturating_sub(start - 1).max(1));
    let mut marker = String::from("    ");
    marker.extend(std::iter::repeat(' ').take(start - 1));
    marker.push('^');
    marker.extend(std::iter::repeat('~').take(width.saturating_sub(1)));
    let _ = writeln!(out, "{marker}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_base::{ErrorKind, SourceLocation};

    #[test]
    fn renders_header_line_and_caret() {
        let mut interner = Interner::new();
        let file = interner.intern("demo.sb");
        let source = "int x = 1\nint y = 2;";
        let errors = vec![CompileError::new(
            ErrorKind::Parse,
            "expected ';'",
            SourceLocation::new(file, 1, 9, 1, 10),
        )];
        let text = render_diagnostics(source, &errors, &interner);
        assert!(text.contains("demo.sb:1:9: parse error: expected ';'"));
        assert!(text.contains("    int x = 1"));
        // Caret sits under column 9.
        assert!(text.contains("            ^"));
    }

    #[test]
    fn out_of_range_line_renders_header_only() {
        let mut interner = Interner::new();
        let file = interner.intern("demo.sb");
        let errors = vec![CompileError::new(
            ErrorKind::Lex,
            "unterminated string literal",
            SourceLocation::point(file, 99, 1),
        )];
        let text = render_diagnostics("one line", &errors, &interner);
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn multiple_errors_render_in_order() {
        let mut interner = Interner::new();
        let file = interner.intern("demo.sb");
        let errors = vec![
            CompileError::new(ErrorKind::Lex, "first", SourceLocation::point(file, 1, 1)),
            CompileError::new(ErrorKind::Parse, "second", SourceLocation::point(file, 1, 2)),
        ];
        let text = render_diagnostics("x", &errors, &interner);
        let first = text.find("first").unwrap();
        let second = text.find("second").unwrap();
        assert!(first < second);
    }
}
