//! Diagnostics collected across the pipeline.
//!
//! Every stage reports problems as [`CompileError`]s into a shared
//! [`Diagnostics`] sink and keeps going; recovery policy is per stage
//! (the lexer emits an error token, the parser synchronizes at the next
//! boundary, the binder leaves a node unbound, and so on). The driver
//! inspects the collected list at the end: a compilation succeeded iff
//! the list is empty.

use crate::location::SourceLocation;
use std::fmt;

/// Which stage produced an error.
///
/// `Internal` marks a broken compiler invariant; it is reported like any
/// other error rather than panicking, but always fails the compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Symbol,
    Bind,
    Resolution,
    Lowering,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Lex => "lex error",
            ErrorKind::Parse => "parse error",
            ErrorKind::Symbol => "symbol error",
            ErrorKind::Bind => "bind error",
            ErrorKind::Resolution => "resolution error",
            ErrorKind::Lowering => "lowering error",
            ErrorKind::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error annotated with its producing stage and source location.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLocation,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.location, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Ordered sink of everything reported during one compilation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: ErrorKind, message: impl Into<String>, location: SourceLocation) {
        self.errors.push(CompileError::new(kind, message, location));
    }

    pub fn push(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }

    /// Errors of one stage, for tests and targeted reporting.
    pub fn of_kind(&self, kind: ErrorKind) -> impl Iterator<Item = &CompileError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    /// Consumes the sink, yielding the ordered error list.
    pub fn into_vec(self) -> Vec<CompileError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Symbol;

    fn at(line: u32, col: u32) -> SourceLocation {
        SourceLocation::point(Symbol::EMPTY, line, col)
    }

    #[test]
    fn display_includes_kind_location_message() {
        let err = CompileError::new(ErrorKind::Parse, "expected ';'", at(4, 18));
        let text = err.to_string();
        assert!(text.contains("parse error"));
        assert!(text.contains("4:18"));
        assert!(text.contains("expected ';'"));
    }

    #[test]
    fn diagnostics_preserve_report_order() {
        let mut diags = Diagnostics::new();
        diags.report(ErrorKind::Lex, "first", at(1, 1));
        diags.report(ErrorKind::Parse, "second", at(2, 1));
        let collected: Vec<_> = diags.iter().map(|e| e.message.clone()).collect();
        assert_eq!(collected, vec!["first", "second"]);
    }

    #[test]
    fn of_kind_filters_by_stage() {
        let mut diags = Diagnostics::new();
        diags.report(ErrorKind::Lex, "a", at(1, 1));
        diags.report(ErrorKind::Resolution, "b", at(1, 2));
        diags.report(ErrorKind::Lex, "c", at(1, 3));
        assert_eq!(diags.of_kind(ErrorKind::Lex).count(), 2);
        assert_eq!(diags.of_kind(ErrorKind::Lowering).count(), 0);
    }

    #[test]
    fn empty_diagnostics_mean_success() {
        let diags = Diagnostics::new();
        assert!(!diags.has_errors());
        assert!(diags.is_empty());
        assert_eq!(diags.len(), 0);
    }
}
