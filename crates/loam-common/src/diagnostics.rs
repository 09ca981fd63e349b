//! The diagnostic model.
//!
//! Ordinary type-checking failures are always representable as data: a
//! `Diagnostic` appended to a `DiagnosticSink`. They are never raised as
//! control flow, so the extension dispatcher can intercept them before
//! emission. The distinct `Fatal` type covers internal invariant
//! violations only; it aborts the current compilation unit.

use crate::span::{SourcePos, Span};
use rustc_hash::FxHashSet;
use std::fmt;

/// Severity of an emitted diagnostic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Information,
}

/// The fixed taxonomy of recoverable findings. Checking continues after
/// each of these.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Variable, property, or attribute reference that resolved to nothing.
    UnresolvedSymbol,
    NoMatchingMethod,
    AmbiguousMethod,
    IncompatibleAssignment,
    IncompatibleReturnType,
    /// Informational: generics erasure in effect for this use site.
    UncheckedGenerics,
    /// Narrowing a numeric value that may not fit the target.
    PossibleLossOfPrecision,
    InaccessibleMember,
    UnsupportedOperator,
    /// An extension handler panicked; the handler was skipped.
    ExtensionFault,
    /// The constant-expression evaluator could not produce a value.
    ConstantEvaluation,
}

impl DiagnosticKind {
    /// Default severity for the kind; hooks cannot change severity, only
    /// suppress the diagnostic entirely.
    pub fn category(self) -> DiagnosticCategory {
        match self {
            DiagnosticKind::UncheckedGenerics => DiagnosticCategory::Information,
            DiagnosticKind::ExtensionFault | DiagnosticKind::ConstantEvaluation => {
                DiagnosticCategory::Warning
            }
            _ => DiagnosticCategory::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub category: DiagnosticCategory,
    pub span: Span,
    pub pos: SourcePos,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span, pos: SourcePos, message: impl Into<String>) -> Self {
        Self {
            kind,
            category: kind.category(),
            span,
            pos,
            message: message.into(),
        }
    }
}

/// Collects diagnostics for one compilation unit.
///
/// Emission is deduplicated per `(kind, line, column)` so the two-pass
/// re-checking model does not report the same finding twice.
#[derive(Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    seen: FxHashSet<(DiagnosticKind, u32, u32)>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic unless one of the same kind was already
    /// recorded at the same position.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        let key = (diagnostic.kind, diagnostic.pos.line, diagnostic.pos.column);
        if self.seen.insert(key) {
            self.diagnostics.push(diagnostic);
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.seen.clear();
        std::mem::take(&mut self.diagnostics)
    }
}

/// Internal invariant violation. Not policy-overridable; aborts checking
/// of the current compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fatal {
    pub message: String,
    pub pos: Option<SourcePos>,
}

impl Fatal {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            pos: None,
        }
    }

    pub fn at(message: impl Into<String>, pos: SourcePos) -> Self {
        Self {
            message: message.into(),
            pos: Some(pos),
        }
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(
                f,
                "internal checker error at {}:{}: {}",
                pos.line, pos.column, self.message
            ),
            None => write!(f, "internal checker error: {}", self.message),
        }
    }
}

impl std::error::Error for Fatal {}

pub type FatalResult<T> = Result<T, Fatal>;

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(kind: DiagnosticKind, line: u32, column: u32) -> Diagnostic {
        Diagnostic::new(kind, Span::DUMMY, SourcePos::new(line, column), "msg")
    }

    #[test]
    fn sink_dedupes_same_kind_same_position() {
        let mut sink = DiagnosticSink::new();
        sink.push(diag(DiagnosticKind::NoMatchingMethod, 3, 7));
        sink.push(diag(DiagnosticKind::NoMatchingMethod, 3, 7));
        assert_eq!(sink.diagnostics().len(), 1);
    }

    #[test]
    fn sink_keeps_different_kind_at_same_position() {
        let mut sink = DiagnosticSink::new();
        sink.push(diag(DiagnosticKind::NoMatchingMethod, 3, 7));
        sink.push(diag(DiagnosticKind::UncheckedGenerics, 3, 7));
        assert_eq!(sink.diagnostics().len(), 2);
    }

    #[test]
    fn unchecked_generics_is_informational() {
        assert_eq!(
            DiagnosticKind::UncheckedGenerics.category(),
            DiagnosticCategory::Information
        );
    }
}
