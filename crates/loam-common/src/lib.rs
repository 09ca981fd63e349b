//! Common types and utilities for the Loam type-checking engine.
//!
//! This crate provides foundational types used across all loam crates:
//! - String interning (`Atom`, `Interner`)
//! - Source spans and positions (`Span`, `SourcePos`)
//! - The diagnostic model (`Diagnostic`, `DiagnosticSink`)
//! - The fatal internal-error type (`Fatal`)

pub mod diagnostics;
pub mod interner;
pub mod span;

pub use diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticKind, DiagnosticSink, Fatal, FatalResult,
};
pub use interner::{Atom, Interner};
pub use span::{SourcePos, Span};
