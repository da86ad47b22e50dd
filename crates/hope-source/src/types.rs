//! The error taxonomy and diagnostic records.

use std::fmt;

use thiserror::Error;

/// The kind of an error, in reported severity order.
///
/// Everything up to and including `Semantic` lets the reader recover by
/// skipping to the next `;`. `Type` and above unwind the current top-level
/// item; `Fatal` and `Internal` abort the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Malformed token.
    Lexical,
    /// Parser error.
    Syntax,
    /// Unresolved name, arity mismatch, cyclic `uses`.
    Semantic,
    /// Unification failure, declared/inferred mismatch.
    Type,
    /// Runtime error: division by zero, pattern failure, range.
    Exec,
    /// The `error "msg"` builtin.
    User,
    /// A standard-library invariant was broken.
    Library,
    /// I/O failure or out of memory.
    Fatal,
    /// Assertion failure inside the interpreter.
    Internal,
}

impl ErrorKind {
    /// The name used when the error is reported.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical error",
            Self::Syntax => "syntax error",
            Self::Semantic => "semantic error",
            Self::Type => "type error",
            Self::Exec => "run-time error",
            Self::User => "user error",
            Self::Library => "library error",
            Self::Fatal => "fatal error",
            Self::Internal => "internal error",
        }
    }

    /// How far the error unwinds.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::Lexical | Self::Syntax | Self::Semantic => Severity::SkipItem,
            Self::Type | Self::Exec | Self::User => Severity::Unwind,
            Self::Library | Self::Fatal | Self::Internal => Severity::Abort,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Recovery behaviour implied by an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Skip to the next `;` and continue.
    SkipItem,
    /// Unwind to the top-level loop.
    Unwind,
    /// The interpreter cannot continue.
    Abort,
}

/// A reportable error.
///
/// Diagnostics carry the source module and line when the error arose while
/// reading a file, plus any detail lines printed before the message itself
/// (sub-expressions with their inferred types, offending values and the
/// like).
#[derive(Debug, Clone, Error)]
pub struct Diagnostic {
    /// What went wrong.
    pub kind: ErrorKind,
    /// The module being read, if not the interactive session.
    pub module: Option<String>,
    /// The line number within the current source, when known.
    pub line: Option<usize>,
    /// Free-form description; `None` for errors already flagged in place.
    pub message: Option<String>,
    /// Indented context lines emitted before the message.
    pub details: Vec<String>,
}

impl Diagnostic {
    /// Creates a diagnostic with a message and no location.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, module: None, line: None, message: Some(message.into()), details: Vec::new() }
    }

    /// Creates a diagnostic without a message (the report was already
    /// flagged in place, as for syntax errors pointing at a column).
    #[must_use]
    pub const fn bare(kind: ErrorKind) -> Self {
        Self { kind, module: None, line: None, message: None, details: Vec::new() }
    }

    /// Attaches a detail line, indented under the report.
    #[must_use]
    pub fn with_detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }

    /// Attaches the source location.
    #[must_use]
    pub fn at(mut self, module: Option<String>, line: Option<usize>) -> Self {
        self.module = module;
        self.line = line;
        self
    }

    /// Recovery behaviour for this diagnostic.
    #[must_use]
    pub const fn severity(&self) -> Severity { self.kind.severity() }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_order_by_severity() {
        assert!(ErrorKind::Lexical < ErrorKind::Type);
        assert!(ErrorKind::Type < ErrorKind::Fatal);
        assert_eq!(ErrorKind::Semantic.severity(), Severity::SkipItem);
        assert_eq!(ErrorKind::User.severity(), Severity::Unwind);
        assert_eq!(ErrorKind::Internal.severity(), Severity::Abort);
    }

    #[test]
    fn display_includes_message() {
        let d = Diagnostic::new(ErrorKind::Semantic, "'x': undefined variable");
        assert_eq!(d.to_string(), "semantic error - 'x': undefined variable");
        assert_eq!(Diagnostic::bare(ErrorKind::Syntax).to_string(), "syntax error");
    }
}
