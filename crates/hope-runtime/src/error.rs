//! Run-time errors.

use hope_source::{Diagnostic, ErrorKind};
use thiserror::Error;

/// An error raised during evaluation.
///
/// Detail lines (already rendered; the offending call with its forced
/// arguments, for instance) travel with the error so the report can show
/// them above the message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EvalError {
    /// `Exec` for run-time failures, `User` for the `error` builtin,
    /// `Fatal` for I/O trouble.
    pub kind: ErrorKind,
    /// The message.
    pub message: String,
    /// Rendered context lines.
    pub details: Vec<String>,
}

impl EvalError {
    /// A run-time error.
    #[must_use]
    pub fn exec(message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Exec, message: message.into(), details: Vec::new() }
    }

    /// The `error "msg"` builtin.
    #[must_use]
    pub fn user(message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::User, message: message.into(), details: Vec::new() }
    }

    /// Attaches a rendered detail line.
    #[must_use]
    pub fn with_detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }

    /// Converts into a reportable diagnostic.
    #[must_use]
    pub fn into_diagnostic(self) -> Diagnostic {
        let mut diag = Diagnostic::new(self.kind, self.message);
        diag.details = self.details;
        diag
    }
}
