//! Emission of diagnostics to the terminal or a listing.

use std::io::{self, Write};

use crate::types::{Diagnostic, Severity};

/// The prefix with which error messages are annotated in a listing, so a
/// post-edit cleanup pass can strip them. It should not normally occur at
/// the start of a line in a Hope program.
pub const LIST_PREFIX: &str = "@ ";

/// Collects and prints diagnostics.
///
/// In listing mode every source line read from a file is echoed and every
/// report line is prefixed with [`LIST_PREFIX`].
pub struct Reporter {
    listing: bool,
    errors: usize,
    sink: Box<dyn Write + Send>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("listing", &self.listing)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl Reporter {
    /// Creates a reporter writing to standard error.
    #[must_use]
    pub fn stderr(listing: bool) -> Self {
        Self { listing, errors: 0, sink: Box::new(io::stderr()) }
    }

    /// Creates a reporter writing to an arbitrary sink (used by tests).
    #[must_use]
    pub fn to_sink(sink: Box<dyn Write + Send>, listing: bool) -> Self {
        Self { listing, errors: 0, sink }
    }

    /// Whether listing mode is on.
    #[must_use]
    pub const fn listing(&self) -> bool { self.listing }

    /// Number of errors reported so far.
    #[must_use]
    pub const fn error_count(&self) -> usize { self.errors }

    /// Echoes a source line (listing mode only).
    pub fn echo_line(&mut self, line: &str) {
        if self.listing {
            let _ = self.sink.write_all(line.as_bytes());
            if !line.ends_with('\n') {
                let _ = self.sink.write_all(b"\n");
            }
        }
    }

    /// Starts a report line, applying the listing prefix.
    fn start_line(&mut self) {
        if self.listing {
            let _ = self.sink.write_all(LIST_PREFIX.as_bytes());
        }
    }

    /// Writes a raw line as part of a report (used for the caret line
    /// flagging an erroneous token).
    pub fn flag_line(&mut self, line: &str) {
        self.start_line();
        let _ = writeln!(self.sink, "{line}");
    }

    /// Reports a diagnostic: detail lines first, then
    /// `module M, line N: kind - message`.
    pub fn report(&mut self, diag: &Diagnostic) {
        self.errors += 1;
        for detail in &diag.details {
            self.start_line();
            let _ = writeln!(self.sink, "  {detail}");
        }
        self.start_line();
        if let Some(module) = &diag.module {
            let _ = write!(self.sink, "module {module}, ");
        }
        if let Some(line) = diag.line {
            let _ = write!(self.sink, "line {line}: ");
        }
        let _ = writeln!(self.sink, "{diag}");
        let _ = self.sink.flush();
        if diag.severity() == Severity::Abort {
            log::error!("aborting after {diag}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::types::ErrorKind;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    #[test]
    fn reports_location_and_details() {
        let buf = Shared::default();
        let mut reporter = Reporter::to_sink(Box::new(buf.clone()), false);
        let diag = Diagnostic::new(ErrorKind::Type, "argument has wrong type")
            .with_detail("true : bool")
            .at(Some("M".to_string()), Some(3));
        reporter.report(&diag);
        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "  true : bool\nmodule M, line 3: type error - argument has wrong type\n");
        assert_eq!(reporter.error_count(), 1);
    }

    #[test]
    fn listing_mode_prefixes_reports() {
        let buf = Shared::default();
        let mut reporter = Reporter::to_sink(Box::new(buf.clone()), true);
        reporter.echo_line("dec f : num;\n");
        reporter.report(&Diagnostic::new(ErrorKind::Semantic, "'f': undefined"));
        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "dec f : num;\n@ semantic error - 'f': undefined\n");
    }
}
