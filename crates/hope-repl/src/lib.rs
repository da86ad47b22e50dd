//! Interactive sessions on a line editor.
//!
//! Wraps rustyline as a [`LineSource`] so the session driver reads
//! edited lines with history, and provides the interactive entry point
//! the `hope` binary uses when standard input is a terminal.

use anyhow::Result;
use hope_runtime::{LineSource, Session};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// History file kept in the working directory.
const HISTORY_FILE: &str = ".hope_history";

/// A [`LineSource`] backed by a rustyline editor.
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    /// Creates the editor and loads any previous history.
    ///
    /// # Errors
    ///
    /// Fails when the terminal cannot be initialised.
    pub fn new() -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        if editor.load_history(HISTORY_FILE).is_err() {
            log::debug!("no previous history");
        }
        Ok(Self { editor })
    }
}

impl Drop for EditorSource {
    fn drop(&mut self) {
        let _ = self.editor.save_history(HISTORY_FILE);
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(mut line) => {
                let _ = self.editor.add_history_entry(&line);
                line.push('\n');
                Ok(Some(line))
            }
            // Ctrl-C at the prompt just abandons the line.
            Err(ReadlineError::Interrupted) => Ok(Some("\n".to_string())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(std::io::Error::new(std::io::ErrorKind::Other, err)),
        }
    }
}

/// Runs an interactive session. Returns the process exit code.
///
/// # Errors
///
/// Fails when the terminal cannot be initialised.
pub fn run(session: &mut Session) -> Result<i32> {
    println!("Hope interpreter v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit;' or press Ctrl-D to leave");
    let source = EditorSource::new()?;
    Ok(session.run(Box::new(source), true))
}
