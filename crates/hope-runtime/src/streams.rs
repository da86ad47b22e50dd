//! Input streams for the `read` builtin and the terminal `input` list.
//!
//! Open files are tracked so anything left open at the end of an
//! evaluation can be closed. Standard input is line-buffered: when an
//! evaluation does not consume a whole line, the rest of that line is
//! discarded with the stream state at the next reset.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use crate::error::EvalError;
use crate::heap::StreamId;

/// Most files open at once during one evaluation.
const MAX_STREAMS: usize = 20;

/// The open-stream table.
#[derive(Debug, Default)]
pub struct Streams {
    files: Vec<Option<BufReader<File>>>,
    stdin_line: Vec<u8>,
    stdin_pos: usize,
    stdin_closed: bool,
}

impl Streams {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Forgets buffered terminal input and verifies the table is clean;
    /// called before each evaluation.
    pub fn reset(&mut self) {
        self.stdin_line.clear();
        self.stdin_pos = 0;
        self.stdin_closed = false;
        self.files.clear();
    }

    /// Opens a file for `read`.
    ///
    /// # Errors
    ///
    /// Fails when the table is full or the file cannot be read.
    pub fn open(&mut self, filename: &str) -> Result<StreamId, EvalError> {
        let slot = self.files.iter().position(Option::is_none).unwrap_or(self.files.len());
        if slot >= MAX_STREAMS {
            return Err(EvalError::exec("stream table full"));
        }
        let file = File::open(filename)
            .map_err(|_| EvalError::exec(format!("'{filename}': can't read file")))?;
        if slot == self.files.len() {
            self.files.push(Some(BufReader::new(file)));
        } else {
            self.files[slot] = Some(BufReader::new(file));
        }
        Ok(StreamId::File(slot))
    }

    /// Reads the next character; `None` is end of stream, which closes
    /// a file stream.
    pub fn read_char(&mut self, id: StreamId) -> Option<u8> {
        match id {
            StreamId::Stdin => self.read_stdin(),
            StreamId::File(slot) => {
                let mut byte = [0u8; 1];
                let reader = self.files.get_mut(slot)?.as_mut()?;
                match reader.read(&mut byte) {
                    Ok(1) => Some(byte[0]),
                    _ => {
                        self.files[slot] = None;
                        None
                    }
                }
            }
        }
    }

    fn read_stdin(&mut self) -> Option<u8> {
        if self.stdin_closed {
            return None;
        }
        if self.stdin_pos >= self.stdin_line.len() {
            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => {
                    self.stdin_closed = true;
                    return None;
                }
                Ok(_) => {
                    self.stdin_line = line.into_bytes();
                    self.stdin_pos = 0;
                }
            }
        }
        let byte = self.stdin_line[self.stdin_pos];
        self.stdin_pos += 1;
        Some(byte)
    }

    /// Closes everything left open.
    pub fn close_all(&mut self) { self.files.clear(); }
}
