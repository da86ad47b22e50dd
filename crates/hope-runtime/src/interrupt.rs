//! Cancellation of running evaluations.
//!
//! The signal handler only sets an atomic flag; the evaluator checks it
//! (together with the optional deadline) at its suspension points and
//! unwinds with a run-time error. Cells being updated mid-force may be
//! left partially written, which is acceptable because the evaluation
//! heap is discarded at the next top-level item.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::EvalError;

/// The evaluator's cancellation state.
#[derive(Debug, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Interrupt {
    /// Creates an un-armed interrupt.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// The flag a signal handler should set.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> { Arc::clone(&self.flag) }

    /// Arms the state for one evaluation, clearing any stale signal and
    /// starting the time limit (in seconds, 0 for none).
    pub fn arm(&mut self, time_limit: u64) {
        self.flag.store(false, Ordering::SeqCst);
        self.deadline = if time_limit > 0 {
            Some(Instant::now() + Duration::from_secs(time_limit))
        } else {
            None
        };
    }

    /// Checks for cancellation.
    ///
    /// # Errors
    ///
    /// A run-time error when interrupted or past the deadline.
    pub fn check(&self) -> Result<(), EvalError> {
        if self.flag.swap(false, Ordering::SeqCst) {
            return Err(EvalError::exec("interrupted"));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(EvalError::exec("time limit exceeded"));
        }
        Ok(())
    }
}
