//! The Hope runtime: evaluation cells, the lazy evaluator, builtins,
//! printers, and the session driver.
//!
//! Evaluation reduces expressions against compiled decision trees using
//! call-by-need cells: suspensions, partial applications and pending
//! projections, each updated in place with its weak head normal form
//! when forced. The [`session::Session`] ties the whole pipeline
//! together, reading items from a source stack and carrying every error
//! back to the reporter.

pub mod builtins;
pub mod compare;
pub mod error;
pub mod eval;
pub mod functors;
pub mod heap;
pub mod interrupt;
pub mod print;
pub mod session;
pub mod streams;

pub use error::EvalError;
pub use eval::Evaluator;
pub use heap::{Cell, CellId, Env, Heap, StreamId};
pub use interrupt::Interrupt;
pub use session::{LineSource, Options, ReadSource, RtNames, Session};
pub use streams::Streams;
