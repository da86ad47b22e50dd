//! Core data model for the Hope interpreter.
//!
//! This crate holds the representations shared by every stage of the
//! pipeline:
//!
//! - Interned identifiers ([`intern::Interner`], [`intern::Name`])
//! - Value paths ([`path::Path`]) naming positions inside values
//! - The expression arena ([`expr::ExprArena`]) with branches and formals
//! - Surface and resolved type terms ([`types`])
//! - Operator declarations and the lookup seam ([`op`])
//! - Compiled decision trees ([`cases`])
//!
//! Stages address nodes through index ids (`ExprId`, `CaseId`, …) so that
//! name resolution and pattern compilation can rewrite shared structures
//! in place.

pub mod cases;
pub mod expr;
pub mod ids;
pub mod intern;
pub mod op;
pub mod path;
pub mod types;

pub use cases::{CaseArena, CaseId, LCase, UCase};
pub use expr::{Branch, Expr, ExprArena, ExprId, Formal, LambdaKind, SugarKind};
pub use ids::{ConsId, DefTypeId, FuncId, ModuleId};
pub use intern::{Interner, Name};
pub use op::{Assoc, Op, OpResolver};
pub use path::{Dir, Path, PathBuilder};
pub use types::{QType, Type, TypeExpr};
