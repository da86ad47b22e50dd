//! Name resolution, the module system and type inference for the Hope
//! interpreter.
//!
//! The analysis layer owns the permanent tables (declared types, data
//! constructors, value names, operators, type variables), organised in a
//! module graph with `uses` closure, private shadow modules and
//! save/restore bookkeeping. On top of the tables sit:
//!
//! - **Declarations** ([`declare`]): `data`/`type`/`abstype` processing,
//!   surface-type resolution, synonym depths, qualified types
//! - **Recursion checks** ([`rectype`]): head-recursion and regularity,
//!   parameter polarities
//! - **Name resolution** ([`resolve`]): scope tracking, pattern paths,
//!   and the rewriting of identifier occurrences
//! - **Type inference** ([`ty`]): unification over mutable cells with
//!   trail undo, memoized synonym expansion, μ-copying, instance checks
//!   and the cell printer

pub mod declare;
pub mod defs;
pub mod module;
pub mod rectype;
pub mod resolve;
pub mod ty;

pub use declare::{Declarer, MAX_SYN_DEPTH};
pub use defs::{Cons, DefType, Func, FuncFlags, Polarity, TypeBody};
pub use module::{IdSet, Module, ModuleEnv, StdNames, ORDINARY, SESSION, STANDARD};
pub use resolve::{ResolveError, Resolver};
pub use ty::infer::{Inference, Trace, TypeError};
pub use ty::{TyArena, TyCell, TyCellId};

use hope_ast::Interner;
use hope_source::{Diagnostic, ErrorKind};

/// Verifies that `Standard` declared everything the interpreter needs.
///
/// # Errors
///
/// Reports a library error naming the first missing definition.
pub fn check_type_defs(env: &mut ModuleEnv, interner: &Interner) -> Result<(), Diagnostic> {
    let missing = |what: &str| {
        Diagnostic::new(ErrorKind::Library, format!("{what}: standard type not defined"))
    };
    if env.std.function.is_none() {
        return Err(missing("->"));
    }
    if env.std.product.is_none() {
        return Err(missing("#"));
    }
    if env.std.truval.is_none() {
        return Err(missing("bool"));
    }
    if env.std.num.is_none() {
        return Err(missing("num"));
    }
    if env.std.list.is_none() {
        return Err(missing("list"));
    }
    if env.std.character.is_none() {
        return Err(missing("char"));
    }
    for (cons, name) in [
        (env.std.nil, "nil"),
        (env.std.cons, "::"),
        (env.std.succ, "succ"),
    ] {
        if cons.is_none() {
            return Err(Diagnostic::new(
                ErrorKind::Library,
                format!("{name}: standard constructor not defined"),
            ));
        }
    }
    let id_name = interner
        .lookup("id")
        .and_then(|name| env.fn_local(name))
        .ok_or_else(|| {
            Diagnostic::new(ErrorKind::Library, "id: standard function not defined")
        })?;
    env.std.id_fn = Some(id_name);
    Ok(())
}
