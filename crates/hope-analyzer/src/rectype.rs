//! Admissibility of recursive type declarations and parameter
//! polarities.
//!
//! A declaration may refer to itself only through a productive position:
//! the defining constructor must not be the head of the whole body
//! (reached through synonym expansion), and every recursive use must
//! repeat the formal parameters exactly, which keeps the infinite
//! expansion a regular tree.

use hope_ast::{DefTypeId, Interner, Name, Type};
use hope_source::{Diagnostic, ErrorKind};

use crate::defs::{DefType, Polarity, TypeBody};
use crate::module::ModuleEnv;

/// Whether the head-expansion of `ty` reaches `deftype`.
#[must_use]
pub fn is_header(env: &ModuleEnv, ty: &Type, deftype: DefTypeId) -> bool {
    match ty {
        Type::Var { .. } => false,
        Type::Mu { body, .. } => is_header(env, body, deftype),
        Type::Cons { deftype: head, .. } => {
            if *head == deftype {
                return true;
            }
            match &env.deftype(*head).body {
                TypeBody::Synonym(body) => is_header(env, body, deftype),
                _ => false,
            }
        }
    }
}

/// Checks that every recursive use of `deftype` within `ty` repeats the
/// formal parameters verbatim.
///
/// # Errors
///
/// Reports a semantic error for a non-regular recursive use.
pub fn bad_rectype(
    env: &ModuleEnv,
    interner: &Interner,
    deftype: DefTypeId,
    ty: &Type,
) -> Result<(), Diagnostic> {
    match ty {
        Type::Var { .. } => Ok(()),
        Type::Mu { body, .. } => bad_rectype(env, interner, deftype, body),
        Type::Cons { deftype: head, args, .. } => {
            if *head == deftype && !args_are_params(args) {
                return Err(Diagnostic::new(
                    ErrorKind::Semantic,
                    format!(
                        "'{}': recursive use must repeat the type parameters",
                        interner.text(env.deftype(deftype).name)
                    ),
                ));
            }
            for arg in args {
                bad_rectype(env, interner, deftype, arg)?;
            }
            Ok(())
        }
    }
}

fn args_are_params(args: &[Type]) -> bool {
    args.iter().enumerate().all(|(i, arg)| {
        matches!(arg, Type::Var { index, mu_bound: false, .. } if *index == i as u32)
    })
}

/// Computes the polarity of each of `nparams` parameters over the given
/// field types.
///
/// Parameters occurring only under a μ-quantifier are conservatively
/// recorded as mixed.
pub fn compute<'t>(
    env: &ModuleEnv,
    cur: DefTypeId,
    nparams: usize,
    tys: impl Iterator<Item = &'t Type>,
) -> Vec<Polarity> {
    let mut polarity = vec![Polarity::None; nparams];
    for ty in tys {
        walk(env, cur, ty, Polarity::Pos, &mut polarity);
    }
    polarity
}

fn walk(env: &ModuleEnv, cur: DefTypeId, ty: &Type, variance: Polarity, out: &mut Vec<Polarity>) {
    match ty {
        Type::Var { index, mu_bound, .. } => {
            if !mu_bound {
                let i = *index as usize;
                if i < out.len() {
                    out[i] = out[i].join(variance);
                }
            }
        }
        Type::Mu { body, .. } => walk(env, cur, body, Polarity::Both, out),
        Type::Cons { deftype, args, .. } => {
            for (j, arg) in args.iter().enumerate() {
                let position = if *deftype == cur {
                    // The declaration's own polarities are what this walk
                    // is computing; recursive uses repeat the parameters,
                    // so their positions are covariant.
                    Polarity::Pos
                } else {
                    env.deftype(*deftype)
                        .polarity
                        .get(j)
                        .copied()
                        .unwrap_or(Polarity::Both)
                };
                walk(env, cur, arg, variance.compose(position), out);
            }
        }
    }
}

/// Checks that freshly computed polarities fit a previous declaration.
///
/// # Errors
///
/// Reports a semantic error when a parameter's use widens.
pub fn check_preserved(
    interner: &Interner,
    declared: &DefType,
    computed: &[Polarity],
) -> Result<(), Diagnostic> {
    for (i, &new) in computed.iter().enumerate() {
        let old = declared.polarity.get(i).copied().unwrap_or(Polarity::Both);
        if !new.within(old) {
            let param: Name = declared.params.get(i).copied().unwrap_or(declared.name);
            return Err(Diagnostic::new(
                ErrorKind::Semantic,
                format!(
                    "'{}': polarity of parameter '{}' does not match its declaration",
                    interner.text(declared.name),
                    interner.text(param)
                ),
            ));
        }
    }
    Ok(())
}
