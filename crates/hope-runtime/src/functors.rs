//! Value-level functors of declared types.
//!
//! Every type definition also defines a function of the same name: a
//! nullary type maps to the identity, a synonym re-reads its right-hand
//! side as a value expression, and a data type maps the argument
//! functions over each constructor's fields. The generated equations go
//! through the ordinary definition pipeline.

use hope_analyzer::{ModuleEnv, TypeBody};
use hope_ast::expr::MuExpr;
use hope_ast::{DefTypeId, Expr, ExprArena, ExprId, Formal, Interner, Name, Type};

/// Display names for generated constructor-field variables; fresh names
/// are minted so they can never capture the type parameters.
const FIELD_VARS: [&str; 26] = [
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
    "s", "t", "u", "v", "w", "x", "y", "z",
];

/// Generates the defining equations of a type's functor as
/// `(left-hand side, right-hand side)` expression pairs.
pub fn functor_defs(
    exprs: &mut ExprArena,
    env: &ModuleEnv,
    interner: &mut Interner,
    dt_id: DefTypeId,
) -> Vec<(ExprId, ExprId)> {
    let dt = env.deftype(dt_id);
    let name = dt.name;
    let params = dt.params.clone();
    let tupled = dt.tupled;
    match dt.body.clone() {
        _ if dt.arity == 0 => {
            // A nullary type T gives `--- T x <= x;`.
            let x = interner.fresh("x");
            let head = exprs.var(name);
            let formal = exprs.var(x);
            let lhs = exprs.apply(head, formal);
            let rhs = exprs.var(x);
            vec![(lhs, rhs)]
        }
        TypeBody::Synonym(body) => {
            // `type T(a…) == t;` gives `--- T(a…) <= t;` with the
            // right-hand type re-read as a value expression.
            let lhs = functor_head(exprs, env, name, &params, tupled);
            let rhs = expr_of_type(exprs, env, &body);
            vec![(lhs, rhs)]
        }
        TypeBody::Data(cons_ids) => {
            // One equation per constructor, mapping each field with the
            // expression of its declared type.
            let mut defs = Vec::with_capacity(cons_ids.len());
            for c in cons_ids {
                let cons = env.cons(c);
                let nargs = cons.nargs as usize;
                let fields: Vec<Name> = (0..nargs)
                    .map(|i| interner.fresh(FIELD_VARS[i % FIELD_VARS.len()]))
                    .collect();
                let head = functor_head(exprs, env, name, &params, tupled);
                let mut pattern = exprs.cons(c);
                for &field in &fields {
                    let var = exprs.var(field);
                    pattern = exprs.apply(pattern, var);
                }
                let lhs = exprs.apply(head, pattern);

                let mut body = exprs.cons(c);
                let mut field_ty = &cons.ty;
                for &field in &fields {
                    let Type::Cons { args, .. } = field_ty else { break };
                    let mapper = expr_of_type(exprs, env, &args[0]);
                    let var = exprs.var(field);
                    let mapped = exprs.apply(mapper, var);
                    body = exprs.apply(body, mapped);
                    field_ty = &args[1];
                }
                defs.push((lhs, body));
            }
            defs
        }
        TypeBody::Abstract => Vec::new(),
    }
}

/// `T a1 … an` or `T(a1, …, an)` as a left-hand side head.
fn functor_head(
    exprs: &mut ExprArena,
    _env: &ModuleEnv,
    name: Name,
    params: &[Name],
    tupled: bool,
) -> ExprId {
    let head = exprs.var(name);
    if tupled {
        let args = pair_chain(exprs, params);
        exprs.apply(head, args)
    } else {
        let mut out = head;
        for &param in params {
            let var = exprs.var(param);
            out = exprs.apply(out, var);
        }
        out
    }
}

fn pair_chain(exprs: &mut ExprArena, names: &[Name]) -> ExprId {
    let mut iter = names.iter().rev();
    let mut out = exprs.var(*iter.next().expect("tupled parameters"));
    for &name in iter {
        let left = exprs.var(name);
        out = exprs.pair(left, out);
    }
    out
}

/// A type term as a value expression over the functors of its
/// constructors.
fn expr_of_type(exprs: &mut ExprArena, env: &ModuleEnv, ty: &Type) -> ExprId {
    match ty {
        Type::Var { name, .. } => exprs.var(*name),
        Type::Mu { var, body } => {
            let pattern = exprs.var(*var);
            let body = expr_of_type(exprs, env, body);
            exprs.alloc(Expr::Mu(MuExpr { formal: Formal::new(pattern), body }))
        }
        Type::Cons { deftype, args, .. } => {
            let dt = env.deftype(*deftype);
            let head = exprs.var(dt.name);
            if dt.tupled && !args.is_empty() {
                let parts: Vec<ExprId> =
                    args.iter().map(|arg| expr_of_type(exprs, env, arg)).collect();
                let mut iter = parts.into_iter().rev();
                let mut chain = iter.next().expect("tupled arguments");
                for part in iter {
                    chain = exprs.pair(part, chain);
                }
                exprs.apply(head, chain)
            } else {
                let mut out = head;
                for arg in args {
                    let part = expr_of_type(exprs, env, arg);
                    out = exprs.apply(out, part);
                }
                out
            }
        }
    }
}
