//! Printing of types: declared type terms, declarations, and inference
//! cells.
//!
//! Inference variables are named after the type variables visible in the
//! current module, with primes added when the declared ones run out; the
//! numbering lives in the arena so one diagnostic names a variable
//! consistently across its detail lines. Recursive cell structures print
//! as `mu v => …`.

use std::collections::HashSet;

use hope_ast::op::prec;
use hope_ast::{Interner, Name, OpResolver, Type};

use super::{TyArena, TyCell, TyCellId};
use crate::defs::TypeBody;
use crate::module::ModuleEnv;

impl TyArena {
    /// The print number of a variable cell, assigned on first use.
    pub fn var_number(&mut self, id: TyCellId) -> usize {
        if let Some(&n) = self.var_numbers.get(&id) {
            return n;
        }
        let n = self.next_var_number;
        self.next_var_number += 1;
        let _ = self.var_numbers.insert(id, n);
        n
    }
}

/// Renders an inference cell.
pub fn render_cell(
    tys: &mut TyArena,
    env: &ModuleEnv,
    interner: &Interner,
    cell: TyCellId,
) -> String {
    let mut backrefs = HashSet::new();
    find_backrefs(tys, cell, &mut Vec::new(), &mut HashSet::new(), &mut backrefs);
    let mut printer = CellPrinter { tys, env, interner, backrefs, open: Vec::new() };
    printer.go(cell, prec::BODY)
}

fn find_backrefs(
    tys: &TyArena,
    cell: TyCellId,
    on_path: &mut Vec<TyCellId>,
    seen: &mut HashSet<TyCellId>,
    backrefs: &mut HashSet<TyCellId>,
) {
    let cell = tys.deref(cell);
    if on_path.contains(&cell) {
        let _ = backrefs.insert(cell);
        return;
    }
    if !seen.insert(cell) {
        return;
    }
    if let TyCell::Cons { abbr, .. } = tys.get(cell) {
        if let TyCell::Sub { args, .. } = tys.get(*abbr).clone() {
            on_path.push(cell);
            let mut list = args;
            while let Some(link) = list {
                let TyCell::List { head, tail } = tys.get(link).clone() else { break };
                find_backrefs(tys, head, on_path, seen, backrefs);
                list = tail;
            }
            let _ = on_path.pop();
        }
    }
}

struct CellPrinter<'a> {
    tys: &'a mut TyArena,
    env: &'a ModuleEnv,
    interner: &'a Interner,
    backrefs: HashSet<TyCellId>,
    open: Vec<TyCellId>,
}

impl CellPrinter<'_> {
    fn var_name(&mut self, cell: TyCellId) -> String {
        let n = self.tys.var_number(cell);
        self.env.tvar_display(self.interner, n)
    }

    fn go(&mut self, cell: TyCellId, context: i32) -> String {
        let cell = self.tys.deref(cell);
        match self.tys.get(cell).clone() {
            TyCell::Var | TyCell::Frozen | TyCell::Void => self.var_name(cell),
            TyCell::Cons { abbr, .. } => {
                if self.open.contains(&cell) {
                    return self.var_name(cell);
                }
                let TyCell::Sub { head, args } = self.tys.get(abbr).clone() else {
                    return "?".to_string();
                };
                let recursive = self.backrefs.contains(&cell);
                if recursive {
                    self.open.push(cell);
                }
                let mut arg_cells = Vec::new();
                let mut list = args;
                while let Some(link) = list {
                    let TyCell::List { head: elem, tail } = self.tys.get(link).clone() else {
                        break;
                    };
                    arg_cells.push(elem);
                    list = tail;
                }
                let dt = self.env.deftype(head);
                let name = dt.name;
                let tupled = dt.tupled;
                let own = if arg_cells.is_empty() {
                    prec::ATOMIC
                } else if let Some(op) = self.infix_of(name, &arg_cells) {
                    op.level()
                } else {
                    prec::APPLY
                };
                let mut out = if let Some(op) = self.infix_of(name, &arg_cells) {
                    let left = self.go(arg_cells[0], op.left_level());
                    let right = self.go(arg_cells[1], op.right_level());
                    format!("{left} {} {right}", self.interner.text(name))
                } else if tupled && !arg_cells.is_empty() {
                    let args: Vec<String> =
                        arg_cells.iter().map(|&a| self.go(a, prec::BODY)).collect();
                    format!("{} ({})", self.interner.text(name), args.join(", "))
                } else {
                    let mut out = self.interner.text(name).to_string();
                    for &arg in &arg_cells {
                        out.push(' ');
                        out.push_str(&self.go(arg, prec::ARG));
                    }
                    out
                };
                let mut own = own;
                if recursive {
                    let _ = self.open.pop();
                    let var = self.var_name(cell);
                    out = format!("mu {var} => {out}");
                    own = prec::MU;
                }
                if own < context {
                    format!("({out})")
                } else {
                    out
                }
            }
            TyCell::Ref(_) | TyCell::Sub { .. } | TyCell::List { .. } | TyCell::Visited => {
                "?".to_string()
            }
        }
    }

    fn infix_of(&self, name: Name, args: &[TyCellId]) -> Option<hope_ast::Op> {
        if args.len() == 2 {
            self.env.op_lookup(name)
        } else {
            None
        }
    }
}

/// Renders a declared type term.
pub fn render_type(env: &ModuleEnv, interner: &Interner, ty: &Type) -> String {
    type_with_context(env, interner, ty, prec::BODY)
}

fn type_with_context(env: &ModuleEnv, interner: &Interner, ty: &Type, context: i32) -> String {
    let (own, out) = match ty {
        Type::Var { name, .. } => (prec::ATOMIC, interner.text(*name).to_string()),
        Type::Mu { var, body } => {
            let body = type_with_context(env, interner, body, prec::MU);
            (prec::MU, format!("mu {} => {body}", interner.text(*var)))
        }
        Type::Cons { deftype, args, .. } => {
            let dt = env.deftype(*deftype);
            let name_text = interner.text(dt.name).to_string();
            if args.is_empty() {
                (prec::ATOMIC, name_text)
            } else if args.len() == 2 && dt.tupled {
                if let Some(op) = env.op_lookup(dt.name) {
                    let left = type_with_context(env, interner, &args[0], op.left_level());
                    let right = type_with_context(env, interner, &args[1], op.right_level());
                    (op.level(), format!("{left} {name_text} {right}"))
                } else {
                    let parts: Vec<String> = args
                        .iter()
                        .map(|a| type_with_context(env, interner, a, prec::BODY))
                        .collect();
                    (prec::APPLY, format!("{name_text} ({})", parts.join(", ")))
                }
            } else if dt.tupled {
                let parts: Vec<String> = args
                    .iter()
                    .map(|a| type_with_context(env, interner, a, prec::BODY))
                    .collect();
                (prec::APPLY, format!("{name_text} ({})", parts.join(", ")))
            } else {
                let mut out = name_text;
                for arg in args {
                    out.push(' ');
                    out.push_str(&type_with_context(env, interner, arg, prec::ARG));
                }
                (prec::APPLY, out)
            }
        }
    };
    if own < context {
        format!("({out})")
    } else {
        out
    }
}

/// Renders a type declaration as re-parsable source. With `full` false
/// the type prints as an `abstype` line (used before definitions in a
/// dump, and for hidden private structure).
pub fn render_deftype(
    env: &ModuleEnv,
    interner: &Interner,
    dt_id: hope_ast::DefTypeId,
    full: bool,
) -> String {
    let dt = env.deftype(dt_id);
    let keyword = if full && dt.is_synonym() {
        "type"
    } else if full && dt.is_data() {
        "data"
    } else {
        "abstype"
    };
    let abstract_form = keyword == "abstype";
    let param = |i: usize| {
        let name = interner.text(dt.params[i]).to_string();
        if abstract_form {
            let polarity = dt.polarity.get(i).copied().unwrap_or(crate::defs::Polarity::Both);
            let marker = polarity.keyword();
            if marker.is_empty() {
                name
            } else {
                format!("{marker} {name}")
            }
        } else {
            name
        }
    };
    let mut out = format!("{keyword} ");
    let name_text = interner.text(dt.name);
    if dt.arity == 2 && dt.tupled && env.op_lookup(dt.name).is_some() {
        out.push_str(&format!("{} {name_text} {}", param(0), param(1)));
    } else if dt.tupled {
        let params: Vec<String> = (0..dt.params.len()).map(param).collect();
        out.push_str(&format!("{name_text}({})", params.join(", ")));
    } else {
        out.push_str(name_text);
        for i in 0..dt.params.len() {
            out.push(' ');
            out.push_str(&param(i));
        }
    }
    if full {
        match &dt.body {
            TypeBody::Synonym(body) => {
                out.push_str(" == ");
                out.push_str(&render_type(env, interner, body));
            }
            TypeBody::Data(cons_ids) => {
                out.push_str(" == ");
                let alts: Vec<String> =
                    cons_ids.iter().map(|&c| render_alt(env, interner, c)).collect();
                out.push_str(&alts.join(" ++ "));
            }
            TypeBody::Abstract => {}
        }
    }
    out.push(';');
    out
}

fn render_alt(env: &ModuleEnv, interner: &Interner, c: hope_ast::ConsId) -> String {
    let cons = env.cons(c);
    let name_text = interner.text(cons.name).to_string();
    if cons.nargs == 0 {
        return name_text;
    }
    // Walk the arrow chain for the argument types.
    let mut args = Vec::new();
    let mut ty = &cons.ty;
    let function = env.std.function;
    while let Type::Cons { deftype, args: parts, .. } = ty {
        if Some(*deftype) != function || parts.len() != 2 {
            break;
        }
        args.push(&parts[0]);
        ty = &parts[1];
    }
    if cons.nargs == 1 && env.op_lookup(cons.name).is_some() {
        if let Type::Cons { deftype, args: parts, .. } = args[0] {
            if Some(*deftype) == env.std.product && parts.len() == 2 {
                let op = env.op_lookup(cons.name).expect("operator");
                let left = type_with_context(env, interner, &parts[0], op.left_level());
                let right = type_with_context(env, interner, &parts[1], op.right_level());
                return format!("{left} {name_text} {right}");
            }
        }
    }
    let mut out = name_text;
    for arg in args {
        out.push(' ');
        out.push_str(&type_with_context(env, interner, arg, prec::ARG));
    }
    out
}
