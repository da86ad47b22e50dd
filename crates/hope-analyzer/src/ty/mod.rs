//! Type inference.
//!
//! Inference works on a separate arena of mutable cells, distinct from
//! both the resolved [`Type`] terms of declarations and the evaluator's
//! value cells. Unification proceeds by direct modification of cells,
//! recording every change on a trail so a failed unification undoes
//! everything. Type synonyms are expanded on demand, memoized per
//! expansion so equirecursive synonyms tie into cyclic cell graphs
//! instead of diverging.

pub mod display;
pub mod infer;

use hope_ast::{DefTypeId, QType, Type};

use crate::defs::TypeBody;
use crate::module::ModuleEnv;

/// Index of an inference cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TyCellId(u32);

impl TyCellId {
    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize { self.0 as usize }
}

/// An inference cell.
#[derive(Debug, Clone)]
pub enum TyCell {
    /// An instantiable variable.
    Var,
    /// A non-instantiable variable standing for a universally quantified
    /// variable of a declared type; unifies only with itself.
    Frozen,
    /// An instantiated cell.
    Ref(TyCellId),
    /// A constructed type: `abbr` is the shallowest synonym-equivalent
    /// presentation, `full` the fully expanded one. Both point to `Sub`
    /// cells and start out identical.
    Cons {
        /// Shallowest known presentation.
        abbr: TyCellId,
        /// Fully expanded form.
        full: TyCellId,
    },
    /// A constructor application: head and argument list.
    Sub {
        /// The declared head.
        head: DefTypeId,
        /// The argument list, a `List` chain.
        args: Option<TyCellId>,
    },
    /// One link of an argument list.
    List {
        /// The element.
        head: TyCellId,
        /// The rest of the list.
        tail: Option<TyCellId>,
    },
    /// A μ-fixpoint's self-reference (also the result of unifying a
    /// variable with itself).
    Void,
    /// Expansion marker for data-type arguments being visited.
    Visited,
}

/// One memoized synonym expansion.
#[derive(Debug, Clone, Copy)]
struct Memo {
    syn: DefTypeId,
    args: Option<TyCellId>,
    value: TyCellId,
}

/// The inference-cell arena, with its trail.
///
/// The arena is reset at the start of each top-level check; cells for
/// the last inferred type stay alive until then so the printer can
/// reach them.
#[derive(Debug, Default)]
pub struct TyArena {
    cells: Vec<TyCell>,
    trail: Vec<(TyCellId, TyCell)>,
    /// Print numbering of variables, assigned on first display.
    var_numbers: rustc_hash::FxHashMap<TyCellId, usize>,
    next_var_number: usize,
}

impl TyArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Discards all cells; called at each top-level check.
    pub fn reset(&mut self) {
        self.cells.clear();
        self.trail.clear();
        self.var_numbers.clear();
        self.next_var_number = 0;
    }

    fn alloc(&mut self, cell: TyCell) -> TyCellId {
        let id = TyCellId(self.cells.len() as u32);
        self.cells.push(cell);
        id
    }

    /// Reads a cell without dereferencing.
    #[must_use]
    pub fn get(&self, id: TyCellId) -> &TyCell { &self.cells[id.index()] }

    /// A fresh instantiable variable.
    pub fn new_tvar(&mut self) -> TyCellId { self.alloc(TyCell::Var) }

    /// A fresh frozen variable.
    pub fn new_frozen(&mut self) -> TyCellId { self.alloc(TyCell::Frozen) }

    /// A fresh void cell.
    pub fn new_void(&mut self) -> TyCellId { self.alloc(TyCell::Void) }

    /// An argument-list link.
    pub fn new_tlist(&mut self, head: TyCellId, tail: Option<TyCellId>) -> TyCellId {
        self.alloc(TyCell::List { head, tail })
    }

    /// A constructed type whose abbreviated and full forms coincide.
    pub fn new_tcons(&mut self, head: DefTypeId, args: Option<TyCellId>) -> TyCellId {
        let sub = self.alloc(TyCell::Sub { head, args });
        self.alloc(TyCell::Cons { abbr: sub, full: sub })
    }

    /// Follows `Ref` chains to a constructor or an uninstantiated
    /// variable.
    #[must_use]
    pub fn deref(&self, mut id: TyCellId) -> TyCellId {
        while let TyCell::Ref(next) = self.cells[id.index()] {
            id = next;
        }
        id
    }

    fn set(&mut self, id: TyCellId, cell: TyCell) { self.cells[id.index()] = cell; }

    /// Points `var` at `ty`, recording the old contents on the trail.
    fn assign(&mut self, var: TyCellId, ty: TyCellId) {
        self.trail.push((var, self.cells[var.index()].clone()));
        if ty == var {
            self.set(var, TyCell::Void);
        } else {
            self.set(var, TyCell::Ref(ty));
        }
    }

    /// Identification during expansion: permanent, not trailed. The
    /// deeper (more abbreviated) presentation is propagated onto the
    /// expansion so inferred types print through the synonym.
    fn assign_no_trail(&mut self, env: &ModuleEnv, from: TyCellId, to: TyCellId) {
        if from == to {
            self.set(from, TyCell::Void);
            return;
        }
        if let (TyCell::Cons { abbr: from_abbr, .. }, TyCell::Cons { abbr: to_abbr, .. }) =
            (self.cells[from.index()].clone(), self.cells[to.index()].clone())
        {
            if self.sub_depth(env, to_abbr) < self.sub_depth(env, from_abbr) {
                if let TyCell::Cons { abbr, .. } = &mut self.cells[to.index()] {
                    *abbr = from_abbr;
                }
            }
        }
        self.set(from, TyCell::Ref(to));
    }

    fn sub_depth(&self, env: &ModuleEnv, sub: TyCellId) -> u32 {
        match self.cells[sub.index()] {
            TyCell::Sub { head, .. } => env.deftype(head).syn_depth,
            _ => 0,
        }
    }

    // ---- unification ----

    /// Unifies two cells. On failure every trailed mutation is undone;
    /// on success the instantiations stay.
    pub fn unify(&mut self, env: &ModuleEnv, a: TyCellId, b: TyCellId) -> bool {
        let mark = self.trail.len();
        if self.real_unify(env, a, b) {
            self.trail.truncate(mark);
            return true;
        }
        while self.trail.len() > mark {
            let (id, old) = self.trail.pop().expect("trail entry");
            self.set(id, old);
        }
        false
    }

    fn real_unify(&mut self, env: &ModuleEnv, a: TyCellId, b: TyCellId) -> bool {
        let a = self.deref(a);
        let b = self.deref(b);
        if a == b {
            return true;
        }
        // A variable on either side succeeds by instantiation.
        if matches!(self.get(a), TyCell::Var) {
            self.assign(a, b);
            return true;
        }
        if matches!(self.get(b), TyCell::Var) {
            self.assign(b, a);
            return true;
        }
        // Distinct frozen variables never unify.
        if matches!(self.get(a), TyCell::Frozen) || matches!(self.get(b), TyCell::Frozen) {
            return false;
        }
        // Void only unifies with void.
        if matches!(self.get(a), TyCell::Void) {
            return matches!(self.get(b), TyCell::Void);
        }
        if matches!(self.get(b), TyCell::Void) {
            return false;
        }
        let (TyCell::Cons { full: full_a, .. }, TyCell::Cons { full: full_b, .. }) =
            (self.get(a).clone(), self.get(b).clone())
        else {
            return false;
        };
        let (TyCell::Sub { head: head_a, args: args_a }, TyCell::Sub { head: head_b, args: args_b }) =
            (self.get(full_a).clone(), self.get(full_b).clone())
        else {
            return false;
        };
        if head_a != head_b {
            return false;
        }
        // Unification of regular trees: identify the cells before
        // looking at the arguments, so recursive structure terminates.
        self.identify(env, a, b);
        let mut args_a = args_a;
        let mut args_b = args_b;
        while let Some(list_a) = args_a {
            let Some(list_b) = args_b else { return false };
            let (TyCell::List { head: ha, tail: ta }, TyCell::List { head: hb, tail: tb }) =
                (self.get(list_a).clone(), self.get(list_b).clone())
            else {
                return false;
            };
            if !self.real_unify(env, ha, hb) {
                return false;
            }
            args_a = ta;
            args_b = tb;
        }
        args_b.is_none()
    }

    /// Identifies two constructed types by pointing the one whose
    /// presentation is shallower at the other, keeping printed forms
    /// compact.
    fn identify(&mut self, env: &ModuleEnv, a: TyCellId, b: TyCellId) {
        let (TyCell::Cons { abbr: abbr_a, .. }, TyCell::Cons { abbr: abbr_b, .. }) =
            (self.get(a).clone(), self.get(b).clone())
        else {
            return;
        };
        if self.sub_depth(env, abbr_a) < self.sub_depth(env, abbr_b) {
            self.assign(a, b);
        } else {
            self.assign(b, a);
        }
    }

    /// Is the declared type at least as general as the inferred cell?
    pub fn instance(&mut self, env: &ModuleEnv, declared: &QType, inferred: TyCellId) -> bool {
        let frozen = self.copy_type(env, &declared.ty, declared.ntvars, true);
        self.unify(env, inferred, frozen)
    }

    /// Whether `declared` is at least as general as `other` (both
    /// declared types); used when a constructor fulfils a declaration.
    pub fn ty_instance(&mut self, env: &ModuleEnv, declared: &QType, other: &QType) -> bool {
        self.reset();
        let other_cells = self.copy_type(env, &other.ty, other.ntvars, false);
        self.instance(env, declared, other_cells)
    }

    // ---- copying declared types into cells ----

    /// Produces a fresh cell graph for a declared type, instantiating
    /// its `n` quantified variables fresh (frozen or not), back-patching
    /// μ-fixpoints, and expanding synonyms on the way out.
    pub fn copy_type(&mut self, env: &ModuleEnv, ty: &Type, ntvars: u32, frozen: bool) -> TyCellId {
        let mut args = None;
        for _ in 0..ntvars {
            let var = if frozen { self.new_frozen() } else { self.new_tvar() };
            args = Some(self.new_tlist(var, args));
        }
        let mut mu_stack = Vec::new();
        let copied = self.cp_type(ty, args, &mut mu_stack);
        self.expand_type(env, copied)
    }

    fn cp_type(
        &mut self,
        ty: &Type,
        args: Option<TyCellId>,
        mu_stack: &mut Vec<TyCellId>,
    ) -> TyCellId {
        match ty {
            Type::Var { index, mu_bound, .. } => {
                let cell = if *mu_bound {
                    mu_stack[mu_stack.len() - 1 - *index as usize]
                } else {
                    self.arg_lookup(args, *index)
                };
                self.deref(cell)
            }
            Type::Mu { body, .. } => {
                let fix = self.new_void();
                mu_stack.push(fix);
                let value = self.cp_type(body, args, mu_stack);
                let _ = mu_stack.pop();
                if value != fix {
                    self.set(fix, TyCell::Ref(value));
                }
                value
            }
            Type::Cons { deftype, args: ty_args, .. } => {
                let list = self.cp_list(ty_args, args, mu_stack);
                self.new_tcons(*deftype, list)
            }
        }
    }

    fn cp_list(
        &mut self,
        tys: &[Type],
        args: Option<TyCellId>,
        mu_stack: &mut Vec<TyCellId>,
    ) -> Option<TyCellId> {
        let mut list = None;
        for ty in tys.iter().rev() {
            let head = self.cp_type(ty, args, mu_stack);
            list = Some(self.new_tlist(head, list));
        }
        list
    }

    fn arg_lookup(&self, mut args: Option<TyCellId>, index: u32) -> TyCellId {
        for _ in 0..index {
            let TyCell::List { tail, .. } = self.cells[args.expect("argument list").index()]
            else {
                unreachable!("argument lists are List chains")
            };
            args = tail;
        }
        match self.cells[args.expect("argument list").index()] {
            TyCell::List { head, .. } => head,
            _ => unreachable!("argument lists are List chains"),
        }
    }

    // ---- synonym expansion ----

    /// Expands synonyms throughout a cell graph. Memoized on the
    /// synonym and its argument list so equirecursive synonyms close
    /// into cycles.
    pub fn expand_type(&mut self, env: &ModuleEnv, ty: TyCellId) -> TyCellId {
        let mut memo = Vec::new();
        self.expand_aux(env, ty, &mut memo, 0);
        self.deref(ty)
    }

    fn expand_aux(&mut self, env: &ModuleEnv, ty: TyCellId, memo: &mut Vec<Memo>, depth: usize) {
        let ty = self.deref(ty);
        let TyCell::Cons { full, .. } = self.get(ty).clone() else { return };
        let TyCell::Sub { head, args } = self.get(full).clone() else { return };
        if env.deftype(head).syn_depth == 0 {
            // A data (or abstract) constructor: expand the arguments,
            // marking this cell against recursive re-entry.
            let saved = self.get(ty).clone();
            self.set(ty, TyCell::Visited);
            let mut list = args;
            while let Some(link) = list {
                let TyCell::List { head: elem, tail } = self.get(link).clone() else { break };
                self.expand_aux(env, elem, memo, depth);
                list = tail;
            }
            self.set(ty, saved);
            return;
        }
        // A synonym: reuse an earlier expansion of the same application.
        for entry in memo[..depth.min(memo.len())].iter() {
            if entry.syn == head && self.same_args(args, entry.args) {
                let value = self.deref(entry.value);
                self.assign_no_trail(env, ty, value);
                return;
            }
        }
        let TypeBody::Synonym(body) = env.deftype(head).body.clone() else { return };
        let mut mu_stack = Vec::new();
        let newtype = self.cp_type(&body, args, &mut mu_stack);
        self.assign_no_trail(env, ty, newtype);
        memo.truncate(depth);
        memo.push(Memo { syn: head, args, value: newtype });
        self.expand_aux(env, newtype, memo, depth + 1);
    }

    /// Argument lists of the same synonym have the same length; compare
    /// element identity.
    fn same_args(&self, mut a: Option<TyCellId>, mut b: Option<TyCellId>) -> bool {
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(la), Some(lb)) => {
                    let (
                        TyCell::List { head: ha, tail: ta },
                        TyCell::List { head: hb, tail: tb },
                    ) = (self.get(la).clone(), self.get(lb).clone())
                    else {
                        return false;
                    };
                    if ha != hb {
                        return false;
                    }
                    a = ta;
                    b = tb;
                }
                _ => return false,
            }
        }
    }

    // ---- convenience constructors used by inference ----

    /// `from -> to`.
    pub fn func_type(&mut self, env: &ModuleEnv, from: TyCellId, to: TyCellId) -> TyCellId {
        let function = env.std.function.expect("'->' is defined");
        let tail = self.new_tlist(to, None);
        let list = self.new_tlist(from, Some(tail));
        self.new_tcons(function, Some(list))
    }

    /// `left # right`.
    pub fn prod_type(&mut self, env: &ModuleEnv, left: TyCellId, right: TyCellId) -> TyCellId {
        let product = env.std.product.expect("'#' is defined");
        let tail = self.new_tlist(right, None);
        let list = self.new_tlist(left, Some(tail));
        self.new_tcons(product, Some(list))
    }

    /// `list element`, expanded in case `list` is a synonym.
    pub fn list_type(&mut self, env: &ModuleEnv, element: TyCellId) -> TyCellId {
        let list = env.std.list.expect("'list' is defined");
        let link = self.new_tlist(element, None);
        let ty = self.new_tcons(list, Some(link));
        self.expand_type(env, ty)
    }

    /// A nullary constructor application.
    pub fn const_type(&mut self, deftype: DefTypeId) -> TyCellId { self.new_tcons(deftype, None) }

    /// The argument cells of a dereferenced constructed type.
    #[must_use]
    pub fn cons_args(&self, id: TyCellId) -> Vec<TyCellId> {
        let id = self.deref(id);
        let TyCell::Cons { full, .. } = self.get(id) else { return Vec::new() };
        let TyCell::Sub { args, .. } = self.get(*full).clone() else { return Vec::new() };
        let mut out = Vec::new();
        let mut list = args;
        while let Some(link) = list {
            let TyCell::List { head, tail } = self.get(link).clone() else { break };
            out.push(head);
            list = tail;
        }
        out
    }

    /// The result side of a dereferenced function-type cell.
    #[must_use]
    pub fn func_result(&self, id: TyCellId) -> Option<TyCellId> {
        let id = self.deref(id);
        let TyCell::Cons { full, .. } = self.get(id) else { return None };
        let TyCell::Sub { args: Some(list), .. } = self.get(*full) else { return None };
        let TyCell::List { tail: Some(tail), .. } = self.get(*list) else { return None };
        match self.get(*tail) {
            TyCell::List { head, .. } => Some(*head),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hope_ast::Interner;
    use hope_ast::Name;

    fn test_env() -> (ModuleEnv, Interner) {
        let mut pool = Interner::new();
        let session: Name = pool.intern("<Session>");
        (ModuleEnv::new(session), pool)
    }

    #[test]
    fn variables_unify_and_undo() {
        let (env, _) = test_env();
        let mut tys = TyArena::new();
        let a = tys.new_tvar();
        let b = tys.new_frozen();
        let c = tys.new_frozen();
        assert!(tys.unify(&env, a, b));
        assert_eq!(tys.deref(a), b);
        // b and c are distinct frozen variables: failure must undo the
        // earlier instantiation of nothing (a is already bound).
        assert!(!tys.unify(&env, b, c));
        assert_eq!(tys.deref(a), b);
    }

    #[test]
    fn failed_unification_restores_cells() {
        let (mut env, mut pool) = test_env();
        let dt_a = env.alloc_deftype(crate::defs::DefType {
            name: pool.intern("t0"),
            arity: 0,
            tupled: false,
            params: vec![],
            polarity: vec![],
            body: TypeBody::Abstract,
            syn_depth: 0,
            private_mark: None,
        });
        let dt_b = env.alloc_deftype(crate::defs::DefType {
            name: pool.intern("t1"),
            arity: 0,
            tupled: false,
            params: vec![],
            polarity: vec![],
            body: TypeBody::Abstract,
            syn_depth: 0,
            private_mark: None,
        });
        let mut tys = TyArena::new();
        let var = tys.new_tvar();
        let ta = tys.const_type(dt_a);
        let tb = tys.const_type(dt_b);
        // var ~ t0 succeeds inside the failing outer attempt only if we
        // unify pairwise; simulate by a two-step sequence.
        assert!(tys.unify(&env, var, ta));
        assert!(!tys.unify(&env, tys.deref(var), tb));
        assert!(matches!(tys.get(tys.deref(var)), TyCell::Cons { .. }));
    }

    #[test]
    fn self_unification_makes_void() {
        let (env, _) = test_env();
        let mut tys = TyArena::new();
        let a = tys.new_tvar();
        let b = tys.new_tvar();
        assert!(tys.unify(&env, a, b));
        // Both now reach the same cell; unifying again is trivial.
        assert!(tys.unify(&env, a, b));
    }
}
