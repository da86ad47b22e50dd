//! Pattern-match compilation.
//!
//! Each equation of a function or lambda is flattened into a *match
//! list* (the sequence of atomic discriminations its patterns require,
//! each at a `(level, path)` scrutinee position) and then merged into
//! the decision tree built from the earlier equations. At every shared
//! scrutinee position only one test is emitted; alternatives share the
//! same default, and a more specific equation (one requiring more
//! atomic discriminations) displaces a less specific success it
//! subsumes.

mod merge;

use hope_analyzer::ModuleEnv;
use hope_ast::cases::{NUM_EQUAL, NUM_GREATER};
use hope_ast::path::PathBuilder;
use hope_ast::{Branch, CaseArena, CaseId, Dir, Expr, ExprArena, ExprId};

pub use merge::Discriminant;
use merge::{MatchEntry, Merge};

/// Compiles pattern matches into decision trees.
pub struct Compiler<'a> {
    exprs: &'a mut ExprArena,
    env: &'a ModuleEnv,
    cases: &'a mut CaseArena,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler over the shared arenas.
    pub fn new(exprs: &'a mut ExprArena, env: &'a ModuleEnv, cases: &'a mut CaseArena) -> Self {
        Self { exprs, env, cases }
    }

    /// Compiles every lambda in an expression.
    pub fn comp_expr(&mut self, expr: ExprId) {
        match self.exprs.get(expr).clone() {
            Expr::Lambda(lambda) => {
                let mut code = self.cases.l_nomatch(expr);
                for branch in &lambda.branches {
                    code = self.comp_branch(Some(code), branch);
                }
                if let Expr::Lambda(lambda) = self.exprs.get_mut(expr) {
                    lambda.code = Some(code);
                }
            }
            Expr::Pair(left, right) => {
                self.comp_expr(left);
                self.comp_expr(right);
            }
            Expr::Apply(func, arg) | Expr::Sugar(_, func, arg) => {
                self.comp_expr(func);
                self.comp_expr(arg);
            }
            Expr::Mu(mu) => self.comp_expr(mu.body),
            Expr::Num(_)
            | Expr::Char(_)
            | Expr::Cons(_)
            | Expr::Defun(_)
            | Expr::Param(_)
            | Expr::Var(_)
            | Expr::Plus(_)
            | Expr::Builtin(_)
            | Expr::Math1(_)
            | Expr::Math2(_)
            | Expr::Return => {}
        }
    }

    /// Compiles one equation's body and merges the equation into the
    /// tree so far (`None` for the first equation of a lambda whose
    /// failure terminal the caller supplies through `old`).
    pub fn comp_branch(&mut self, old: Option<CaseId>, branch: &Branch) -> CaseId {
        self.comp_expr(branch.body);
        self.compile(old, branch)
    }

    /// The compilation driver: scan, size, merge.
    fn compile(&mut self, old: Option<CaseId>, branch: &Branch) -> CaseId {
        let mut matches = Vec::new();
        self.scan_formals(branch, &mut matches);
        let size = self.size_formals(branch);
        let new_body = self.cases.success(branch.body, size);
        log::trace!("compiled equation: {} match atoms, size {}", matches.len(), size);
        match old {
            None => new_body,
            Some(old) => Merge::new(self.cases, matches, size, new_body).merge(old),
        }
    }

    // ---- the match list ----

    /// Scans the formals outward-in: the first argument gets the highest
    /// scope level, the last argument level 0.
    fn scan_formals(&mut self, branch: &Branch, out: &mut Vec<MatchEntry>) {
        let arity = branch.formals.len();
        for (i, formal) in branch.formals.iter().enumerate() {
            let level = (arity - 1 - i) as u32;
            self.gen_matches(level, PathBuilder::new(), formal.pattern, out);
        }
    }

    fn add_match(
        &mut self,
        level: u32,
        path: &PathBuilder,
        disc: Discriminant,
        out: &mut Vec<MatchEntry>,
    ) {
        out.push(MatchEntry { level, path: path.reverse(), disc });
    }

    /// Generates the match-list entries for one pattern position.
    fn gen_matches(
        &mut self,
        level: u32,
        path: PathBuilder,
        pattern: ExprId,
        out: &mut Vec<MatchEntry>,
    ) {
        match self.exprs.get(pattern).clone() {
            Expr::Char(c) => self.add_match(level, &path, Discriminant::Character(c), out),
            Expr::Num(n) => self.gen_num_match(level, path, n, out),
            Expr::Cons(c) => {
                debug_assert_eq!(self.env.cons(c).nargs, 0);
                let disc = Discriminant::Algebraic {
                    ncases: self.env.num_cases(c),
                    index: self.env.cons(c).index as usize,
                };
                self.add_match(level, &path, disc, out);
            }
            Expr::Apply(..) => {
                let mut path = path;
                self.gen_match_constr(level, &mut path, 0, pattern, out);
            }
            Expr::Plus(plus) => {
                let mut path = path;
                for _ in 0..plus.incr {
                    self.add_match(level, &path, Discriminant::Numeric(NUM_GREATER), out);
                    path = path.push(Dir::Pred);
                }
                self.gen_matches(level, path, plus.arg, out);
            }
            Expr::Pair(left, right) => {
                self.gen_matches(level, path.clone().push(Dir::Left), left, out);
                self.gen_matches(level, path.push(Dir::Right), right, out);
            }
            Expr::Var(_) => {}
            other => unreachable!("not a pattern: {other:?}"),
        }
    }

    /// A number pattern `k` is `k` successive `> 0` tests ending in a
    /// test against zero, each a `Pred` step further down.
    fn gen_num_match(
        &mut self,
        level: u32,
        path: PathBuilder,
        n: f64,
        out: &mut Vec<MatchEntry>,
    ) {
        if n > 0.0 {
            self.add_match(level, &path, Discriminant::Numeric(NUM_GREATER), out);
            self.gen_num_match(level, path.push(Dir::Pred), n - 1.0, out);
        } else {
            self.add_match(level, &path, Discriminant::Numeric(NUM_EQUAL), out);
        }
    }

    /// A constructor application `c p1 … pk` emits the discriminator for
    /// `c` first, then descends into the arguments along the value
    /// layout `(v1, (v2, … (vk-1, vk)…))`.
    fn gen_match_constr(
        &mut self,
        level: u32,
        path: &mut PathBuilder,
        arity: u32,
        pattern: ExprId,
        out: &mut Vec<MatchEntry>,
    ) {
        match self.exprs.get(pattern).clone() {
            Expr::Cons(c) => {
                if Some(c) == self.env.std.succ {
                    self.add_match(level, path, Discriminant::Numeric(NUM_GREATER), out);
                    *path = path.clone().push(Dir::Pred);
                } else {
                    let disc = Discriminant::Algebraic {
                        ncases: self.env.num_cases(c),
                        index: self.env.cons(c).index as usize,
                    };
                    self.add_match(level, path, disc, out);
                    *path = path.clone().push(Dir::Strip);
                }
            }
            Expr::Apply(func, arg) => {
                self.gen_match_constr(level, path, arity + 1, func, out);
                if arity > 0 {
                    self.gen_matches(level, path.clone().push(Dir::Left), arg, out);
                    *path = path.clone().push(Dir::Right);
                } else {
                    // last argument
                    self.gen_matches(level, path.clone(), arg, out);
                }
            }
            other => unreachable!("not a constructor pattern: {other:?}"),
        }
    }

    // ---- specificity ----

    fn size_formals(&self, branch: &Branch) -> u32 {
        branch.formals.iter().map(|formal| self.size_pattern(formal.pattern)).sum()
    }

    /// Number of atomic match operations a pattern requires: a literal
    /// `k` contributes `k+1`, a constructor application `1 + Σ` over its
    /// arguments, a wildcard nothing.
    fn size_pattern(&self, pattern: ExprId) -> u32 {
        match self.exprs.get(pattern) {
            Expr::Apply(func, arg) => self.size_pattern(*func) + self.size_pattern(*arg),
            Expr::Pair(left, right) => self.size_pattern(*left) + self.size_pattern(*right),
            Expr::Plus(plus) => self.size_pattern(plus.arg) + plus.incr,
            Expr::Num(n) => *n as u32 + 1,
            Expr::Cons(_) | Expr::Char(_) => 1,
            Expr::Var(_) => 0,
            other => unreachable!("not a pattern: {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests;
