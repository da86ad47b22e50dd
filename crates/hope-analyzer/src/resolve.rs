//! Name resolution.
//!
//! Runs over the expression arena after parsing, before type checking.
//! Pattern variables are recorded with their position inside the pattern;
//! every identifier occurrence in a body is rewritten to a `Param`
//! reference (innermost enclosing binding), a data constructor, or a
//! defined function. `v + k` patterns become `Plus` nodes and nullary
//! constructors in patterns shed their variable disguise.

use hope_ast::path::PathBuilder;
use hope_ast::{Branch, Dir, Expr, ExprArena, ExprId, Interner, Name, SugarKind};

use crate::module::ModuleEnv;

/// A resolution failure: the message plus an optional offending
/// expression, printed as a detail line by the reporter.
#[derive(Debug)]
pub struct ResolveError {
    /// What went wrong.
    pub message: String,
    /// The expression to show above the message.
    pub trace: Option<ExprId>,
}

impl ResolveError {
    fn new(message: impl Into<String>) -> Self { Self { message: message.into(), trace: None } }

    fn with_trace(message: impl Into<String>, expr: ExprId) -> Self {
        Self { message: message.into(), trace: Some(expr) }
    }
}

type Res<T> = Result<T, ResolveError>;

/// The resolver; one instance lives for one branch (or top-level
/// expression wrapper) and carries the scope stack.
pub struct Resolver<'a> {
    exprs: &'a mut ExprArena,
    env: &'a ModuleEnv,
    interner: &'a Interner,
    /// Binding occurrences, outermost scope first.
    vars: Vec<ExprId>,
    /// Start offset of each open scope within `vars`.
    starts: Vec<usize>,
    plus_name: Option<Name>,
    wild_name: Option<Name>,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub fn new(exprs: &'a mut ExprArena, env: &'a ModuleEnv, interner: &'a Interner) -> Self {
        Self {
            exprs,
            env,
            interner,
            vars: Vec::new(),
            starts: vec![0],
            plus_name: interner.lookup("+"),
            wild_name: interner.lookup("_"),
        }
    }

    /// Resolves one branch: its formals bind, its body refers.
    ///
    /// # Errors
    ///
    /// Undefined variables, illegal patterns, repeated pattern variables
    /// and arity disagreements are reported as [`ResolveError`]s.
    pub fn resolve_branch(&mut self, branch: &mut Branch) -> Res<()> {
        self.enter_scopes(&mut branch.formals)?;
        self.resolve_expr(branch.body)?;
        self.leave_scopes(branch.formals.len());
        Ok(())
    }

    fn enter_scopes(&mut self, formals: &mut [hope_ast::Formal]) -> Res<()> {
        for formal in formals {
            let before = self.vars.len();
            self.pattern(formal.pattern, PathBuilder::new())?;
            formal.nvars = (self.vars.len() - before) as u32;
            self.starts.push(self.vars.len());
        }
        Ok(())
    }

    fn leave_scopes(&mut self, count: usize) {
        for _ in 0..count {
            let _ = self.starts.pop();
        }
        self.vars.truncate(*self.starts.last().expect("scope base"));
    }

    // ---- patterns ----

    fn pattern(&mut self, p: ExprId, path: PathBuilder) -> Res<()> {
        match self.exprs.get(p).clone() {
            Expr::Num(_) | Expr::Char(_) => Ok(()),
            Expr::Pair(left, right) => {
                self.pattern(left, path.clone().push(Dir::Left))?;
                self.pattern(right, path.push(Dir::Right))
            }
            Expr::Apply(func, arg) => {
                if let Some(incr) = self.plus_pattern(func, arg) {
                    let rest = match self.exprs.get(arg) {
                        Expr::Pair(rest, _) => *rest,
                        _ => unreachable!("plus patterns carry a pair"),
                    };
                    self.exprs.set(
                        p,
                        Expr::Plus(hope_ast::expr::PlusExpr { arg: rest, incr }),
                    );
                    let mut path = path;
                    for _ in 0..incr {
                        path = path.push(Dir::Pred);
                    }
                    return self.pattern(rest, path);
                }
                let mut path = path;
                self.constructor(p, 0, &mut path)
            }
            Expr::Var(var) => self.pattern_var(p, var.name, &path),
            Expr::Cons(c) if self.env.cons(c).nargs == 0 => Ok(()),
            _ => Err(ResolveError::with_trace("illegal pattern", p)),
        }
    }

    /// Is this application the `v + k` pattern?
    fn plus_pattern(&self, func: ExprId, arg: ExprId) -> Option<u32> {
        let Expr::Var(var) = self.exprs.get(func) else { return None };
        if Some(var.name) != self.plus_name {
            return None;
        }
        let Expr::Pair(_, incr) = self.exprs.get(arg) else { return None };
        match self.exprs.get(*incr) {
            Expr::Num(n) => Some(*n as u32),
            _ => None,
        }
    }

    fn pattern_var(&mut self, p: ExprId, name: Name, path: &PathBuilder) -> Res<()> {
        if let Some(c) = self.env.cons_lookup(name) {
            if self.env.cons(c).nargs == 0 {
                self.exprs.set(p, Expr::Cons(c));
                return Ok(());
            }
        }
        let scope_base = *self.starts.last().expect("scope base");
        if Some(name) != self.wild_name {
            for &vp in &self.vars[scope_base..] {
                if self.var_name(vp) == name {
                    return Err(ResolveError::new(format!(
                        "{}: occurs twice in pattern",
                        self.interner.text(name)
                    )));
                }
            }
        }
        let slot = (self.vars.len() - scope_base) as u32;
        if let Expr::Var(var) = self.exprs.get_mut(p) {
            var.slot = slot;
            var.path = path.reverse();
        }
        self.vars.push(p);
        Ok(())
    }

    fn var_name(&self, vp: ExprId) -> Name {
        match self.exprs.get(vp) {
            Expr::Var(var) => var.name,
            _ => unreachable!("bindings are variables"),
        }
    }

    /// A constructed pattern `(…((c p1) p2) … pn‑1) pn` is matched
    /// against a value laid out as `c(v1, (v2, … (vn‑1, vn)…))`, so the
    /// path for `p(i+1)` extends the path for `p(i)`; hence the
    /// bottom-up construction here.
    fn constructor(&mut self, p: ExprId, level: u32, path: &mut PathBuilder) -> Res<()> {
        match self.exprs.get(p).clone() {
            Expr::Var(var) => {
                let Some(c) = self.env.cons_lookup(var.name) else {
                    return Err(ResolveError::new(format!(
                        "'{}': unknown constructor",
                        self.interner.text(var.name)
                    )));
                };
                self.check_cons_arity(c, level)?;
                self.exprs.set(p, Expr::Cons(c));
                self.push_strip(c, path);
                Ok(())
            }
            Expr::Cons(c) => {
                self.check_cons_arity(c, level)?;
                self.push_strip(c, path);
                Ok(())
            }
            Expr::Apply(func, arg) => {
                self.constructor(func, level + 1, path)?;
                if level > 0 {
                    self.pattern(arg, path.clone().push(Dir::Left))?;
                    *path = path.clone().push(Dir::Right);
                    Ok(())
                } else {
                    // last argument
                    self.pattern(arg, path.clone())
                }
            }
            _ => Err(ResolveError::with_trace("constructor required", p)),
        }
    }

    fn check_cons_arity(&self, c: hope_ast::ConsId, level: u32) -> Res<()> {
        let cons = self.env.cons(c);
        if cons.nargs != level {
            return Err(ResolveError::new(format!(
                "'{}': incorrect arity",
                self.interner.text(cons.name)
            )));
        }
        Ok(())
    }

    fn push_strip(&self, c: hope_ast::ConsId, path: &mut PathBuilder) {
        let dir = if Some(c) == self.env.std.succ { Dir::Pred } else { Dir::Strip };
        *path = path.clone().push(dir);
    }

    // ---- expressions ----

    fn resolve_expr(&mut self, expr: ExprId) -> Res<()> {
        match self.exprs.get(expr).clone() {
            Expr::Num(_) | Expr::Char(_) | Expr::Cons(_) => Ok(()),
            Expr::Pair(left, right) => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }
            Expr::Apply(func, arg)
            | Expr::Sugar(SugarKind::If | SugarKind::Let | SugarKind::Where, func, arg) => {
                self.resolve_expr(func)?;
                self.resolve_expr(arg)
            }
            Expr::Sugar(SugarKind::Letrec | SugarKind::Whererec, func, arg) => {
                self.recursive_eqn(func, arg)
            }
            Expr::Mu(mu) => {
                let mut formals = [hope_ast::Formal::new(mu.formal.pattern)];
                self.enter_scopes(&mut formals)?;
                let nvars = formals[0].nvars;
                if let Expr::Mu(mu) = self.exprs.get_mut(expr) {
                    mu.formal.nvars = nvars;
                }
                self.resolve_expr(mu.body)?;
                self.leave_scopes(1);
                Ok(())
            }
            Expr::Lambda(lambda) => self.resolve_lambda(expr, &lambda),
            Expr::Var(var) => self.resolve_var(expr, var.name),
            Expr::Defun(_)
            | Expr::Param(_)
            | Expr::Plus(_)
            | Expr::Builtin(_)
            | Expr::Math1(_)
            | Expr::Math2(_)
            | Expr::Return => Ok(()),
        }
    }

    fn recursive_eqn(&mut self, func: ExprId, arg: ExprId) -> Res<()> {
        let Expr::Lambda(lambda) = self.exprs.get(func).clone() else {
            return Err(ResolveError::new("malformed recursive binding"));
        };
        let mut branches = lambda.branches;
        let branch = &mut branches[0];
        self.enter_scopes(&mut branch.formals)?;
        self.resolve_expr(branch.body)?;
        self.resolve_expr(arg)?;
        self.leave_scopes(branch.formals.len());
        if let Expr::Lambda(lambda) = self.exprs.get_mut(func) {
            lambda.branches = branches;
        }
        Ok(())
    }

    fn resolve_lambda(&mut self, expr: ExprId, lambda: &hope_ast::expr::LambdaExpr) -> Res<()> {
        let mut branches = lambda.branches.clone();
        for branch in &mut branches {
            if branch.formals.len() as u32 != lambda.arity {
                return Err(ResolveError::with_trace("branches have different arities", expr));
            }
            self.resolve_branch(branch)?;
        }
        if let Expr::Lambda(lambda) = self.exprs.get_mut(expr) {
            lambda.branches = branches;
        }
        Ok(())
    }

    fn resolve_var(&mut self, expr: ExprId, name: Name) -> Res<()> {
        // Innermost binding first.
        for (i, &vp) in self.vars.iter().enumerate().rev() {
            if self.var_name(vp) == name {
                let scope = match self.starts.iter().rposition(|&start| start <= i) {
                    Some(s) => s,
                    None => 0,
                };
                let nscopes = self.starts.len() - 1;
                let level = (nscopes - 1 - scope) as u32;
                let path = match self.exprs.get(vp) {
                    Expr::Var(var) => var.path.clone(),
                    _ => unreachable!(),
                };
                self.exprs.set(
                    expr,
                    Expr::Param(hope_ast::expr::ParamExpr { level, patt: vp, path }),
                );
                return Ok(());
            }
        }
        // The succ constructor stays callable as a function.
        if let Some(c) = self.env.cons_lookup(name) {
            if Some(c) != self.env.std.succ {
                self.exprs.set(expr, Expr::Cons(c));
                return Ok(());
            }
        }
        if let Some(f) = self.env.fn_lookup(name) {
            self.exprs.set(expr, Expr::Defun(f));
            return Ok(());
        }
        Err(ResolveError::new(format!(
            "{}: undefined variable",
            self.interner.text(name)
        )))
    }
}
