//! The inference rules.
//!
//! Monomorphic within a declaration; every reference to a declared
//! function or constructor instantiates a fresh copy of its scheme.
//! Failures carry typed traces which the session renders with the
//! expression and type printers before reporting.

use hope_ast::expr::{LambdaExpr, MuExpr};
use hope_ast::{Branch, Expr, ExprArena, ExprId, Interner, QType, SugarKind};

use super::{TyArena, TyCellId};
use crate::defs::Func;
use crate::module::ModuleEnv;

/// One detail line of a type error.
#[derive(Debug)]
pub enum Trace {
    /// An expression with its inferred type.
    ExprType(ExprId, TyCellId),
    /// An expression alone.
    Expr(ExprId),
    /// The argument of an application; split into operand lines when the
    /// function is an operator applied to a pair.
    Argument {
        /// The function expression.
        func: ExprId,
        /// The argument expression.
        arg: ExprId,
        /// The argument's inferred type.
        ty: TyCellId,
    },
    /// A declared qualified type.
    Declared(QType),
    /// An inferred cell.
    Inferred(TyCellId),
}

/// A type error: the message and its trace lines.
#[derive(Debug)]
pub struct TypeError {
    /// The report message.
    pub message: String,
    /// Detail lines, printed before the message.
    pub traces: Vec<Trace>,
}

impl TypeError {
    fn new(message: impl Into<String>, traces: Vec<Trace>) -> Self {
        Self { message: message.into(), traces }
    }
}

type Infer<T> = Result<T, TypeError>;

/// One inference run over a branch or top-level expression.
pub struct Inference<'a> {
    tys: &'a mut TyArena,
    env: &'a ModuleEnv,
    exprs: &'a ExprArena,
    interner: &'a Interner,
    /// Type cells of the program variables of each open scope,
    /// innermost last.
    scopes: Vec<Vec<TyCellId>>,
    /// The scope level the pattern currently being typed lives at.
    pattern_scope: usize,
}

impl<'a> Inference<'a> {
    /// Creates an inference run, discarding previous cells.
    pub fn new(
        tys: &'a mut TyArena,
        env: &'a ModuleEnv,
        exprs: &'a ExprArena,
        interner: &'a Interner,
    ) -> Self {
        tys.reset();
        Self { tys, env, exprs, interner, scopes: Vec::new(), pattern_scope: 0 }
    }

    /// Checks a new equation of a declared function against its
    /// declaration.
    ///
    /// # Errors
    ///
    /// Fails when inference fails or the inferred type is not an
    /// instance of the declaration.
    pub fn chk_func(&mut self, branch: &Branch, func: &Func) -> Infer<()> {
        let inferred = self.ty_branch(branch)?;
        let declared = func.qtype.as_ref().expect("an explicit declaration");
        if !self.tys.instance(self.env, declared, inferred) {
            return Err(TypeError::new(
                format!("'{}': does not match declaration", self.interner.text(func.name)),
                vec![Trace::Declared(declared.clone()), Trace::Inferred(inferred)],
            ));
        }
        Ok(())
    }

    /// Types a top-level expression, which sees the terminal input
    /// stream as its sole free variable (`input : list char`).
    ///
    /// # Errors
    ///
    /// Propagates inference failures.
    pub fn chk_expr(&mut self, expr: ExprId) -> Infer<TyCellId> {
        let ch = self.env.std.character.expect("'char' is defined");
        let char_ty = self.tys.const_type(ch);
        let input_ty = self.tys.list_type(self.env, char_ty);
        self.scopes.push(vec![input_ty]);
        let ty = self.ty_expr(expr)?;
        let _ = self.scopes.pop();
        Ok(ty)
    }

    /// Like [`Self::chk_expr`], but the result must be a list (the
    /// `write` command streams its elements).
    ///
    /// # Errors
    ///
    /// Propagates inference failures.
    pub fn chk_list(&mut self, expr: ExprId) -> Infer<TyCellId> {
        let ty = self.chk_expr(expr)?;
        let elem = self.tys.new_tvar();
        let want = self.tys.list_type(self.env, elem);
        if !self.tys.unify(self.env, ty, want) {
            return Err(TypeError::new(
                "a 'write' expression must produce a list",
                vec![Trace::ExprType(expr, ty)],
            ));
        }
        Ok(ty)
    }

    fn new_vars(&mut self, n: u32) {
        let scope = (0..n).map(|_| self.tys.new_tvar()).collect();
        self.scopes.push(scope);
    }

    fn del_vars(&mut self) { let _ = self.scopes.pop(); }

    fn ty_pattern(&mut self, patt: ExprId, level: usize) -> Infer<TyCellId> {
        self.pattern_scope = level;
        self.ty_expr(patt)
    }

    fn scope_cell(&self, level: usize, slot: u32) -> TyCellId {
        self.scopes[self.scopes.len() - 1 - level][slot as usize]
    }

    fn ty_expr(&mut self, expr: ExprId) -> Infer<TyCellId> {
        match self.exprs.get(expr).clone() {
            Expr::Num(_) => {
                let num = self.env.std.num.expect("'num' is defined");
                Ok(self.tys.const_type(num))
            }
            Expr::Char(_) => {
                let ch = self.env.std.character.expect("'char' is defined");
                Ok(self.tys.const_type(ch))
            }
            Expr::Defun(f) => {
                let func = self.env.func(f);
                if !func.explicit_dec() {
                    if let Some(dt) = func.tycons {
                        return Ok(self.functor_type(dt));
                    }
                }
                let declared = func.qtype.as_ref().expect("a declared type");
                Ok(self.tys.copy_type(self.env, &declared.ty, declared.ntvars, false))
            }
            Expr::Cons(_) => self.ty_cons(expr),
            Expr::Lambda(lambda) => self.ty_alternatives(expr, &lambda),
            Expr::Param(param) => self.ty_pattern(param.patt, param.level as usize),
            Expr::Plus(plus) => {
                let num = self.env.std.num.expect("'num' is defined");
                let want = self.tys.const_type(num);
                let got = self.ty_expr(plus.arg)?;
                if !self.tys.unify(self.env, want, got) {
                    return Err(TypeError::new(
                        "argument has wrong type",
                        vec![Trace::Expr(expr), Trace::ExprType(plus.arg, got)],
                    ));
                }
                Ok(want)
            }
            Expr::Var(var) => Ok(self.scope_cell(self.pattern_scope, var.slot)),
            Expr::Pair(left, right) => {
                let lt = self.ty_expr(left)?;
                let rt = self.ty_expr(right)?;
                Ok(self.tys.prod_type(self.env, lt, rt))
            }
            Expr::Sugar(SugarKind::If, func, arg) => self.ty_if(func, arg),
            Expr::Sugar(SugarKind::Let | SugarKind::Where, func, arg) => {
                let branch = self.eqn_branch(func);
                self.ty_eqn(&branch, arg, false)
            }
            Expr::Sugar(SugarKind::Letrec | SugarKind::Whererec, func, arg) => {
                let branch = self.eqn_branch(func);
                self.ty_eqn(&branch, arg, true)
            }
            Expr::Mu(mu) => self.ty_mu(&mu),
            Expr::Apply(func, arg) => self.ty_apply(expr, func, arg),
            Expr::Builtin(_) | Expr::Math1(_) | Expr::Math2(_) | Expr::Return => {
                unreachable!("native terminals are never type-checked")
            }
        }
    }

    /// Restricted types of the list and string syntax: the shared `nil`
    /// and `::` references type as `list alpha` and
    /// `alpha # list alpha -> list alpha`.
    fn ty_cons(&mut self, expr: ExprId) -> Infer<TyCellId> {
        if Some(expr) == self.env.std.e_nil {
            let elem = self.tys.new_tvar();
            return Ok(self.tys.list_type(self.env, elem));
        }
        if Some(expr) == self.env.std.e_cons {
            let elem = self.tys.new_tvar();
            let list = self.tys.list_type(self.env, elem);
            let pair = self.tys.prod_type(self.env, elem, list);
            return Ok(self.tys.func_type(self.env, pair, list));
        }
        let Expr::Cons(c) = self.exprs.get(expr) else { unreachable!() };
        let cons = self.env.cons(*c);
        let ty = cons.ty.clone();
        Ok(self.tys.copy_type(self.env, &ty, cons.ntvars, false))
    }

    /// `A |- e1: t2 -> t,  A |- e2: t2  ⇒  A |- (e1 e2): t`.
    fn ty_apply(&mut self, expr: ExprId, func: ExprId, arg: ExprId) -> Infer<TyCellId> {
        let ft = self.ty_expr(func)?;
        let at = self.ty_expr(arg)?;
        let result = self.tys.new_tvar();
        let want = self.tys.func_type(self.env, at, result);
        if !self.tys.unify(self.env, ft, want) {
            return Err(TypeError::new(
                "argument has wrong type",
                vec![
                    Trace::Expr(expr),
                    Trace::ExprType(func, ft),
                    Trace::Argument { func, arg, ty: at },
                ],
            ));
        }
        Ok(self.tys.func_result(ft).expect("a function type"))
    }

    fn ty_if(&mut self, func: ExprId, orelse: ExprId) -> Infer<TyCellId> {
        let Expr::Apply(ct, then) = self.exprs.get(func).clone() else {
            unreachable!("if sugar wraps an application spine")
        };
        let Expr::Apply(_, cond) = self.exprs.get(ct).clone() else {
            unreachable!("if sugar wraps an application spine")
        };
        let truval = self.env.std.truval.expect("'bool' is defined");
        let cond_ty = self.ty_expr(cond)?;
        let want = self.tys.const_type(truval);
        if !self.tys.unify(self.env, cond_ty, want) {
            return Err(TypeError::new(
                "predicate is not a truth value",
                vec![Trace::ExprType(cond, cond_ty)],
            ));
        }
        let then_ty = self.ty_expr(then)?;
        let else_ty = self.ty_expr(orelse)?;
        if !self.tys.unify(self.env, then_ty, else_ty) {
            return Err(TypeError::new(
                "conflict between branches of conditional",
                vec![Trace::ExprType(then, then_ty), Trace::ExprType(orelse, else_ty)],
            ));
        }
        Ok(then_ty)
    }

    fn eqn_branch(&self, func: ExprId) -> Branch {
        match self.exprs.get(func) {
            Expr::Lambda(lambda) => lambda.branches[0].clone(),
            _ => unreachable!("let/where sugar wraps an equation"),
        }
    }

    /// The (non-)recursive equation rules: the pattern's type must match
    /// the bound expression's, which is typed outside (inside, when
    /// recursive) the pattern's scope.
    fn ty_eqn(&mut self, branch: &Branch, expr: ExprId, recursive: bool) -> Infer<TyCellId> {
        let formal = &branch.formals[0];
        self.new_vars(formal.nvars);
        let pat_ty = self.ty_pattern(formal.pattern, 0)?;
        let val_ty = self.ty_expr(branch.body)?;
        let exp_ty = if recursive {
            let t = self.ty_expr(expr)?;
            self.del_vars();
            t
        } else {
            self.del_vars();
            self.ty_expr(expr)?
        };
        if !self.tys.unify(self.env, pat_ty, exp_ty) {
            return Err(TypeError::new(
                "sides of equation have conflicting types",
                vec![Trace::ExprType(formal.pattern, pat_ty), Trace::ExprType(expr, exp_ty)],
            ));
        }
        Ok(val_ty)
    }

    fn ty_mu(&mut self, mu: &MuExpr) -> Infer<TyCellId> {
        self.new_vars(mu.formal.nvars);
        let pat_ty = self.ty_pattern(mu.formal.pattern, 0)?;
        let exp_ty = self.ty_expr(mu.body)?;
        self.del_vars();
        if !self.tys.unify(self.env, pat_ty, exp_ty) {
            return Err(TypeError::new(
                "pattern and body have conflicting types",
                vec![Trace::ExprType(mu.formal.pattern, pat_ty), Trace::ExprType(mu.body, exp_ty)],
            ));
        }
        Ok(exp_ty)
    }

    /// All alternatives of a lambda must agree.
    fn ty_alternatives(&mut self, expr: ExprId, lambda: &LambdaExpr) -> Infer<TyCellId> {
        let ty = self.ty_branch(&lambda.branches[0])?;
        for branch in &lambda.branches[1..] {
            let other = self.ty_branch(branch)?;
            if !self.tys.unify(self.env, ty, other) {
                return Err(TypeError::new(
                    "alternatives have incompatible types",
                    vec![Trace::Expr(expr)],
                ));
            }
        }
        Ok(ty)
    }

    /// `A1 |- p1: t1 … A, A1…An |- e: t  ⇒  (p1 … pn => e): t1 -> … -> t`.
    fn ty_branch(&mut self, branch: &Branch) -> Infer<TyCellId> {
        let mut arg_types = Vec::with_capacity(branch.formals.len());
        for formal in &branch.formals {
            self.new_vars(formal.nvars);
            arg_types.push(self.ty_pattern(formal.pattern, 0)?);
        }
        let mut ty = self.ty_expr(branch.body)?;
        for _ in &branch.formals {
            self.del_vars();
        }
        for arg_ty in arg_types.into_iter().rev() {
            ty = self.tys.func_type(self.env, arg_ty, ty);
        }
        Ok(ty)
    }

    /// The scheme a type's value-level functor checks against:
    /// `(a1 -> b1) -> … -> T a* -> T b*`, with the function arguments
    /// tupled when the parameters are.
    fn functor_type(&mut self, dt: hope_ast::DefTypeId) -> TyCellId {
        let deftype = self.env.deftype(dt);
        let arity = deftype.arity as usize;
        let tupled = deftype.tupled;
        if arity == 0 {
            let t = self.tys.new_tcons(dt, None);
            let t = self.tys.expand_type(self.env, t);
            return self.tys.func_type(self.env, t, t);
        }
        let sources: Vec<TyCellId> = (0..arity).map(|_| self.tys.new_tvar()).collect();
        let targets: Vec<TyCellId> = (0..arity).map(|_| self.tys.new_tvar()).collect();
        let mut from_args = None;
        for &a in sources.iter().rev() {
            from_args = Some(self.tys.new_tlist(a, from_args));
        }
        let mut to_args = None;
        for &b in targets.iter().rev() {
            to_args = Some(self.tys.new_tlist(b, to_args));
        }
        let from = self.tys.new_tcons(dt, from_args);
        let from = self.tys.expand_type(self.env, from);
        let to = self.tys.new_tcons(dt, to_args);
        let to = self.tys.expand_type(self.env, to);
        let mut ty = self.tys.func_type(self.env, from, to);
        let maps: Vec<TyCellId> = sources
            .iter()
            .zip(&targets)
            .map(|(&a, &b)| self.tys.func_type(self.env, a, b))
            .collect();
        if tupled {
            let mut arg = maps[maps.len() - 1];
            for &map in maps[..maps.len() - 1].iter().rev() {
                arg = self.tys.prod_type(self.env, map, arg);
            }
            ty = self.tys.func_type(self.env, arg, ty);
        } else {
            for &map in maps.iter().rev() {
                ty = self.tys.func_type(self.env, map, ty);
            }
        }
        ty
    }
}
