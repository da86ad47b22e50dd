//! The lazy evaluator.
//!
//! `evaluate` reduces a cell to weak head normal form and updates the
//! cell in place, so subsequent forces are O(1). Reduction is a
//! trampoline over three step kinds (reduce an expression, drive a
//! decision tree, force a cell), which keeps the continuation-passing
//! output builtins (`write_element` feeding `write_list`) in constant
//! stack space. Arguments are prepended to a partial application's
//! environment as applications saturate, so the last argument of a call
//! sits at level 0, matching the scope levels the compiler assigned.

use std::io::Write;

use hope_analyzer::ModuleEnv;
use hope_ast::cases::{NUM_EQUAL, NUM_GREATER, NUM_LESS};
use hope_ast::{
    CaseArena, CaseId, ConsId, Dir, Expr, ExprArena, ExprId, FuncId, Interner, LCase, Path,
    SugarKind, UCase,
};

use crate::error::EvalError;
use crate::heap::{Cell, CellId, Env, Heap, StreamId};
use crate::interrupt::Interrupt;
use crate::session::RtNames;
use crate::streams::Streams;

/// One trampoline step.
enum Step {
    /// A finished weak head normal form.
    Done(CellId),
    /// Reduce an expression in an environment.
    Reduce(ExprId, Env),
    /// Drive a decision tree.
    Drive(CaseId, Env),
    /// Force an existing cell.
    Force(CellId),
}

type Eval<T> = Result<T, EvalError>;

/// The evaluator, borrowing the session's arenas.
pub struct Evaluator<'a> {
    /// The evaluation heap.
    pub heap: &'a mut Heap,
    /// The expression arena (read-only during evaluation).
    pub exprs: &'a ExprArena,
    /// The compiled decision trees.
    pub cases: &'a CaseArena,
    /// The module tables.
    pub env: &'a ModuleEnv,
    /// The identifier pool.
    pub interner: &'a Interner,
    /// Open streams.
    pub streams: &'a mut Streams,
    /// Cancellation state.
    pub interrupt: &'a Interrupt,
    /// Runtime wiring established when `Standard` finished.
    pub names: Option<&'a RtNames>,
    /// Terminal output (the `print` builtin).
    pub out: &'a mut dyn Write,
    /// Sink of the current `write` command, if one is running.
    pub write_out: Option<&'a mut dyn Write>,
    /// Rendered type of the expression being printed.
    pub type_banner: Option<String>,
    /// Whether file access is disabled.
    pub restricted: bool,
}

impl Evaluator<'_> {
    pub(crate) fn rt_names(&self) -> Eval<&RtNames> {
        self.names.ok_or_else(|| EvalError::exec("standard environment not initialised"))
    }

    /// Reduces a cell to weak head normal form, updating it in place.
    ///
    /// # Errors
    ///
    /// Run-time failures (pattern-match failure, arithmetic errors,
    /// interrupts) unwind to the top level.
    pub fn evaluate(&mut self, id: CellId) -> Eval<CellId> {
        self.interrupt.check()?;
        match self.heap.get(id).clone() {
            Cell::Num(_)
            | Cell::Char(_)
            | Cell::Const(_)
            | Cell::Cons(..)
            | Cell::Pair(..)
            | Cell::PApp { .. } => Ok(id),
            Cell::Susp(expr, _) if matches!(self.exprs.get(expr), Expr::Return) => Ok(id),
            Cell::Susp(expr, env) => {
                let value = self.run(Step::Reduce(expr, env))?;
                self.heap.update_from(id, value);
                Ok(id)
            }
            Cell::Dirs(path, val) => {
                let value = self.project(&path, val)?;
                self.heap.update_from(id, value);
                Ok(id)
            }
            Cell::Case(code, env) => {
                let value = self.run(Step::Drive(code, env))?;
                self.heap.update_from(id, value);
                Ok(id)
            }
            Cell::Stream(stream) => {
                let value = self.read_stream(stream)?;
                self.heap.set(id, value);
                Ok(id)
            }
            Cell::Env { .. } | Cell::Hole => {
                Err(EvalError::exec("internal error: forced a non-value cell"))
            }
        }
    }

    fn run(&mut self, mut step: Step) -> Eval<CellId> {
        loop {
            self.interrupt.check()?;
            step = match step {
                Step::Done(id) => return Ok(id),
                Step::Force(id) => return self.evaluate(id),
                Step::Reduce(expr, env) => self.reduce(expr, env)?,
                Step::Drive(code, env) => self.drive(code, env)?,
            };
        }
    }

    // ---- expression reduction ----

    fn reduce(&mut self, expr: ExprId, env: Env) -> Eval<Step> {
        match self.exprs.get(expr).clone() {
            Expr::Num(n) => Ok(Step::Done(self.heap.alloc(Cell::Num(n)))),
            Expr::Char(c) => Ok(Step::Done(self.heap.alloc(Cell::Char(c)))),
            Expr::Cons(c) => {
                let nargs = self.env.cons(c).nargs;
                if nargs == 0 {
                    Ok(Step::Done(self.heap.alloc(Cell::Const(c))))
                } else {
                    Ok(Step::Done(self.heap.alloc(Cell::PApp { expr, env, remaining: nargs })))
                }
            }
            Expr::Defun(f) => {
                let func = self.env.func(f);
                if func.arity == 0 {
                    let code = self.func_code(f)?;
                    Ok(Step::Drive(code, env))
                } else {
                    Ok(Step::Done(self.heap.alloc(Cell::PApp {
                        expr,
                        env,
                        remaining: func.arity,
                    })))
                }
            }
            Expr::Param(param) => {
                let slot = self.heap.env_nth(env, param.level);
                if param.path.is_empty() {
                    Ok(Step::Force(slot))
                } else {
                    let dirs = self.heap.alloc(Cell::Dirs(param.path.clone(), slot));
                    Ok(Step::Force(dirs))
                }
            }
            Expr::Pair(left, right) => {
                let l = self.heap.susp(left, env);
                let r = self.heap.susp(right, env);
                Ok(Step::Done(self.heap.alloc(Cell::Pair(l, r))))
            }
            Expr::Apply(func, arg)
            | Expr::Sugar(SugarKind::If | SugarKind::Let | SugarKind::Where, func, arg) => {
                let fval = self.run(Step::Reduce(func, env))?;
                let arg_cell = self.heap.susp(arg, env);
                self.apply_one(fval, arg_cell)
            }
            Expr::Sugar(SugarKind::Letrec | SugarKind::Whererec, func, arg) => {
                // Tie the knot: the bound expression sees its own value.
                let hole = self.heap.alloc(Cell::Hole);
                let knot_env = self.heap.env_cons(hole, env);
                let bound = self.heap.susp(arg, knot_env);
                self.heap.patch_env_arg(knot_env, bound);
                let code = self.lambda_code(func)?;
                Ok(Step::Drive(code, knot_env))
            }
            Expr::Mu(mu) => {
                // The sole environment slot refers to the whole value.
                let hole = self.heap.alloc(Cell::Hole);
                let knot_env = self.heap.env_cons(hole, env);
                let body = self.heap.susp(mu.body, knot_env);
                self.heap.patch_env_arg(knot_env, body);
                Ok(Step::Force(body))
            }
            Expr::Plus(plus) => {
                let arg = self.run(Step::Reduce(plus.arg, env))?;
                match self.heap.get(arg) {
                    Cell::Num(n) => {
                        let sum = n + f64::from(plus.incr);
                        Ok(Step::Done(self.heap.alloc(Cell::Num(sum))))
                    }
                    _ => Err(EvalError::exec("internal error: n+k applied to a non-number")),
                }
            }
            Expr::Lambda(lambda) => Ok(Step::Done(self.heap.alloc(Cell::PApp {
                expr,
                env,
                remaining: lambda.arity,
            }))),
            Expr::Return => Ok(Step::Done(self.heap.susp(expr, env))),
            Expr::Var(_) => Err(EvalError::exec("internal error: unresolved identifier")),
            Expr::Builtin(_) | Expr::Math1(_) | Expr::Math2(_) => {
                Err(EvalError::exec("internal error: bare native terminal"))
            }
        }
    }

    /// Applies a function value to one more (unevaluated) argument.
    fn apply_one(&mut self, fval: CellId, arg: CellId) -> Eval<Step> {
        match self.heap.get(fval).clone() {
            Cell::PApp { expr, env, remaining } => {
                let env = self.heap.env_cons(arg, env);
                if remaining > 1 {
                    Ok(Step::Done(self.heap.alloc(Cell::PApp {
                        expr,
                        env,
                        remaining: remaining - 1,
                    })))
                } else {
                    self.enter(expr, env)
                }
            }
            _ => Err(EvalError::exec("internal error: application of a non-function")),
        }
    }

    /// A saturated application: run the function's code or build the
    /// constructed value.
    fn enter(&mut self, expr: ExprId, env: Env) -> Eval<Step> {
        match self.exprs.get(expr).clone() {
            Expr::Defun(f) => {
                let code = self.func_code(f)?;
                Ok(Step::Drive(code, env))
            }
            Expr::Lambda(lambda) => {
                let code = lambda.code.ok_or_else(|| {
                    EvalError::exec("internal error: uncompiled lambda")
                })?;
                Ok(Step::Drive(code, env))
            }
            Expr::Cons(c) => {
                let value = self.build_cons(c, env);
                Ok(Step::Done(value))
            }
            _ => Err(EvalError::exec("internal error: saturated a non-function")),
        }
    }

    /// The value of a saturated constructor: its arguments laid out as
    /// `(v1, (v2, … (vk-1, vk)…))`.
    fn build_cons(&mut self, c: ConsId, env: Env) -> CellId {
        let nargs = self.env.cons(c).nargs;
        let mut args = Vec::with_capacity(nargs as usize);
        let mut walk = env;
        for _ in 0..nargs {
            args.push(self.heap.env_nth(walk, 0));
            walk = self.heap.env_next(walk);
        }
        // The tip of the environment is the last argument.
        args.reverse();
        let mut payload = args.pop().expect("constructors here have arguments");
        while let Some(arg) = args.pop() {
            payload = self.heap.alloc(Cell::Pair(arg, payload));
        }
        self.heap.alloc(Cell::Cons(c, payload))
    }

    fn func_code(&self, f: FuncId) -> Eval<CaseId> {
        self.env.func(f).code.ok_or_else(|| {
            EvalError::exec(format!(
                "'{}': used before it is defined",
                self.interner.text(self.env.func(f).name)
            ))
        })
    }

    fn lambda_code(&self, expr: ExprId) -> Eval<CaseId> {
        match self.exprs.get(expr) {
            Expr::Lambda(lambda) => lambda
                .code
                .ok_or_else(|| EvalError::exec("internal error: uncompiled lambda")),
            _ => Err(EvalError::exec("internal error: expected a lambda")),
        }
    }

    // ---- decision trees ----

    fn drive(&mut self, code: CaseId, env: Env) -> Eval<Step> {
        match self.cases.get(code).clone() {
            UCase::Success { body, .. } => Ok(Step::Reduce(body, env)),
            UCase::FNoMatch(f) => Err(self.match_failure_fn(f, env)),
            UCase::LNoMatch(who) => Err(self.match_failure_lambda(who, env)),
            UCase::Strict(real) => {
                let arg = self.heap.env_nth(env, 0);
                let arg = self.evaluate(arg)?;
                let result = self.strict_call(real, arg)?;
                Ok(Step::Force(result))
            }
            UCase::Case(node) => {
                let slot = self.heap.env_nth(env, node.level);
                let scrutinee = self.project(&node.path, slot)?;
                let limb = self.select_limb(&node.cases, scrutinee)?;
                Ok(Step::Drive(limb, env))
            }
        }
    }

    fn select_limb(&mut self, lcase: &LCase, scrutinee: CellId) -> Eval<CaseId> {
        match self.heap.get(scrutinee) {
            Cell::Const(c) | Cell::Cons(c, _) => {
                Ok(lcase.limb(self.env.cons(*c).index as usize))
            }
            Cell::Num(n) => {
                let index = if *n < 0.0 {
                    NUM_LESS
                } else if *n == 0.0 {
                    NUM_EQUAL
                } else {
                    NUM_GREATER
                };
                Ok(lcase.limb(index))
            }
            Cell::Char(c) => Ok(lcase.limb(*c as usize)),
            _ => Err(EvalError::exec("internal error: scrutinee has no dispatchable form")),
        }
    }

    // ---- paths ----

    /// Walks a path from a cell and forces the result.
    pub(crate) fn project(&mut self, path: &Path, cell: CellId) -> Eval<CellId> {
        let value = self.walk_path(path, cell)?;
        self.evaluate(value)
    }

    /// Walks the directives of a path. Every directive forces the
    /// current cell to weak head normal form before inspecting it;
    /// `Unroll` additionally drops a constructor wrapper when one is
    /// present.
    pub(crate) fn walk_path(&mut self, path: &Path, cell: CellId) -> Eval<CellId> {
        let mut cur = cell;
        for dir in path.dirs() {
            cur = self.evaluate(cur)?;
            cur = match (dir, self.heap.get(cur).clone()) {
                (Dir::Unroll, Cell::Cons(_, payload)) => payload,
                (Dir::Unroll, _) => cur,
                (Dir::Left, Cell::Pair(left, _)) => left,
                (Dir::Right, Cell::Pair(_, right)) => right,
                (Dir::Strip, Cell::Cons(_, payload)) => payload,
                (Dir::Pred, Cell::Num(n)) => self.heap.alloc(Cell::Num(n - 1.0)),
                _ => {
                    return Err(EvalError::exec(
                        "internal error: path does not fit the value",
                    ))
                }
            };
        }
        Ok(cur)
    }

    // ---- streams ----

    fn read_stream(&mut self, stream: StreamId) -> Eval<Cell> {
        let names = self.rt_names()?;
        let nil = names.nil;
        let cons = names.cons;
        match self.streams.read_char(stream) {
            None => Ok(Cell::Const(nil)),
            Some(byte) => {
                let head = self.heap.alloc(Cell::Char(byte));
                let tail = self.heap.alloc(Cell::Stream(stream));
                let pair = self.heap.alloc(Cell::Pair(head, tail));
                Ok(Cell::Cons(cons, pair))
            }
        }
    }

    // ---- failure reports ----

    fn match_failure_fn(&mut self, f: FuncId, env: Env) -> EvalError {
        let name = self.interner.text(self.env.func(f).name).to_string();
        let arity = self.env.func(f).arity;
        let call = self.render_call(&name, env, arity);
        EvalError::exec(format!("'{name}': no matching equation")).with_detail(call)
    }

    fn match_failure_lambda(&mut self, who: ExprId, env: Env) -> EvalError {
        let call = self.render_lambda_match(who, env);
        EvalError::exec("lambda: no matching equation").with_detail(call)
    }
}

#[cfg(test)]
mod tests {
    use hope_analyzer::ModuleEnv;
    use hope_ast::{CaseArena, Dir, ExprArena, Interner, Path};

    use super::*;

    struct Fixture {
        interner: Interner,
        env: ModuleEnv,
        exprs: ExprArena,
        cases: CaseArena,
        heap: Heap,
        streams: crate::streams::Streams,
        interrupt: Interrupt,
        out: Vec<u8>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut interner = Interner::new();
            let session = interner.intern("<Session>");
            Self {
                interner,
                env: ModuleEnv::new(session),
                exprs: ExprArena::new(),
                cases: CaseArena::new(),
                heap: Heap::new(),
                streams: crate::streams::Streams::new(),
                interrupt: Interrupt::new(),
                out: Vec::new(),
            }
        }

        fn evaluator(&mut self) -> Evaluator<'_> {
            Evaluator {
                heap: &mut self.heap,
                exprs: &self.exprs,
                cases: &self.cases,
                env: &self.env,
                interner: &self.interner,
                streams: &mut self.streams,
                interrupt: &self.interrupt,
                names: None,
                out: &mut self.out,
                write_out: None,
                type_banner: None,
                restricted: false,
            }
        }
    }

    #[test]
    fn forcing_is_idempotent_and_memoizing() {
        let mut fx = Fixture::new();
        let expr = fx.exprs.num(42.0);
        let cell = fx.heap.susp(expr, Env::EMPTY);
        let mut evaluator = fx.evaluator();
        let first = evaluator.evaluate(cell).expect("forces");
        assert!(matches!(evaluator.heap.get(first), Cell::Num(n) if *n == 42.0));
        let second = evaluator.evaluate(cell).expect("forces again");
        assert_eq!(first, second);
        // The suspension itself was overwritten with its value.
        assert!(matches!(evaluator.heap.get(cell), Cell::Num(_)));
    }

    #[test]
    fn paths_project_through_pairs_and_numbers() {
        let mut fx = Fixture::new();
        let left_expr = fx.exprs.num(3.0);
        let right_expr = fx.exprs.num(9.0);
        let pair_expr = fx.exprs.pair(left_expr, right_expr);
        let cell = fx.heap.susp(pair_expr, Env::EMPTY);
        let mut evaluator = fx.evaluator();
        let path = Path::from(vec![Dir::Unroll, Dir::Left, Dir::Pred]);
        let projected = evaluator.project(&path, cell).expect("projects");
        assert!(matches!(evaluator.heap.get(projected), Cell::Num(n) if *n == 2.0));
    }
}
