//! Structural comparison.
//!
//! `compare` receives a pair, forces both sides one constructor deep and
//! either decides immediately or suspends the comparison of the
//! sub-structure, so comparing lazily built values only forces as much
//! as the ordering needs. Function values cannot be compared; the error
//! names the function when the cell reveals one.

use hope_ast::Expr;

use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::heap::{Cell, CellId, Env};

type Eval<T> = Result<T, EvalError>;

impl Evaluator<'_> {
    /// The `compare` builtin on its forced pair argument.
    pub(crate) fn compare_values(&mut self, arg: CellId) -> Eval<CellId> {
        let Cell::Pair(left, right) = self.heap.get(arg).clone() else {
            return Err(EvalError::exec("internal error: compare needs a pair"));
        };
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        self.reject_function(left)?;
        self.reject_function(right)?;
        let names = self.rt_names()?;
        let (less, equal, greater) = (names.less, names.equal, names.greater);
        let (e_cmp, cmp_pair_body) = (names.e_cmp, names.cmp_pair_body);
        let outcome = |ordering: std::cmp::Ordering| match ordering {
            std::cmp::Ordering::Less => less,
            std::cmp::Ordering::Equal => equal,
            std::cmp::Ordering::Greater => greater,
        };
        match (self.heap.get(left).clone(), self.heap.get(right).clone()) {
            (Cell::Num(a), Cell::Num(b)) => {
                let ordering = a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal);
                Ok(self.heap.alloc(Cell::Const(outcome(ordering))))
            }
            (Cell::Char(a), Cell::Char(b)) => {
                Ok(self.heap.alloc(Cell::Const(outcome(a.cmp(&b)))))
            }
            (Cell::Const(a), Cell::Const(b)) => {
                let ka = self.env.cons(a).index;
                let kb = self.env.cons(b).index;
                Ok(self.heap.alloc(Cell::Const(outcome(ka.cmp(&kb)))))
            }
            (Cell::Cons(a, pa), Cell::Cons(b, pb)) => {
                if a == b {
                    // Same constructor: compare the payloads lazily.
                    let pair = self.heap.alloc(Cell::Pair(pa, pb));
                    let env = self.heap.env_cons(pair, Env::EMPTY);
                    Ok(self.heap.susp(e_cmp, env))
                } else {
                    let ka = self.env.cons(a).index;
                    let kb = self.env.cons(b).index;
                    Ok(self.heap.alloc(Cell::Const(outcome(ka.cmp(&kb)))))
                }
            }
            (Cell::Const(a), Cell::Cons(b, _)) => {
                let ka = self.env.cons(a).index;
                let kb = self.env.cons(b).index;
                Ok(self.heap.alloc(Cell::Const(outcome(ka.cmp(&kb)))))
            }
            (Cell::Cons(a, _), Cell::Const(b)) => {
                let ka = self.env.cons(a).index;
                let kb = self.env.cons(b).index;
                Ok(self.heap.alloc(Cell::Const(outcome(ka.cmp(&kb)))))
            }
            (Cell::Pair(..), Cell::Pair(..)) => {
                // Defer to the standard pair comparison, run with the
                // argument pair as the sole environment slot.
                let env = self.heap.env_cons(arg, Env::EMPTY);
                Ok(self.heap.susp(cmp_pair_body, env))
            }
            _ => Err(EvalError::exec("compared values have different shapes")),
        }
    }

    /// Comparison of function values is structural-comparison-only by
    /// decree: report rather than diverge.
    fn reject_function(&self, value: CellId) -> Eval<()> {
        if let Cell::PApp { expr, .. } = self.heap.get(value) {
            let message = match self.exprs.get(*expr) {
                Expr::Defun(f) => format!(
                    "'{}': cannot compare functions",
                    self.interner.text(self.env.func(*f).name)
                ),
                Expr::Cons(c) => format!(
                    "'{}': cannot compare partially applied constructors",
                    self.interner.text(self.env.cons(*c).name)
                ),
                _ => "cannot compare functions".to_string(),
            };
            return Err(EvalError::exec(message));
        }
        if let Cell::Susp(expr, _) = self.heap.get(value) {
            if matches!(self.exprs.get(*expr), Expr::Return) {
                return Err(EvalError::exec("cannot compare output values"));
            }
        }
        Ok(())
    }
}
