//! Expressions, branches and the expression arena.
//!
//! Expressions are addressed by [`ExprId`] into an [`ExprArena`]. Name
//! resolution rewrites nodes in place (`Var` occurrences become `Param`,
//! `Cons` or `Defun` references) and pattern compilation installs the
//! compiled decision tree into each lambda node, so the arena hands out
//! mutable access by id.

use crate::cases::CaseId;
use crate::ids::{ConsId, FuncId};
use crate::intern::Name;
use crate::path::Path;

/// Index of an expression in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

impl ExprId {
    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize { self.0 as usize }
}

/// An identifier occurrence.
///
/// Before resolution only `name` is meaningful. When the identifier turns
/// out to be a pattern variable, resolution records its slot within the
/// enclosing scope and the path from the scope's actual parameter to the
/// variable's position; expression occurrences are rewritten to
/// [`Expr::Param`] nodes pointing back here.
#[derive(Debug, Clone)]
pub struct VarExpr {
    /// The identifier.
    pub name: Name,
    /// Position among the variables of the enclosing scope.
    pub slot: u32,
    /// Path from the actual parameter to this variable's position.
    pub path: Path,
}

/// A resolved variable reference: scope-level difference plus the path
/// stored at the binding occurrence.
#[derive(Debug, Clone)]
pub struct ParamExpr {
    /// Number of scopes between the reference and the binding.
    pub level: u32,
    /// The binding occurrence (a `Var` in some pattern).
    pub patt: ExprId,
    /// Path from the environment slot to the bound position.
    pub path: Path,
}

/// The `n+k` pattern, produced by resolution from `(+) (n, k)`.
#[derive(Debug, Clone, Copy)]
pub struct PlusExpr {
    /// The pattern matched after `k` predecessor steps.
    pub arg: ExprId,
    /// The increment.
    pub incr: u32,
}

/// One formal parameter position of a branch.
#[derive(Debug, Clone)]
pub struct Formal {
    /// The pattern.
    pub pattern: ExprId,
    /// Number of program variables the pattern binds (set by resolution).
    pub nvars: u32,
}

impl Formal {
    /// A formal with its variable count still unknown.
    #[must_use]
    pub const fn new(pattern: ExprId) -> Self { Self { pattern, nvars: 0 } }
}

/// One equation of a lambda or defined function.
///
/// `formals` is kept in source order: `formals[0]` is the first argument.
/// The *last* argument is the innermost scope and sits at environment
/// level 0 during evaluation.
#[derive(Debug, Clone)]
pub struct Branch {
    /// The argument patterns, first argument first.
    pub formals: Vec<Formal>,
    /// The right-hand side.
    pub body: ExprId,
}

/// What kind of branch list a lambda node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LambdaKind {
    /// A `lambda … => …` expression (or `\`).
    Lambda,
    /// The single-equation function a `let`/`where` desugars to.
    Eqn,
    /// `(e op)`: the operator awaits its right operand.
    Presect,
    /// `(op e)`: the operator awaits its left operand.
    Postsect,
}

/// A lambda node: a list of branches sharing one arity, and the decision
/// tree compiled from them.
#[derive(Debug, Clone)]
pub struct LambdaExpr {
    /// Presentation kind.
    pub kind: LambdaKind,
    /// The equations.
    pub branches: Vec<Branch>,
    /// Common arity of all branches (the first branch's is authoritative).
    pub arity: u32,
    /// The compiled decision tree, installed by pattern compilation.
    pub code: Option<CaseId>,
}

/// Which sugared application form a node prints as.
///
/// All of these evaluate exactly like the application they wrap; the
/// recursive variants additionally tie a knot in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SugarKind {
    /// `if c then t else e`: `if_then_else` applied to three arguments.
    If,
    /// `let p == e in b`.
    Let,
    /// `letrec p == e in b`.
    Letrec,
    /// `b where p == e`.
    Where,
    /// `b whererec p == e`.
    Whererec,
}

/// A value-level `mu` expression.
#[derive(Debug, Clone)]
pub struct MuExpr {
    /// The bound pattern (a single formal).
    pub formal: Formal,
    /// The body, evaluated in an environment whose sole slot refers to
    /// the whole expression's own value.
    pub body: ExprId,
}

/// Native operations exposed as expression terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Character code of a `char`.
    Ord,
    /// Character with a given code.
    Chr,
    /// Render a number as a string.
    NumToStr,
    /// Parse a number from a string.
    StrToNum,
    /// Raise a user error.
    Error,
    /// Open a character stream on a file.
    Read,
    /// Print a value with its type.
    Print,
    /// Write one element of a `write` list.
    WriteElement,
    /// Structural comparison.
    Compare,
}

/// Unary math builtins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Math1 {
    Abs,
    Acos,
    Asin,
    Atan,
    Ceil,
    Cos,
    Cosh,
    Exp,
    Floor,
    Log,
    Log10,
    Sin,
    Sinh,
    Sqrt,
    Tanh,
}

impl Math1 {
    /// Applies the operation.
    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Abs => x.abs(),
            Self::Acos => x.acos(),
            Self::Asin => x.asin(),
            Self::Atan => x.atan(),
            Self::Ceil => x.ceil(),
            Self::Cos => x.cos(),
            Self::Cosh => x.cosh(),
            Self::Exp => x.exp(),
            Self::Floor => x.floor(),
            Self::Log => x.ln(),
            Self::Log10 => x.log10(),
            Self::Sin => x.sin(),
            Self::Sinh => x.sinh(),
            Self::Sqrt => x.sqrt(),
            Self::Tanh => x.tanh(),
        }
    }
}

/// Binary math builtins. Division by zero is a run-time error; `Div` is
/// floored division and `Mod` follows `fmod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Math2 {
    Add,
    Sub,
    Mul,
    Divide,
    Div,
    Mod,
    Atan2,
    Pow,
}

impl Math2 {
    /// Whether a zero right operand is an error.
    #[must_use]
    pub const fn checks_zero(self) -> bool { matches!(self, Self::Divide | Self::Div | Self::Mod) }

    /// Applies the operation.
    #[must_use]
    pub fn apply(self, x: f64, y: f64) -> f64 {
        match self {
            Self::Add => x + y,
            Self::Sub => x - y,
            Self::Mul => x * y,
            Self::Divide => x / y,
            Self::Div => (x / y).floor(),
            Self::Mod => x % y,
            Self::Atan2 => x.atan2(y),
            Self::Pow => x.powf(y),
        }
    }
}

/// An expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Numeric literal.
    Num(f64),
    /// Character literal.
    Char(u8),
    /// Data constructor reference.
    Cons(ConsId),
    /// Identifier, unresolved or a resolved pattern variable.
    Var(VarExpr),
    /// Resolved reference to a defined function.
    Defun(FuncId),
    /// Resolved variable reference.
    Param(ParamExpr),
    /// A pair.
    Pair(ExprId, ExprId),
    /// Application.
    Apply(ExprId, ExprId),
    /// Sugared application (`if`, `let`, `where` and recursive variants).
    Sugar(SugarKind, ExprId, ExprId),
    /// The `n+k` pattern.
    Plus(PlusExpr),
    /// Value-level `mu`.
    Mu(MuExpr),
    /// Lambda, equation, or section.
    Lambda(LambdaExpr),
    /// Native operation terminal.
    Builtin(Builtin),
    /// Unary math terminal.
    Math1(Math1),
    /// Binary math terminal.
    Math2(Math2),
    /// The post-print continuation; its suspension is its own weak head
    /// normal form.
    Return,
}

/// The expression arena.
#[derive(Debug, Default)]
pub struct ExprArena {
    exprs: Vec<Expr>,
}

impl ExprArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Allocates an expression.
    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    /// Reads an expression.
    #[must_use]
    pub fn get(&self, id: ExprId) -> &Expr { &self.exprs[id.index()] }

    /// Mutable access for the resolution and compilation rewrites.
    pub fn get_mut(&mut self, id: ExprId) -> &mut Expr { &mut self.exprs[id.index()] }

    /// Replaces an expression wholesale.
    pub fn set(&mut self, id: ExprId, expr: Expr) { self.exprs[id.index()] = expr; }

    /// Number of live expressions.
    #[must_use]
    pub fn len(&self) -> usize { self.exprs.len() }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.exprs.is_empty() }

    /// An unresolved identifier occurrence.
    pub fn var(&mut self, name: Name) -> ExprId {
        self.alloc(Expr::Var(VarExpr { name, slot: 0, path: Path::empty() }))
    }

    /// A numeric literal.
    pub fn num(&mut self, n: f64) -> ExprId { self.alloc(Expr::Num(n)) }

    /// A character literal.
    pub fn char(&mut self, c: u8) -> ExprId { self.alloc(Expr::Char(c)) }

    /// A constructor reference.
    pub fn cons(&mut self, c: ConsId) -> ExprId { self.alloc(Expr::Cons(c)) }

    /// An application.
    pub fn apply(&mut self, func: ExprId, arg: ExprId) -> ExprId {
        self.alloc(Expr::Apply(func, arg))
    }

    /// A pair.
    pub fn pair(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.alloc(Expr::Pair(left, right))
    }

    /// A lambda with the given branches; the first branch's arity is
    /// authoritative (agreement is checked during resolution).
    pub fn lambda(&mut self, kind: LambdaKind, branches: Vec<Branch>) -> ExprId {
        let arity = branches.first().map_or(0, |br| br.formals.len() as u32);
        self.alloc(Expr::Lambda(LambdaExpr { kind, branches, arity, code: None }))
    }

    /// `if c then t else e` as a sugared application spine over
    /// `if_then_else`.
    pub fn ite(&mut self, ite_fn: ExprId, cond: ExprId, then: ExprId, orelse: ExprId) -> ExprId {
        let ct = self.apply(ite_fn, cond);
        let ctt = self.apply(ct, then);
        self.alloc(Expr::Sugar(SugarKind::If, ctt, orelse))
    }

    /// `let`/`letrec`/`where`/`whererec`: an equation lambda applied to
    /// the bound expression.
    pub fn eqn_apply(
        &mut self,
        kind: SugarKind,
        pattern: ExprId,
        subexpr: ExprId,
        body: ExprId,
    ) -> ExprId {
        let eqn = self.lambda(
            LambdaKind::Eqn,
            vec![Branch { formals: vec![Formal::new(pattern)], body: subexpr }],
        );
        self.alloc(Expr::Sugar(kind, eqn, body))
    }

    /// A string literal as a `char` list built from `::` and `nil`.
    pub fn text(&mut self, e_cons: ExprId, e_nil: ExprId, bytes: &[u8]) -> ExprId {
        let mut list = e_nil;
        for &b in bytes.iter().rev() {
            let ch = self.char(b);
            let cell = self.pair(ch, list);
            list = self.apply(e_cons, cell);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_takes_arity_from_first_branch() {
        let mut arena = ExprArena::new();
        let p = arena.num(0.0);
        let q = arena.num(1.0);
        let body = arena.num(2.0);
        let id = arena.lambda(
            LambdaKind::Lambda,
            vec![Branch { formals: vec![Formal::new(p), Formal::new(q)], body }],
        );
        match arena.get(id) {
            Expr::Lambda(lambda) => assert_eq!(lambda.arity, 2),
            other => panic!("expected lambda, got {other:?}"),
        }
    }

    #[test]
    fn text_builds_a_right_nested_list() {
        let mut arena = ExprArena::new();
        let e_cons = arena.num(0.0); // stands in for the :: reference
        let e_nil = arena.num(1.0);
        let s = arena.text(e_cons, e_nil, b"ab");
        // apply(cons, pair('a', apply(cons, pair('b', nil))))
        let Expr::Apply(_, arg) = arena.get(s) else { panic!("expected apply") };
        let Expr::Pair(head, tail) = arena.get(*arg) else { panic!("expected pair") };
        assert!(matches!(arena.get(*head), Expr::Char(b'a')));
        assert!(matches!(arena.get(*tail), Expr::Apply(..)));
    }
}
