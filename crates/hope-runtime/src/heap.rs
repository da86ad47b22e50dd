//! Evaluation cells.
//!
//! All run-time values live in one heap of cells, discarded wholesale
//! after each top-level expression. `evaluate` updates a cell in place
//! with its weak head normal form, which memoizes every force;
//! update-in-place is sound because evaluation is sequential.
//!
//! Environments are right-nested cons lists of `Env` cells; a
//! `Param(level, path)` reference indexes `level` links from the tip and
//! projects with `path`.

use hope_ast::{CaseId, ConsId, ExprId, Path};

/// Index of an evaluation cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(u32);

impl CellId {
    /// Returns the heap index.
    #[must_use]
    pub const fn index(self) -> usize { self.0 as usize }
}

/// An environment: a chain of [`Cell::Env`] cells, possibly empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Env(pub Option<CellId>);

impl Env {
    /// The empty environment.
    pub const EMPTY: Self = Self(None);
}

/// An open character stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamId {
    /// The terminal's line-buffered input.
    Stdin,
    /// An open file.
    File(usize),
}

/// An evaluation cell.
#[derive(Debug, Clone)]
pub enum Cell {
    /// A number.
    Num(f64),
    /// An 8-bit character.
    Char(u8),
    /// A nullary data constructor.
    Const(ConsId),
    /// A constructor with its argument: an atom for one argument, a
    /// pair spine for more.
    Cons(ConsId, CellId),
    /// A pair.
    Pair(CellId, CellId),
    /// A pending projection.
    Dirs(Path, CellId),
    /// An unevaluated expression closed over an environment.
    Susp(ExprId, Env),
    /// A function applied to fewer arguments than its arity.
    PApp {
        /// The function expression (`Defun`, `Cons` or a lambda).
        expr: ExprId,
        /// Environment with the supplied arguments prepended.
        env: Env,
        /// Arguments still awaited.
        remaining: u32,
    },
    /// Decision-tree drive state.
    Case(CaseId, Env),
    /// One environment link.
    Env {
        /// The actual parameter, lazily evaluated.
        arg: CellId,
        /// The enclosing environment.
        next: Env,
    },
    /// An external character stream; forcing reads one character.
    Stream(StreamId),
    /// Placeholder for knot-tying; never survives a reduction step.
    Hole,
}

impl Cell {
    /// Whether the cell is already in weak head normal form.
    #[must_use]
    pub const fn is_whnf(&self) -> bool {
        matches!(
            self,
            Self::Num(_)
                | Self::Char(_)
                | Self::Const(_)
                | Self::Cons(..)
                | Self::Pair(..)
                | Self::PApp { .. }
        )
    }
}

/// The evaluation heap.
#[derive(Debug, Default)]
pub struct Heap {
    cells: Vec<Cell>,
}

impl Heap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Discards every cell; called before each top-level evaluation.
    pub fn reset(&mut self) { self.cells.clear(); }

    /// Allocates a cell.
    pub fn alloc(&mut self, cell: Cell) -> CellId {
        let id = CellId(self.cells.len() as u32);
        self.cells.push(cell);
        id
    }

    /// Reads a cell.
    #[must_use]
    pub fn get(&self, id: CellId) -> &Cell { &self.cells[id.index()] }

    /// Overwrites a cell (the memoizing update).
    pub fn set(&mut self, id: CellId, cell: Cell) { self.cells[id.index()] = cell; }

    /// Copies the contents of `from` over `to`.
    pub fn update_from(&mut self, to: CellId, from: CellId) {
        if to != from {
            self.cells[to.index()] = self.cells[from.index()].clone();
        }
    }

    /// A suspension.
    pub fn susp(&mut self, expr: ExprId, env: Env) -> CellId {
        self.alloc(Cell::Susp(expr, env))
    }

    /// Extends an environment with one argument cell.
    pub fn env_cons(&mut self, arg: CellId, next: Env) -> Env {
        Env(Some(self.alloc(Cell::Env { arg, next })))
    }

    /// The argument cell `level` links from the tip.
    #[must_use]
    pub fn env_nth(&self, env: Env, level: u32) -> CellId {
        let mut env = env;
        for _ in 0..level {
            match self.get(env.0.expect("environment deep enough")) {
                Cell::Env { next, .. } => env = *next,
                _ => unreachable!("environments are Env chains"),
            }
        }
        match self.get(env.0.expect("environment deep enough")) {
            Cell::Env { arg, .. } => *arg,
            _ => unreachable!("environments are Env chains"),
        }
    }

    /// The enclosing environment one link out.
    #[must_use]
    pub fn env_next(&self, env: Env) -> Env {
        match env.0 {
            Some(id) => match self.get(id) {
                Cell::Env { next, .. } => *next,
                _ => unreachable!("environments are Env chains"),
            },
            None => Env::EMPTY,
        }
    }

    /// Back-patches an environment link's argument (knot-tying for the
    /// recursive binders).
    pub fn patch_env_arg(&mut self, env: Env, arg: CellId) {
        let id = env.0.expect("a link to patch");
        match &mut self.cells[id.index()] {
            Cell::Env { arg: slot, .. } => *slot = arg,
            _ => unreachable!("environments are Env chains"),
        }
    }

    /// Number of live cells.
    #[must_use]
    pub fn len(&self) -> usize { self.cells.len() }

    /// Whether the heap is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environments_index_from_the_tip() {
        let mut heap = Heap::new();
        let a = heap.alloc(Cell::Num(1.0));
        let b = heap.alloc(Cell::Num(2.0));
        let env = heap.env_cons(a, Env::EMPTY);
        let env = heap.env_cons(b, env);
        assert_eq!(heap.env_nth(env, 0), b);
        assert_eq!(heap.env_nth(env, 1), a);
    }

    #[test]
    fn knots_can_be_tied() {
        let mut heap = Heap::new();
        let hole = heap.alloc(Cell::Hole);
        let env = heap.env_cons(hole, Env::EMPTY);
        let value = heap.alloc(Cell::Num(7.0));
        heap.patch_env_arg(env, value);
        assert_eq!(heap.env_nth(env, 0), value);
    }
}
