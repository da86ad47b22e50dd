//! Decision trees.
//!
//! The compiled form of all equations of one function (or lambda). Upper
//! case nodes dispatch on the value at a `(level, path)` position or
//! terminate in success, match failure, or a strict builtin body. Lower
//! case nodes carry the per-discriminator limbs.
//!
//! `Case` nodes are shared between trees; `refs` counts the live pointers
//! into a node from other decision-tree structure, and mutation goes
//! through copy-on-write when a node is shared.

use std::collections::BTreeMap;

use crate::expr::ExprId;
use crate::ids::FuncId;
use crate::path::Path;

/// Index of a decision-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaseId(u32);

impl CaseId {
    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize { self.0 as usize }
}

/// Limb index for the `LESS` outcome of a numeric dispatch.
pub const NUM_LESS: usize = 0;
/// Limb index for the `EQUAL` outcome of a numeric dispatch.
pub const NUM_EQUAL: usize = 1;
/// Limb index for the `GREATER` outcome of a numeric dispatch.
pub const NUM_GREATER: usize = 2;

/// A dispatching node's limbs.
#[derive(Debug, Clone)]
pub enum LCase {
    /// One limb per data constructor of the scrutinee's type.
    Algebraic {
        /// Limbs indexed by constructor index.
        limbs: Vec<CaseId>,
    },
    /// Dispatch on the sign of a number.
    Numeric {
        /// `LESS`, `EQUAL`, `GREATER` limbs.
        limbs: [CaseId; 3],
    },
    /// Dispatch on a byte value. Populated entries are kept sparse; all
    /// other characters take the default limb.
    Character {
        /// Populated character entries.
        limbs: BTreeMap<u8, CaseId>,
        /// Limb for every unlisted character.
        default: CaseId,
    },
}

impl LCase {
    /// Number of distinct outcomes the dispatch can take.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::Algebraic { limbs } => limbs.len(),
            Self::Numeric { .. } => 3,
            Self::Character { .. } => 256,
        }
    }

    /// The limb selected by a discriminator index.
    #[must_use]
    pub fn limb(&self, index: usize) -> CaseId {
        match self {
            Self::Algebraic { limbs } => limbs[index],
            Self::Numeric { limbs } => limbs[index],
            Self::Character { limbs, default } => {
                limbs.get(&(index as u8)).copied().unwrap_or(*default)
            }
        }
    }

    /// Replaces the limb selected by a discriminator index.
    pub fn set_limb(&mut self, index: usize, value: CaseId) {
        match self {
            Self::Algebraic { limbs } => limbs[index] = value,
            Self::Numeric { limbs } => limbs[index] = value,
            Self::Character { limbs, .. } => {
                let _ = limbs.insert(index as u8, value);
            }
        }
    }

    /// Every distinct limb slot, including a character table's default.
    pub fn for_each_slot(&self, mut f: impl FnMut(CaseId)) {
        match self {
            Self::Algebraic { limbs } => limbs.iter().for_each(|&limb| f(limb)),
            Self::Numeric { limbs } => limbs.iter().for_each(|&limb| f(limb)),
            Self::Character { limbs, default } => {
                limbs.values().for_each(|&limb| f(limb));
                f(*default);
            }
        }
    }
}

/// A dispatching node.
#[derive(Debug, Clone)]
pub struct CaseNode {
    /// Actual parameter the scrutinee is reached from.
    pub level: u32,
    /// Path from that parameter to the scrutinee.
    pub path: Path,
    /// The limbs.
    pub cases: LCase,
    /// Live pointers into this node from other decision-tree structure.
    pub refs: u32,
}

/// A decision-tree node.
#[derive(Debug, Clone)]
pub enum UCase {
    /// Dispatch on the value at `(level, path)`.
    Case(CaseNode),
    /// Match failure in a defined function.
    FNoMatch(FuncId),
    /// Match failure in a lambda expression.
    LNoMatch(ExprId),
    /// All matches along this path succeeded.
    Success {
        /// The equation's right-hand side.
        body: ExprId,
        /// Number of match atoms consumed along this path; the
        /// specificity score used when merging.
        size: u32,
    },
    /// Opaque body used for builtins: the single argument is forced
    /// before the expression's native operation runs.
    Strict(ExprId),
}

/// The decision-tree arena.
#[derive(Debug, Default)]
pub struct CaseArena {
    nodes: Vec<UCase>,
}

impl CaseArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Allocates a node.
    pub fn alloc(&mut self, node: UCase) -> CaseId {
        let id = CaseId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Reads a node.
    #[must_use]
    pub fn get(&self, id: CaseId) -> &UCase { &self.nodes[id.index()] }

    /// Mutable access to a node.
    pub fn get_mut(&mut self, id: CaseId) -> &mut UCase { &mut self.nodes[id.index()] }

    /// A dispatching node with a single owner.
    pub fn case(&mut self, level: u32, path: Path, cases: LCase) -> CaseId {
        self.alloc(UCase::Case(CaseNode { level, path, cases, refs: 1 }))
    }

    /// The failure terminal for a defined function.
    pub fn f_nomatch(&mut self, func: FuncId) -> CaseId { self.alloc(UCase::FNoMatch(func)) }

    /// The failure terminal for a lambda.
    pub fn l_nomatch(&mut self, who: ExprId) -> CaseId { self.alloc(UCase::LNoMatch(who)) }

    /// A success terminal.
    pub fn success(&mut self, body: ExprId, size: u32) -> CaseId {
        self.alloc(UCase::Success { body, size })
    }

    /// A strict builtin body.
    pub fn strict(&mut self, real: ExprId) -> CaseId { self.alloc(UCase::Strict(real)) }

    /// Algebraic limbs, all defaulted.
    #[must_use]
    pub fn alg_case(arity: usize, def: CaseId) -> LCase {
        LCase::Algebraic { limbs: vec![def; arity] }
    }

    /// Numeric limbs, all defaulted.
    #[must_use]
    pub const fn num_case(def: CaseId) -> LCase { LCase::Numeric { limbs: [def; 3] } }

    /// Character limbs, all defaulted.
    #[must_use]
    pub fn char_case(def: CaseId) -> LCase {
        LCase::Character { limbs: BTreeMap::new(), default: def }
    }

    /// Records one more pointer to a node; only `Case` nodes are counted.
    pub fn add_ref(&mut self, id: CaseId) {
        if let UCase::Case(node) = self.get_mut(id) {
            node.refs += 1;
        }
    }

    /// Gives up one pointer to a node.
    pub fn drop_ref(&mut self, id: CaseId) {
        if let UCase::Case(node) = self.get_mut(id) {
            debug_assert!(node.refs > 0);
            node.refs -= 1;
        }
    }

    /// The node's reference count (1 for non-`Case` nodes, which are
    /// never shared by the merge algorithm's accounting).
    #[must_use]
    pub fn refs(&self, id: CaseId) -> u32 {
        match self.get(id) {
            UCase::Case(node) => node.refs,
            _ => 1,
        }
    }

    /// Copies a shared node for mutation. The copy owns one reference;
    /// every `Case` child gains a reference for its new parent.
    pub fn copy_case(&mut self, old: CaseId) -> CaseId {
        let copied = match self.get(old) {
            UCase::Case(node) => {
                let mut node = node.clone();
                node.refs = 1;
                UCase::Case(node)
            }
            other => other.clone(),
        };
        let id = self.alloc(copied);
        if let UCase::Case(node) = self.get(id) {
            let mut children = Vec::new();
            node.cases.for_each_slot(|limb| children.push(limb));
            for child in children {
                self.add_ref(child);
            }
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprArena;

    #[test]
    fn character_limbs_fall_back_to_default() {
        let mut exprs = ExprArena::new();
        let e0 = exprs.num(0.0);
        let e1 = exprs.num(1.0);
        let mut arena = CaseArena::new();
        let def = arena.success(e0, 0);
        let hit = arena.success(e1, 1);
        let mut lcase = CaseArena::char_case(def);
        lcase.set_limb(b'a' as usize, hit);
        assert_eq!(lcase.limb(b'a' as usize), hit);
        assert_eq!(lcase.limb(b'b' as usize), def);
        assert_eq!(lcase.arity(), 256);
    }

    #[test]
    fn copying_increments_child_references() {
        let mut exprs = ExprArena::new();
        let e0 = exprs.num(0.0);
        let mut arena = CaseArena::new();
        let leaf = arena.success(e0, 1);
        let child = arena.case(0, Path::empty(), CaseArena::num_case(leaf));
        let parent = arena.case(0, Path::empty(), CaseArena::alg_case(2, child));
        assert_eq!(arena.refs(child), 1);
        let copy = arena.copy_case(parent);
        // The copy's two limbs both point at `child`.
        assert_eq!(arena.refs(child), 3);
        assert_eq!(arena.refs(copy), 1);
    }
}
