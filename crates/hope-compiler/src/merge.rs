//! Merging one equation's match chain into the decision tree.
//!
//! The merge is recursive on the current tree node, comparing the
//! current match entry's `(level, path)` position against the node's:
//! an earlier position inserts a new dispatch above the node, a later
//! one pushes the chain into every limb, an equal one follows only the
//! limb the entry selects. Shared nodes are copied before mutation.
//!
//! Reference counts are kept exact: every placement of a `Case` node
//! into a limb slot adds a reference and every displaced slot gives one
//! up, so a count always equals the number of live pointers into the
//! node.

use hope_ast::cases::LCase;
use hope_ast::{CaseArena, CaseId, Path, UCase};

/// One atomic discrimination of a match list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discriminant {
    /// Constructor dispatch: the parent type's constructor count and the
    /// selected index.
    Algebraic {
        /// Number of constructors of the scrutinee's type.
        ncases: usize,
        /// The selected constructor's index.
        index: usize,
    },
    /// Numeric dispatch on `n CMP 0`; the payload is `NUM_EQUAL` or
    /// `NUM_GREATER`.
    Numeric(usize),
    /// Character dispatch on a byte value.
    Character(u8),
}

/// One match-list entry.
#[derive(Debug, Clone)]
pub struct MatchEntry {
    /// Scope level of the actual parameter.
    pub level: u32,
    /// Path from the parameter to the scrutinee.
    pub path: Path,
    /// The discrimination at that position.
    pub disc: Discriminant,
}

impl MatchEntry {
    /// The selected limb index.
    fn index(&self) -> usize {
        match &self.disc {
            Discriminant::Algebraic { index, .. } => *index,
            Discriminant::Numeric(index) => *index,
            Discriminant::Character(c) => *c as usize,
        }
    }

    fn before(&self, level: u32, path: &Path) -> bool {
        self.level < level || (self.level == level && self.path < *path)
    }

    fn after(&self, level: u32, path: &Path) -> bool {
        level < self.level || (level == self.level && *path < self.path)
    }
}

/// The merge of one equation into an existing tree.
pub struct Merge<'a> {
    cases: &'a mut CaseArena,
    matches: Vec<MatchEntry>,
    pos: usize,
    size: u32,
    new_body: CaseId,
}

impl<'a> Merge<'a> {
    /// Prepares a merge of the given match list and success node.
    pub fn new(
        cases: &'a mut CaseArena,
        matches: Vec<MatchEntry>,
        size: u32,
        new_body: CaseId,
    ) -> Self {
        Self { cases, matches, pos: 0, size, new_body }
    }

    fn cur(&self) -> Option<&MatchEntry> { self.matches.get(self.pos) }

    /// Generates the skinny matching chain for the remaining entries,
    /// with the new success at the leaf and `failure` at every side
    /// branch.
    fn gen_tree(&mut self, pos: usize, failure: CaseId) -> CaseId {
        if pos >= self.matches.len() {
            return self.new_body;
        }
        let subtree = self.gen_tree(pos + 1, failure);
        let entry = self.matches[pos].clone();
        self.new_node(&entry, failure, subtree)
    }

    /// A dispatch node for one entry: the selected limb holds `subtree`,
    /// everything else defaults to `failure`.
    fn new_node(&mut self, entry: &MatchEntry, failure: CaseId, subtree: CaseId) -> CaseId {
        let index = entry.index();
        let (mut lcase, default_slots) = match &entry.disc {
            Discriminant::Algebraic { ncases, .. } => {
                (CaseArena::alg_case(*ncases, failure), ncases - 1)
            }
            Discriminant::Numeric(_) => (CaseArena::num_case(failure), 2),
            Discriminant::Character(_) => (CaseArena::char_case(failure), 1),
        };
        lcase.set_limb(index, subtree);
        // The subtree's pending reference moves into its slot; each
        // default slot is a fresh pointer to the failure tree.
        for _ in 0..default_slots {
            self.cases.add_ref(failure);
        }
        self.cases.case(entry.level, entry.path.clone(), lcase)
    }

    /// Merges the remaining entries into the tree rooted at `old`.
    /// Consumes the caller's pointer to `old` and returns the node to
    /// install in its place.
    pub fn merge(&mut self, old: CaseId) -> CaseId {
        match self.cases.get(old).clone() {
            UCase::FNoMatch(_) | UCase::LNoMatch(_) => {
                // Do all the matching in front of the failure.
                self.gen_tree(self.pos, old)
            }
            UCase::Success { size, .. } => {
                if size < self.size {
                    // The new equation is strictly more specific.
                    self.gen_tree(self.pos, old)
                } else {
                    old
                }
            }
            UCase::Case(node) => {
                let level = node.level;
                let path = node.path.clone();
                if self.cur().is_some_and(|entry| entry.before(level, &path)) {
                    let entry = self.cur().cloned().expect("current entry");
                    let subtree = self.sub_merge(old);
                    return self.new_node(&entry, old, subtree);
                }
                let old = if self.cases.refs(old) > 1 {
                    self.cases.drop_ref(old);
                    self.cases.copy_case(old)
                } else {
                    old
                };
                let after = match self.cur() {
                    None => true,
                    Some(entry) => entry.after(level, &path),
                };
                if after {
                    // The chain belongs below every limb, side branches
                    // included.
                    self.map_limbs(old);
                } else {
                    // Same place: keep following the selected limb.
                    let index = self.cur().map(MatchEntry::index).expect("current entry");
                    let limb = self.limb(old, index);
                    if !self.has_own_entry(old, index) {
                        // A sparse character table materialises a new
                        // slot out of the shared default.
                        self.cases.add_ref(limb);
                    }
                    let merged = self.sub_merge(limb);
                    self.set_limb(old, index, merged);
                }
                old
            }
            UCase::Strict(_) => unreachable!("builtin bodies are never merged into"),
        }
    }

    fn sub_merge(&mut self, old: CaseId) -> CaseId {
        self.pos += 1;
        let merged = self.merge(old);
        self.pos -= 1;
        merged
    }

    fn map_limbs(&mut self, node: CaseId) {
        let lcase = match self.cases.get(node) {
            UCase::Case(case) => case.cases.clone(),
            _ => unreachable!("only case nodes have limbs"),
        };
        match lcase {
            LCase::Algebraic { limbs } => {
                for (i, limb) in limbs.into_iter().enumerate() {
                    let merged = self.merge(limb);
                    self.set_limb(node, i, merged);
                }
            }
            LCase::Numeric { limbs } => {
                for (i, limb) in limbs.into_iter().enumerate() {
                    let merged = self.merge(limb);
                    self.set_limb(node, i, merged);
                }
            }
            LCase::Character { limbs, default } => {
                for (c, limb) in limbs {
                    let merged = self.merge(limb);
                    self.set_limb(node, c as usize, merged);
                }
                let merged = self.merge(default);
                if let UCase::Case(case) = self.cases.get_mut(node) {
                    if let LCase::Character { default, .. } = &mut case.cases {
                        *default = merged;
                    }
                }
            }
        }
    }

    fn limb(&self, node: CaseId, index: usize) -> CaseId {
        match self.cases.get(node) {
            UCase::Case(case) => case.cases.limb(index),
            _ => unreachable!("only case nodes have limbs"),
        }
    }

    fn has_own_entry(&self, node: CaseId, index: usize) -> bool {
        match self.cases.get(node) {
            UCase::Case(case) => match &case.cases {
                LCase::Character { limbs, .. } => limbs.contains_key(&(index as u8)),
                LCase::Algebraic { .. } | LCase::Numeric { .. } => true,
            },
            _ => true,
        }
    }

    fn set_limb(&mut self, node: CaseId, index: usize, value: CaseId) {
        if let UCase::Case(case) = self.cases.get_mut(node) {
            case.cases.set_limb(index, value);
        }
    }
}
