//! The identifier pool.
//!
//! All identifiers are interned once; equality of [`Name`]s is equality of
//! pool indices, which stands in for the pointer equality the interpreter
//! relies on throughout.

use std::fmt;

use rustc_hash::FxHashMap;

/// An interned identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(u32);

impl Name {
    /// Returns the pool index of this name.
    #[must_use]
    pub const fn index(self) -> usize { self.0 as usize }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "name:{}", self.0) }
}

/// The string pool.
#[derive(Debug, Default)]
pub struct Interner {
    map: FxHashMap<Box<str>, Name>,
    strings: Vec<Box<str>>,
}

impl Interner {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Interns a string, returning its unique name.
    pub fn intern(&mut self, text: &str) -> Name {
        if let Some(&name) = self.map.get(text) {
            return name;
        }
        let name = Name(self.strings.len() as u32);
        self.strings.push(text.into());
        let _ = self.map.insert(text.into(), name);
        name
    }

    /// Allocates a name that can never be produced by [`Self::intern`].
    ///
    /// Used for generated identifiers such as the bound variable of
    /// operator sections, which must differ from every source identifier.
    pub fn fresh(&mut self, display: &str) -> Name {
        let name = Name(self.strings.len() as u32);
        self.strings.push(display.into());
        name
    }

    /// The text of a name.
    #[must_use]
    pub fn text(&self, name: Name) -> &str { &self.strings[name.index()] }

    /// Looks a string up without interning it.
    #[must_use]
    pub fn lookup(&self, text: &str) -> Option<Name> { self.map.get(text).copied() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut pool = Interner::new();
        let a = pool.intern("map");
        let b = pool.intern("map");
        assert_eq!(a, b);
        assert_eq!(pool.text(a), "map");
        assert_ne!(a, pool.intern("fold"));
    }

    #[test]
    fn fresh_names_never_collide() {
        let mut pool = Interner::new();
        let x = pool.intern("x'");
        let fresh = pool.fresh("x'");
        assert_ne!(x, fresh);
        assert_eq!(pool.lookup("x'"), Some(x));
        assert_eq!(pool.text(fresh), "x'");
    }
}
