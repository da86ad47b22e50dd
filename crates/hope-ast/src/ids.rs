//! Index ids addressing the interpreter's permanent tables.
//!
//! The tables themselves (declared types, data constructors, functions,
//! modules) are owned by the analysis layer; the ids are defined here so
//! that expressions and types can refer to table entries without a
//! dependency cycle.

macro_rules! table_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Creates an id with the given index.
            #[must_use]
            pub const fn new(index: usize) -> Self { Self(index as u32) }

            /// Returns the index this id wraps.
            #[must_use]
            pub const fn index(self) -> usize { self.0 as usize }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}:{}", stringify!($name), self.0)
            }
        }
    };
}

table_id! {
    /// A declared type constructor (data type, synonym or abstract type).
    DefTypeId
}

table_id! {
    /// A data constructor.
    ConsId
}

table_id! {
    /// A defined (or declared) value name.
    FuncId
}

table_id! {
    /// A module in the module graph.
    ModuleId
}
