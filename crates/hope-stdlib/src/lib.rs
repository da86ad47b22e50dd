//! The standard environment of the Hope interpreter.
//!
//! `Standard` is ordinary Hope source, embedded so the interpreter needs
//! no library path to start. It declares the built-in type structure
//! (`->`, `#`, `bool`, `num` with its distinguished `succ` constructor,
//! `char`, `list`, `order`, `output`), the builtins the runtime installs
//! native code for, the comparison support functions, and a small list
//! library. An error while reading it is a library error and fatal.

/// The `Standard` module source.
pub const STANDARD_SOURCE: &str = include_str!("standard.hop");

/// The module's name.
pub const STANDARD_NAME: &str = "Standard";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_declares_the_required_names() {
        for needed in [
            "data bool",
            "data num",
            "data list",
            "data order",
            "abstype char",
            "dec compare",
            "dec cmp_pair",
            "dec print",
            "dec write_element",
            "dec write_list",
            "dec return",
            "dec id",
            "dec argv",
        ] {
            assert!(STANDARD_SOURCE.contains(needed), "missing: {needed}");
        }
    }
}
