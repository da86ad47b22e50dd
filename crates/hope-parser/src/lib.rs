//! Lexer and parser for the Hope language.
//!
//! Lexing is line-oriented and produces [`token::Token`]s; the session
//! driver collects tokens up to a terminating `;` and hands the slice to
//! a [`parser::Parser`], which builds an [`item::Item`] with its
//! expressions allocated into the shared arena. Operator precedence is
//! resolved through [`hope_ast::OpResolver`], so parsing always sees the
//! operators visible in the module being read.

pub mod item;
pub mod parser;
pub mod token;

pub use item::{ConsDecl, Item, ParamDecl, PolarityMark, TypeHeader};
pub use parser::Parser;
pub use token::{lex_line, Token};
