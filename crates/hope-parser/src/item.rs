//! Parsed top-level items.
//!
//! One item corresponds to one `;`-terminated command, declaration or
//! definition. Expressions inside items are allocated into the shared
//! expression arena and referenced by id.

use hope_ast::{Assoc, ExprId, Name, TypeExpr};

/// A declared polarity marker on an abstract type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarityMark {
    /// Covariant.
    Pos,
    /// Contravariant.
    Neg,
    /// Unused.
    None,
}

/// One formal parameter of a type declaration's header.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    /// The parameter's name.
    pub name: Name,
    /// Polarity marker, if written (abstract types only).
    pub polarity: Option<PolarityMark>,
}

/// The header of a `data`/`type`/`abstype` declaration.
#[derive(Debug, Clone)]
pub struct TypeHeader {
    /// The type constructor being declared.
    pub name: Name,
    /// Whether the parameters were written tupled (or infix).
    pub tupled: bool,
    /// The formal parameters.
    pub params: Vec<ParamDecl>,
}

/// One alternative of a `data` declaration.
#[derive(Debug, Clone)]
pub struct ConsDecl {
    /// The constructor's name.
    pub name: Name,
    /// Whether the arguments were written tupled (or infix).
    pub tupled: bool,
    /// The argument types.
    pub args: Vec<TypeExpr>,
}

/// A parsed top-level item.
#[derive(Debug, Clone)]
pub enum Item {
    /// A lone `;`.
    Empty,
    /// `uses M, N;`
    Uses(Vec<Name>),
    /// `typevar a, b;`
    Typevars(Vec<Name>),
    /// `infix OP : P;` or `infixr OP : P;`
    Op {
        /// The operator.
        name: Name,
        /// Declared precedence (clamped later).
        prec: i32,
        /// Associativity.
        assoc: Assoc,
    },
    /// `data H == a ++ b;`
    Data {
        /// The header.
        header: TypeHeader,
        /// The alternatives.
        alts: Vec<ConsDecl>,
    },
    /// `type H == t;`
    Synonym {
        /// The header.
        header: TypeHeader,
        /// The right-hand side.
        body: TypeExpr,
    },
    /// `abstype H, H';`
    Abstype(Vec<TypeHeader>),
    /// `dec x : t;`
    Dec {
        /// The declared name.
        name: Name,
        /// The declared type.
        ty: TypeExpr,
    },
    /// `--- lhs <= rhs;`
    Def {
        /// The left-hand side application spine.
        lhs: ExprId,
        /// The right-hand side.
        rhs: ExprId,
    },
    /// `private;`
    Private,
    /// `display;`
    Display,
    /// `save NAME;`
    Save(Name),
    /// `exit;`
    Exit,
    /// `edit;` or `edit M;`
    Edit(Option<Name>),
    /// `write e;` or `write e to "file";`
    Write {
        /// The list-valued expression.
        expr: ExprId,
        /// Target file name, or `None` for standard output.
        file: Option<Vec<u8>>,
    },
    /// An expression to evaluate and print.
    Eval(ExprId),
}
