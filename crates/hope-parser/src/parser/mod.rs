//! The recursive-descent parser.
//!
//! A parser instance works through the tokens of a single `;`-terminated
//! item. Expressions go into the shared arena; operator parsing consults
//! the module tables through the [`OpResolver`] seam, so precedence and
//! associativity always reflect the operators visible where the item is
//! read.

mod exprs;
mod types;

use hope_ast::{Assoc, ExprArena, ExprId, Interner, Name, Op, OpResolver};
use hope_source::{Diagnostic, ErrorKind};

use crate::item::{Item, ParamDecl, PolarityMark, TypeHeader};
use crate::token::Token;

pub(crate) type Parse<T> = Result<T, Diagnostic>;

/// Parser over one item's tokens.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    interner: &'a mut Interner,
    exprs: &'a mut ExprArena,
    ops: &'a dyn OpResolver,
    /// The shared `::` and `nil` references backing list and string
    /// syntax, once the standard list type exists.
    list_exprs: Option<(ExprId, ExprId)>,
}

impl<'a> Parser<'a> {
    /// Creates a parser over an item's tokens.
    #[must_use]
    pub fn new(
        tokens: &'a [Token],
        interner: &'a mut Interner,
        exprs: &'a mut ExprArena,
        ops: &'a dyn OpResolver,
        list_exprs: Option<(ExprId, ExprId)>,
    ) -> Self {
        Self { tokens, pos: 0, interner, exprs, ops, list_exprs }
    }

    /// Parses the item.
    ///
    /// # Errors
    ///
    /// Returns a syntax diagnostic on malformed input; the caller skips
    /// to the next `;`.
    pub fn parse_item(&mut self) -> Parse<Item> {
        let item = match self.peek() {
            None | Some(Token::Semi) => Item::Empty,
            Some(Token::Uses) => {
                self.advance();
                Item::Uses(self.name_list()?)
            }
            Some(Token::Typevar) => {
                self.advance();
                Item::Typevars(self.name_list()?)
            }
            Some(Token::Infix | Token::Infixr) => self.op_decl()?,
            Some(Token::Dec) => {
                self.advance();
                let name = self.any_name()?;
                self.expect(&Token::Colon)?;
                let ty = self.parse_type()?;
                Item::Dec { name, ty }
            }
            Some(Token::Data) => {
                self.advance();
                let header = self.type_header()?;
                self.expect(&Token::DefEq)?;
                let alts = self.data_alts()?;
                Item::Data { header, alts }
            }
            Some(Token::Type) => {
                self.advance();
                let header = self.type_header()?;
                self.expect(&Token::DefEq)?;
                let body = self.parse_type()?;
                Item::Synonym { header, body }
            }
            Some(Token::Abstype) => {
                self.advance();
                let mut headers = vec![self.type_header()?];
                while self.eat(&Token::Comma) {
                    headers.push(self.type_header()?);
                }
                Item::Abstype(headers)
            }
            Some(Token::Valof) => {
                self.advance();
                let lhs = self.parse_expr()?;
                self.expect(&Token::Is)?;
                let rhs = self.parse_expr()?;
                Item::Def { lhs, rhs }
            }
            Some(Token::Private) => {
                self.advance();
                Item::Private
            }
            Some(Token::Display) => {
                self.advance();
                Item::Display
            }
            Some(Token::Exit) => {
                self.advance();
                Item::Exit
            }
            Some(Token::Save) => {
                self.advance();
                let name = self.ident()?;
                Item::Save(name)
            }
            Some(Token::Edit) => {
                self.advance();
                let name = match self.peek() {
                    Some(Token::Ident(_)) => Some(self.ident()?),
                    _ => None,
                };
                Item::Edit(name)
            }
            Some(Token::Write) => {
                self.advance();
                let expr = self.parse_expr()?;
                let file = if self.eat(&Token::To) {
                    match self.next() {
                        Some(Token::Literal(bytes)) => Some(bytes.clone()),
                        other => return Err(Self::unexpected(other, "a file name string")),
                    }
                } else {
                    None
                };
                Item::Write { expr, file }
            }
            Some(_) => Item::Eval(self.parse_expr()?),
        };
        self.finish_item()?;
        Ok(item)
    }

    /// Requires the terminating `;` (or end of the token slice, which the
    /// reader only produces at a file boundary).
    fn finish_item(&mut self) -> Parse<()> {
        match self.peek() {
            None => Ok(()),
            Some(Token::Semi) => {
                self.advance();
                Ok(())
            }
            other => Err(Self::unexpected(other, "';'")),
        }
    }

    fn op_decl(&mut self) -> Parse<Item> {
        let assoc = match self.next() {
            Some(Token::Infix) => Assoc::Left,
            _ => Assoc::Right,
        };
        let name = self.any_name()?;
        self.expect(&Token::Colon)?;
        let prec = match self.next() {
            Some(Token::Number(n)) => *n as i32,
            other => return Err(Self::unexpected(other, "a precedence")),
        };
        Ok(Item::Op { name, prec, assoc })
    }

    /// `a, b, c`: used by `uses` and `typevar`.
    fn name_list(&mut self) -> Parse<Vec<Name>> {
        let mut names = vec![self.ident()?];
        while self.eat(&Token::Comma) {
            names.push(self.ident()?);
        }
        Ok(names)
    }

    /// The header of a type declaration: `T a b`, `T(a, b)` or `a OP b`
    /// (parameters may carry `pos`/`neg`/`none` polarity markers).
    fn type_header(&mut self) -> Parse<TypeHeader> {
        // An infix header starts with a (possibly marked) parameter,
        // not the type name.
        let infix = match (self.peek(), self.peek_at(1), self.peek_at(2)) {
            (Some(Token::Ident(_)), Some(Token::Oper(_)), _) => true,
            (Some(Token::Ident(word)), Some(Token::Ident(_)), Some(Token::Oper(_))) => {
                matches!(word.as_str(), "pos" | "neg" | "none")
            }
            _ => false,
        };
        if infix {
            let left = self.header_param()?;
            let name = self.any_name()?;
            let right = self.header_param()?;
            return Ok(TypeHeader { name, tupled: true, params: vec![left, right] });
        }
        let name = self.any_name()?;
        if self.eat(&Token::LParen) {
            let mut params = vec![self.header_param()?];
            while self.eat(&Token::Comma) {
                params.push(self.header_param()?);
            }
            self.expect(&Token::RParen)?;
            return Ok(TypeHeader { name, tupled: true, params });
        }
        let mut params = Vec::new();
        while matches!(self.peek(), Some(Token::Ident(_))) {
            params.push(self.header_param()?);
        }
        Ok(TypeHeader { name, tupled: false, params })
    }

    /// One header parameter, with an optional polarity marker
    /// (`pos a`, `neg a`, `none a`).
    fn header_param(&mut self) -> Parse<ParamDecl> {
        let polarity = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Ident(word)), Some(Token::Ident(_))) => {
                let mark = match word.as_str() {
                    "pos" => Some(PolarityMark::Pos),
                    "neg" => Some(PolarityMark::Neg),
                    "none" => Some(PolarityMark::None),
                    _ => None,
                };
                if mark.is_some() {
                    self.advance();
                }
                mark
            }
            _ => None,
        };
        let name = self.ident()?;
        Ok(ParamDecl { name, polarity })
    }

    // ---- token plumbing ----

    pub(crate) fn peek(&self) -> Option<&'a Token> { self.tokens.get(self.pos) }

    pub(crate) fn peek_at(&self, ahead: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + ahead)
    }

    pub(crate) fn advance(&mut self) { self.pos += 1; }

    pub(crate) fn save(&self) -> usize { self.pos }

    pub(crate) fn restore(&mut self, pos: usize) { self.pos = pos; }

    pub(crate) fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    pub(crate) fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, token: &Token) -> Parse<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(Self::unexpected(self.peek(), &token.describe()))
        }
    }

    pub(crate) fn unexpected(found: Option<&Token>, wanted: &str) -> Diagnostic {
        let found = found.map_or_else(|| "end of input".to_string(), Token::describe);
        Diagnostic::new(ErrorKind::Syntax, format!("expected {wanted}, found {found}"))
    }

    /// An alphabetic identifier.
    pub(crate) fn ident(&mut self) -> Parse<Name> {
        match self.next() {
            Some(Token::Ident(text)) => Ok(self.interner.intern(text)),
            other => Err(Self::unexpected(other, "an identifier")),
        }
    }

    /// An identifier or operator name (declaration positions accept
    /// either).
    pub(crate) fn any_name(&mut self) -> Parse<Name> {
        match self.next() {
            Some(Token::Ident(text) | Token::Oper(text)) => Ok(self.interner.intern(text)),
            other => Err(Self::unexpected(other, "a name")),
        }
    }

    /// The operator under the cursor, when the next token names one.
    pub(crate) fn peek_op(&mut self) -> Option<(Name, Op)> {
        match self.peek() {
            Some(Token::Ident(text) | Token::Oper(text)) => {
                let name = self.interner.intern(text);
                self.ops.op_lookup(name).map(|op| (name, op))
            }
            _ => None,
        }
    }

    pub(crate) fn interner(&mut self) -> &mut Interner { self.interner }

    pub(crate) fn exprs(&mut self) -> &mut ExprArena { self.exprs }

    pub(crate) fn list_exprs(&self) -> Option<(ExprId, ExprId)> { self.list_exprs }
}
