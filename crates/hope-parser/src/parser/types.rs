//! Type-term parsing.
//!
//! Types share the operator table with expressions (`->` and `#` are
//! ordinary declared operators, applied tupled). Juxtaposed application
//! `T t1 t2` and tupled application `T(t1, t2)` are both recorded with
//! their surface form, which declarations check against.

use hope_ast::op::{prec, MIN_PREC};
use hope_ast::TypeExpr;
use hope_source::{Diagnostic, ErrorKind};

use super::{Parse, Parser};
use crate::item::ConsDecl;
use crate::token::Token;

impl Parser<'_> {
    /// A complete type term.
    pub(crate) fn parse_type(&mut self) -> Parse<TypeExpr> {
        self.type_op(prec::OP_BASE + MIN_PREC)
    }

    fn type_op(&mut self, min_level: i32) -> Parse<TypeExpr> {
        let mut lhs = self.type_apply()?;
        while let Some((name, op)) = self.peek_op() {
            if op.level() < min_level {
                break;
            }
            self.advance();
            let rhs = self.type_op(op.right_level())?;
            lhs = TypeExpr::Apply { name, tupled: true, args: vec![lhs, rhs] };
        }
        Ok(lhs)
    }

    /// `mu v => t`, `T t1 … tn`, `T(t1, …, tn)`, or an atom.
    fn type_apply(&mut self) -> Parse<TypeExpr> {
        if self.eat(&Token::Mu) {
            let var = self.ident()?;
            self.expect(&Token::Gives)?;
            let body = self.type_op(prec::OP_BASE + MIN_PREC)?;
            return Ok(TypeExpr::Mu { var, body: Box::new(body) });
        }
        match self.peek() {
            Some(Token::Ident(_)) if self.peek_op().is_none() => {
                let name = self.ident()?;
                if self.peek() == Some(&Token::LParen) {
                    if let Some(args) = self.tuple_args()? {
                        return Ok(TypeExpr::Apply { name, tupled: true, args });
                    }
                }
                let mut args = Vec::new();
                while self.at_type_atom() {
                    args.push(self.type_atom()?);
                }
                if args.is_empty() {
                    Ok(TypeExpr::Name(name))
                } else {
                    Ok(TypeExpr::Apply { name, tupled: false, args })
                }
            }
            _ => self.type_atom(),
        }
    }

    fn at_type_atom(&mut self) -> bool {
        match self.peek() {
            Some(Token::LParen) => true,
            Some(Token::Ident(_)) => self.peek_op().is_none(),
            _ => false,
        }
    }

    /// A type atom: a bare name, a tupled application, or a
    /// parenthesised type.
    fn type_atom(&mut self) -> Parse<TypeExpr> {
        match self.peek() {
            Some(Token::Ident(_)) => {
                let name = self.ident()?;
                if self.peek() == Some(&Token::LParen) {
                    if let Some(args) = self.tuple_args()? {
                        return Ok(TypeExpr::Apply { name, tupled: true, args });
                    }
                }
                Ok(TypeExpr::Name(name))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.type_op(prec::OP_BASE + MIN_PREC)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(Self::unexpected(other, "a type")),
        }
    }

    /// A parenthesised argument group after a type name. Two or more
    /// comma-separated types make a tupled application; a single type is
    /// left for juxtaposition (so `T (t)` means the same as `T t`).
    fn tuple_args(&mut self) -> Parse<Option<Vec<TypeExpr>>> {
        let start = self.save();
        self.advance(); // (
        let first = self.type_op(prec::OP_BASE + MIN_PREC)?;
        if !self.eat(&Token::Comma) {
            self.restore(start);
            return Ok(None);
        }
        let mut args = vec![first, self.type_op(prec::OP_BASE + MIN_PREC)?];
        while self.eat(&Token::Comma) {
            args.push(self.type_op(prec::OP_BASE + MIN_PREC)?);
        }
        self.expect(&Token::RParen)?;
        Ok(Some(args))
    }

    /// The alternatives of a `data` declaration: type terms separated by
    /// `++`, each re-read as a constructor with argument types.
    pub(crate) fn data_alts(&mut self) -> Parse<Vec<ConsDecl>> {
        let mut alts = vec![self.data_alt()?];
        while self.eat(&Token::Alt) {
            alts.push(self.data_alt()?);
        }
        Ok(alts)
    }

    fn data_alt(&mut self) -> Parse<ConsDecl> {
        match self.parse_type()? {
            TypeExpr::Name(name) => Ok(ConsDecl { name, tupled: false, args: Vec::new() }),
            TypeExpr::Apply { name, tupled, args } => Ok(ConsDecl { name, tupled, args }),
            TypeExpr::Mu { .. } => {
                Err(Diagnostic::new(ErrorKind::Syntax, "a constructor is required here"))
            }
        }
    }
}
