//! Expression parsing.
//!
//! Binding order, loosest to tightest: `where`/`whererec`, the prefix
//! forms (`let`, `if`, `lambda`, `mu`), pairs, declared operators by
//! precedence, application by juxtaposition, atoms. Binary operators
//! apply the named function to the pair of their operands.

use hope_ast::expr::MuExpr;
use hope_ast::op::{prec, MIN_PREC};
use hope_ast::{Branch, Expr, ExprId, Formal, LambdaKind, SugarKind};
use hope_source::{Diagnostic, ErrorKind};

use super::{Parse, Parser};
use crate::token::Token;

impl Parser<'_> {
    /// A complete expression, including trailing `where` clauses.
    pub(crate) fn parse_expr(&mut self) -> Parse<ExprId> {
        let mut value = self.val_expr()?;
        loop {
            let kind = match self.peek() {
                Some(Token::Where) => SugarKind::Where,
                Some(Token::Whererec) => SugarKind::Whererec,
                _ => break,
            };
            self.advance();
            let pattern = self.pair_expr()?;
            self.expect(&Token::DefEq)?;
            let bound = self.val_expr()?;
            value = self.exprs().eqn_apply(kind, pattern, value, bound);
        }
        Ok(value)
    }

    /// An expression without trailing `where` clauses.
    fn val_expr(&mut self) -> Parse<ExprId> {
        match self.peek() {
            Some(Token::Let | Token::Letrec) => {
                let kind = match self.peek() {
                    Some(Token::Letrec) => SugarKind::Letrec,
                    _ => SugarKind::Let,
                };
                self.advance();
                let pattern = self.pair_expr()?;
                self.expect(&Token::DefEq)?;
                let bound = self.parse_expr()?;
                self.expect(&Token::In)?;
                let body = self.val_expr()?;
                Ok(self.exprs().eqn_apply(kind, pattern, body, bound))
            }
            Some(Token::If) => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(&Token::Then)?;
                let then = self.parse_expr()?;
                self.expect(&Token::Else)?;
                let orelse = self.val_expr()?;
                let ite_name = self.interner().intern("if_then_else");
                let ite_fn = self.exprs().var(ite_name);
                Ok(self.exprs().ite(ite_fn, cond, then, orelse))
            }
            Some(Token::Lambda) => {
                self.advance();
                self.lambda_branches()
            }
            Some(Token::Mu) => {
                self.advance();
                let pattern = self.atom()?;
                self.expect(&Token::Gives)?;
                let body = self.val_expr()?;
                Ok(self.exprs().alloc(Expr::Mu(MuExpr { formal: Formal::new(pattern), body })))
            }
            _ => self.pair_expr(),
        }
    }

    /// `e, e, …`: right-associated pairs.
    fn pair_expr(&mut self) -> Parse<ExprId> {
        let left = self.op_expr(prec::OP_BASE + MIN_PREC)?;
        if self.eat(&Token::Comma) {
            let right = self.pair_expr()?;
            return Ok(self.exprs().pair(left, right));
        }
        Ok(left)
    }

    /// Precedence climbing over declared operators.
    fn op_expr(&mut self, min_level: i32) -> Parse<ExprId> {
        let mut lhs = self.apply_expr()?;
        while let Some((name, op)) = self.peek_op() {
            if op.level() < min_level {
                break;
            }
            // An operator directly before `)` belongs to a section.
            if self.peek_at(1) == Some(&Token::RParen) {
                break;
            }
            self.advance();
            let rhs = self.op_expr(op.right_level())?;
            let func = self.exprs().var(name);
            let arg = self.exprs().pair(lhs, rhs);
            lhs = self.exprs().apply(func, arg);
        }
        Ok(lhs)
    }

    /// Application by juxtaposition.
    fn apply_expr(&mut self) -> Parse<ExprId> {
        let mut func = self.atom()?;
        while self.at_atom() {
            let arg = self.atom()?;
            func = self.exprs().apply(func, arg);
        }
        Ok(func)
    }

    /// Whether the cursor is at the start of an atom. Identifiers that
    /// name visible operators are not atoms; they must be written `(op)`.
    fn at_atom(&mut self) -> bool {
        match self.peek() {
            Some(
                Token::Number(_)
                | Token::Char(_)
                | Token::Literal(_)
                | Token::LParen
                | Token::LBracket,
            ) => true,
            Some(Token::Ident(_)) => self.peek_op().is_none(),
            _ => false,
        }
    }

    fn atom(&mut self) -> Parse<ExprId> {
        match self.next() {
            Some(Token::Number(n)) => {
                let n = *n;
                Ok(self.exprs().num(n))
            }
            Some(Token::Char(c)) => {
                let c = *c;
                Ok(self.exprs().char(c))
            }
            Some(Token::Literal(bytes)) => {
                let bytes = bytes.clone();
                let (e_cons, e_nil) = self.require_list_syntax()?;
                Ok(self.exprs().text(e_cons, e_nil, &bytes))
            }
            Some(Token::Ident(text)) => {
                let name = self.interner().intern(text);
                Ok(self.exprs().var(name))
            }
            Some(Token::LBracket) => self.list_literal(),
            Some(Token::LParen) => self.paren_expr(),
            other => Err(Self::unexpected(other, "an expression")),
        }
    }

    /// `[ ]` or `[e, …]`.
    fn list_literal(&mut self) -> Parse<ExprId> {
        let (e_cons, e_nil) = self.require_list_syntax()?;
        if self.eat(&Token::RBracket) {
            return Ok(e_nil);
        }
        let mut elements = vec![self.op_expr(prec::OP_BASE + MIN_PREC)?];
        while self.eat(&Token::Comma) {
            elements.push(self.op_expr(prec::OP_BASE + MIN_PREC)?);
        }
        self.expect(&Token::RBracket)?;
        let mut list = e_nil;
        for element in elements.into_iter().rev() {
            let cell = self.exprs().pair(element, list);
            list = self.exprs().apply(e_cons, cell);
        }
        Ok(list)
    }

    /// The forms a `(` can open: a bare operator `(op)`, a postsection
    /// `(op e)`, a presection `(e op)`, or a parenthesised expression.
    fn paren_expr(&mut self) -> Parse<ExprId> {
        if let Some((name, _)) = self.peek_op() {
            self.advance();
            if self.eat(&Token::RParen) {
                return Ok(self.exprs().var(name));
            }
            let arg = self.op_expr(prec::OP_BASE + MIN_PREC)?;
            self.expect(&Token::RParen)?;
            return Ok(self.section(LambdaKind::Postsect, name, arg));
        }
        let inner = self.parse_expr()?;
        if let Some((name, _)) = self.peek_op() {
            if self.peek_at(1) == Some(&Token::RParen) {
                self.advance();
                self.advance();
                return Ok(self.section(LambdaKind::Presect, name, inner));
            }
        }
        self.expect(&Token::RParen)?;
        Ok(inner)
    }

    /// Builds an operator section: a single-branch lambda over a
    /// generated variable that can shadow nothing.
    fn section(&mut self, kind: LambdaKind, op_name: hope_ast::Name, arg: ExprId) -> ExprId {
        let bound = self.interner().fresh("x'");
        let formal = self.exprs().var(bound);
        let occurrence = self.exprs().var(bound);
        let func = self.exprs().var(op_name);
        let operands = match kind {
            LambdaKind::Presect => self.exprs().pair(arg, occurrence),
            _ => self.exprs().pair(occurrence, arg),
        };
        let body = self.exprs().apply(func, operands);
        self.exprs().lambda(kind, vec![Branch { formals: vec![Formal::new(formal)], body }])
    }

    /// `p… => e | p… => e | …` after the `lambda` keyword.
    fn lambda_branches(&mut self) -> Parse<ExprId> {
        let mut branches = Vec::new();
        loop {
            let mut formals = Vec::new();
            while self.at_atom() {
                formals.push(Formal::new(self.atom()?));
            }
            if formals.is_empty() {
                return Err(Diagnostic::new(
                    ErrorKind::Syntax,
                    "a lambda needs at least one pattern",
                ));
            }
            self.expect(&Token::Gives)?;
            let body = self.val_expr()?;
            branches.push(Branch { formals, body });
            if !self.eat(&Token::Bar) {
                break;
            }
        }
        Ok(self.exprs().lambda(LambdaKind::Lambda, branches))
    }

    fn require_list_syntax(&mut self) -> Parse<(ExprId, ExprId)> {
        self.list_exprs().ok_or_else(|| {
            Diagnostic::new(ErrorKind::Syntax, "list syntax used before 'list' is defined")
        })
    }
}
