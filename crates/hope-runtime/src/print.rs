//! Printing of values and expressions.
//!
//! Value printing walks weak head normal forms, forcing sub-structure as
//! it goes: lists and strings print in their surface syntax when the
//! spine forces without error, operator constructors print infix, and
//! partial applications print as the named function applied to its
//! forced arguments. A force failure during printing keeps what was
//! reached and appends an ellipsis.
//!
//! Expression printing is used for diagnostics, for `display`/`save`
//! dumps, and for lambda values; parameters bound outside the printed
//! fragment are fetched from the captured environment.

use hope_ast::op::prec;
use hope_ast::{Branch, Expr, ExprId, FuncId, LambdaKind, Name, SugarKind};

use crate::builtins::num_to_string;
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::heap::{Cell, CellId, Env};

type Print = Result<(), EvalError>;

/// Accumulating print state.
pub(crate) struct Printer {
    out: String,
    envs: Vec<Env>,
    in_definition: bool,
}

impl Printer {
    fn new() -> Self { Self { out: String::new(), envs: Vec::new(), in_definition: false } }

    fn push(&mut self, text: &str) { self.out.push_str(text); }
}

/// Escapes one character the way literals are written.
fn push_char(out: &mut String, c: u8) {
    match c {
        0x07 => out.push_str("\\a"),
        0x08 => out.push_str("\\b"),
        0x0c => out.push_str("\\f"),
        b'\n' => out.push_str("\\n"),
        b'\r' => out.push_str("\\r"),
        b'\t' => out.push_str("\\t"),
        0x0b => out.push_str("\\v"),
        c if c < 0x20 || c == 0x7f => out.push_str(&format!("\\{c:03o}")),
        c => out.push(char::from(c)),
    }
}

impl Evaluator<'_> {
    // ---- public entry points ----

    /// Renders a value completely; on a force failure returns the
    /// partial text together with the error.
    pub fn render_value(&mut self, cell: CellId) -> Result<String, (String, EvalError)> {
        let mut p = Printer::new();
        match self.pr_value(&mut p, cell, prec::BODY) {
            Ok(()) => Ok(p.out),
            Err(err) => Err((p.out, err)),
        }
    }

    /// Renders an expression outside any environment (diagnostics).
    pub fn render_expr(&mut self, expr: ExprId) -> String {
        let mut p = Printer::new();
        self.pr_c_expr(&mut p, expr, u32::MAX, prec::BODY);
        p.out
    }

    /// Renders `name a1 … an` with the actuals forced, for match-failure
    /// reports.
    pub(crate) fn render_call(&mut self, name: &str, env: Env, arity: u32) -> String {
        let mut p = Printer::new();
        self.pr_f_papp(&mut p, name, env, arity, prec::BODY);
        p.out
    }

    /// Renders the failing lambda application for match-failure reports.
    pub(crate) fn render_lambda_match(&mut self, who: ExprId, env: Env) -> String {
        let mut p = Printer::new();
        match self.exprs.get(who).clone() {
            Expr::Lambda(lambda) if lambda.kind == LambdaKind::Eqn => {
                let pattern = lambda.branches[0].formals[0].pattern;
                self.pr_c_expr(&mut p, pattern, 0, prec::BODY);
                p.push(" == ");
                let arg = self.heap.env_nth(env, 0);
                if self.pr_value(&mut p, arg, prec::BODY).is_err() {
                    p.push("...");
                }
            }
            Expr::Lambda(lambda) => {
                self.pr_papp(&mut p, who, env, lambda.arity, prec::BODY);
            }
            _ => p.push("?"),
        }
        p.out
    }

    /// Renders every equation of a function as re-parsable source.
    pub fn render_fundef(&mut self, f: FuncId) -> String {
        let func = self.env.func(f).clone();
        let name = self.interner.text(func.name).to_string();
        let mut out = String::new();
        for branch in &func.branches {
            let mut p = Printer::new();
            p.in_definition = true;
            p.push("--- ");
            self.pr_lhs(&mut p, &name, branch);
            p.push(" <= ");
            self.pr_c_expr(&mut p, branch.body, func.arity, prec::BODY);
            p.push(";\n");
            out.push_str(&p.out);
        }
        out
    }

    fn pr_lhs(&mut self, p: &mut Printer, name: &str, branch: &Branch) {
        let infix = branch.formals.len() == 1
            && self
                .interner
                .lookup(name)
                .and_then(|n| hope_ast::OpResolver::op_lookup(self.env, n))
                .is_some()
            && matches!(self.exprs.get(branch.formals[0].pattern), Expr::Pair(..));
        if infix {
            let (left, right) = match self.exprs.get(branch.formals[0].pattern) {
                Expr::Pair(left, right) => (*left, *right),
                _ => unreachable!("checked above"),
            };
            self.pr_c_expr(p, left, 0, prec::COMMA + 1);
            p.push(&format!(" {name} "));
            self.pr_c_expr(p, right, 0, prec::COMMA + 1);
        } else {
            p.push(name);
            for formal in &branch.formals {
                p.push(" ");
                self.pr_c_expr(p, formal.pattern, 0, prec::FORMAL);
            }
        }
    }

    // ---- values ----

    fn pr_value(&mut self, p: &mut Printer, cell: CellId, context: i32) -> Print {
        let v = match self.evaluate(cell) {
            Ok(v) => v,
            Err(err) => {
                p.push("...");
                return Err(err);
            }
        };
        let own = self.prec_value(v);
        if own < context {
            p.push("(");
        }
        match self.heap.get(v).clone() {
            Cell::Num(n) => p.push(&num_to_string(n)),
            Cell::Char(c) => {
                p.push("'");
                push_char(&mut p.out, c);
                p.push("'");
            }
            Cell::Const(c) => p.push(self.interner.text(self.env.cons(c).name)),
            Cell::Cons(c, payload) => {
                if self.is_vlist(v)? {
                    self.pr_vlist(p, v)?;
                } else {
                    let name = self.interner.text(self.env.cons(c).name).to_string();
                    let nargs = self.env.cons(c).nargs;
                    self.pr_f_value(p, &name, nargs, payload, inner(own, context))?;
                }
            }
            Cell::Pair(left, right) => {
                self.pr_value(p, left, prec::COMMA + 1)?;
                p.push(", ");
                self.pr_value(p, right, prec::COMMA)?;
            }
            Cell::PApp { expr, env, remaining } => match self.exprs.get(expr).clone() {
                Expr::Defun(f) => {
                    let func = self.env.func(f);
                    let name = self.interner.text(func.name).to_string();
                    let supplied = func.arity - remaining;
                    self.pr_f_papp(p, &name, env, supplied, inner(own, context));
                }
                Expr::Cons(c) => {
                    let cons = self.env.cons(c);
                    let name = self.interner.text(cons.name).to_string();
                    let supplied = cons.nargs - remaining;
                    self.pr_f_papp(p, &name, env, supplied, inner(own, context));
                }
                Expr::Lambda(lambda) => {
                    let supplied = lambda.arity - remaining;
                    self.pr_papp(p, expr, env, supplied, inner(own, context));
                }
                _ => p.push("?"),
            },
            Cell::Susp(..) => p.push("return"),
            _ => p.push("?"),
        }
        if own < context {
            p.push(")");
        }
        Ok(())
    }

    /// Is the forced value a proper list? The spine is forced to find
    /// out, which memoizes it for the subsequent print.
    fn is_vlist(&mut self, value: CellId) -> Result<bool, EvalError> {
        let Some(list_cons) = self.env.std.cons else { return Ok(false) };
        let mut cur = value;
        loop {
            let v = self.evaluate(cur)?;
            match self.heap.get(v).clone() {
                Cell::Cons(c, payload) if c == list_cons => {
                    let payload = self.evaluate(payload)?;
                    match self.heap.get(payload) {
                        Cell::Pair(_, tail) => cur = *tail,
                        _ => return Ok(false),
                    }
                }
                Cell::Const(c) => return Ok(Some(c) == self.env.std.nil),
                _ => return Ok(false),
            }
        }
    }

    /// The forced list is a string when every element is a character.
    fn is_vstring(&mut self, value: CellId) -> Result<bool, EvalError> {
        let mut cur = value;
        loop {
            let v = self.evaluate(cur)?;
            match self.heap.get(v).clone() {
                Cell::Cons(_, payload) => {
                    let payload = self.evaluate(payload)?;
                    let Cell::Pair(head, tail) = self.heap.get(payload).clone() else {
                        return Ok(false);
                    };
                    let head = self.evaluate(head)?;
                    if !matches!(self.heap.get(head), Cell::Char(_)) {
                        return Ok(false);
                    }
                    cur = tail;
                }
                _ => return Ok(true),
            }
        }
    }

    fn pr_vlist(&mut self, p: &mut Printer, value: CellId) -> Print {
        if self.is_vstring(value)? {
            p.push("\"");
            let mut cur = value;
            loop {
                let v = self.evaluate(cur)?;
                match self.heap.get(v).clone() {
                    Cell::Cons(_, payload) => {
                        let payload = self.evaluate(payload)?;
                        let Cell::Pair(head, tail) = self.heap.get(payload).clone() else {
                            break;
                        };
                        let head = self.evaluate(head)?;
                        if let Cell::Char(c) = self.heap.get(head) {
                            push_char(&mut p.out, *c);
                        }
                        cur = tail;
                    }
                    _ => break,
                }
            }
            p.push("\"");
            return Ok(());
        }
        p.push("[");
        let mut cur = value;
        let mut first = true;
        loop {
            let v = self.evaluate(cur)?;
            match self.heap.get(v).clone() {
                Cell::Cons(_, payload) => {
                    let payload = self.evaluate(payload)?;
                    let Cell::Pair(head, tail) = self.heap.get(payload).clone() else { break };
                    if !first {
                        p.push(", ");
                    }
                    first = false;
                    self.pr_value(p, head, prec::COMMA + 1)?;
                    cur = tail;
                }
                _ => break,
            }
        }
        p.push("]");
        Ok(())
    }

    /// A named application of one "argument" that may stand for several
    /// constructor fields.
    fn pr_f_value(
        &mut self,
        p: &mut Printer,
        name: &str,
        nargs: u32,
        arg: CellId,
        context: i32,
    ) -> Print {
        let op = self
            .interner
            .lookup(name)
            .and_then(|n| hope_ast::OpResolver::op_lookup(self.env, n));
        if let Some(op) = op {
            let v = self.evaluate(arg)?;
            if let Cell::Pair(left, right) = self.heap.get(v).clone() {
                if op.level() < context {
                    p.push("(");
                }
                self.pr_value(p, left, op.left_level())?;
                p.push(&format!(" {name} "));
                self.pr_value(p, right, op.right_level())?;
                if op.level() < context {
                    p.push(")");
                }
            } else {
                p.push(&format!("({name}) "));
                self.pr_value(p, arg, prec::ARG)?;
            }
            return Ok(());
        }
        p.push(name);
        let mut arg = arg;
        for _ in 1..nargs {
            let v = self.evaluate(arg)?;
            let Cell::Pair(left, right) = self.heap.get(v).clone() else { break };
            p.push(" ");
            self.pr_value(p, left, prec::ARG)?;
            arg = right;
        }
        p.push(" ");
        self.pr_value(p, arg, prec::ARG)
    }

    /// A partial application of a named function.
    fn pr_f_papp(&mut self, p: &mut Printer, name: &str, env: Env, nargs: u32, context: i32) {
        let is_op = self
            .interner
            .lookup(name)
            .and_then(|n| hope_ast::OpResolver::op_lookup(self.env, n))
            .is_some();
        if nargs == 0 {
            if context > prec::INFIX && is_op {
                p.push(&format!("({name})"));
            } else {
                p.push(name);
            }
            return;
        }
        if nargs == 1 {
            let arg = self.heap.env_nth(env, 0);
            if self.pr_f_value(p, name, 1, arg, context).is_err() {
                p.push("...");
            }
            return;
        }
        if prec::APPLY < context {
            p.push("(");
        }
        let outer = self.heap.env_next(env);
        self.pr_f_papp(p, name, outer, nargs - 1, prec::APPLY);
        p.push(" ");
        let arg = self.heap.env_nth(env, 0);
        if self.pr_value(p, arg, prec::ARG).is_err() {
            p.push("...");
        }
        if prec::APPLY < context {
            p.push(")");
        }
    }

    /// A partial application of a lambda.
    fn pr_papp(&mut self, p: &mut Printer, expr: ExprId, env: Env, nargs: u32, context: i32) {
        if nargs == 0 {
            p.envs.push(env);
            self.pr_c_expr(p, expr, 0, context);
            let _ = p.envs.pop();
            return;
        }
        if prec::APPLY < context {
            p.push("(");
        }
        let outer = self.heap.env_next(env);
        self.pr_papp(p, expr, outer, nargs - 1, prec::APPLY);
        p.push(" ");
        let arg = self.heap.env_nth(env, 0);
        if self.pr_value(p, arg, prec::ARG).is_err() {
            p.push("...");
        }
        if prec::APPLY < context {
            p.push(")");
        }
    }

    fn prec_value(&self, v: CellId) -> i32 {
        match self.heap.get(v) {
            Cell::Num(_) | Cell::Char(_) | Cell::Const(_) => prec::ATOMIC,
            Cell::Cons(..) => prec::APPLY,
            Cell::Pair(..) => prec::COMMA,
            Cell::PApp { expr, remaining, .. } => match self.exprs.get(*expr) {
                Expr::Defun(f) => {
                    if self.env.func(*f).arity > *remaining {
                        prec::APPLY
                    } else {
                        prec::ATOMIC
                    }
                }
                Expr::Cons(c) => {
                    if self.env.cons(*c).nargs > *remaining {
                        prec::APPLY
                    } else {
                        prec::ATOMIC
                    }
                }
                _ => prec::APPLY,
            },
            _ => prec::ATOMIC,
        }
    }

    // ---- expressions ----

    /// Fetches and prints an actual parameter from the captured
    /// environment.
    fn pr_actual(&mut self, p: &mut Printer, level: u32, path: &hope_ast::Path, context: i32) {
        let Some(&env) = p.envs.last() else {
            p.push("?");
            return;
        };
        let slot = self.heap.env_nth(env, level);
        let cell = self.heap.alloc(Cell::Dirs(path.clone(), slot));
        if self.pr_value(p, cell, context).is_err() {
            p.push("...");
        }
    }

    /// Prints an expression. `level` is the number of environment levels
    /// supplied by the expression itself; parameters bound further out
    /// are fetched from the current environment.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn pr_c_expr(&mut self, p: &mut Printer, expr: ExprId, level: u32, context: i32) {
        let own = self.precedence(expr);
        if own < context {
            p.push("(");
        }
        match self.exprs.get(expr).clone() {
            Expr::Pair(left, right) => {
                self.pr_c_expr(p, left, level, prec::COMMA + 1);
                p.push(", ");
                self.pr_c_expr(p, right, level, prec::COMMA);
            }
            Expr::Apply(func, arg) => {
                if self.is_elist(expr) {
                    if self.is_estring(expr) {
                        self.pr_estring(p, expr);
                    } else {
                        self.pr_elist(p, expr, level);
                    }
                } else if let Some(name) = self.expr_name(func, level) {
                    let name = self.interner.text(name).to_string();
                    self.pr_f_expr(p, &name, arg, level, inner(own, context));
                } else {
                    self.pr_c_expr(p, func, level, prec::APPLY);
                    p.push(" ");
                    self.pr_c_expr(p, arg, level, prec::ARG);
                }
            }
            Expr::Sugar(SugarKind::If, func, orelse) => {
                let Expr::Apply(ct, then) = self.exprs.get(func).clone() else { return };
                let Expr::Apply(_, cond) = self.exprs.get(ct).clone() else { return };
                p.push("if ");
                self.pr_c_expr(p, cond, level, prec::BODY);
                p.push(" then ");
                self.pr_c_expr(p, then, level, prec::BODY);
                p.push(" else ");
                self.pr_c_expr(p, orelse, level, prec::IF);
            }
            Expr::Sugar(kind @ (SugarKind::Let | SugarKind::Letrec), func, bound) => {
                let (pattern, body) = self.eqn_parts(func);
                let recursive = kind == SugarKind::Letrec;
                p.push(if recursive { "letrec " } else { "let " });
                self.pr_c_expr(p, pattern, level.saturating_add(1), prec::BODY);
                p.push(" == ");
                self.pr_c_expr(p, bound, if recursive { level.saturating_add(1) } else { level }, prec::BODY);
                p.push(" in ");
                self.pr_c_expr(p, body, level.saturating_add(1), prec::LET);
            }
            Expr::Sugar(kind @ (SugarKind::Where | SugarKind::Whererec), func, bound) => {
                let (pattern, body) = self.eqn_parts(func);
                let recursive = kind == SugarKind::Whererec;
                self.pr_c_expr(p, body, level.saturating_add(1), prec::WHERE);
                p.push(if recursive { " whererec " } else { " where " });
                self.pr_c_expr(p, pattern, level.saturating_add(1), prec::BODY);
                p.push(" == ");
                self.pr_c_expr(p, bound, if recursive { level.saturating_add(1) } else { level }, prec::WHERE);
            }
            Expr::Mu(mu) => {
                p.push("mu ");
                self.pr_c_expr(p, mu.formal.pattern, 0, prec::FORMAL);
                p.push(" => ");
                self.pr_c_expr(p, mu.body, level.saturating_add(1), prec::MU);
            }
            Expr::Lambda(lambda) => match lambda.kind {
                LambdaKind::Presect if p.in_definition => {
                    self.pr_presection(p, &lambda, level.saturating_add(1));
                }
                LambdaKind::Postsect if p.in_definition => {
                    self.pr_postsection(p, &lambda, level.saturating_add(1));
                }
                _ => self.pr_lambda(p, &lambda, level.saturating_add(lambda.arity)),
            },
            Expr::Num(n) => p.push(&num_to_string(n)),
            Expr::Char(c) => {
                p.push("'");
                push_char(&mut p.out, c);
                p.push("'");
            }
            Expr::Defun(f) => p.push(self.interner.text(self.env.func(f).name)),
            Expr::Cons(c) => {
                if Some(expr) == self.env.std.e_nil {
                    p.push("[]");
                } else {
                    p.push(self.interner.text(self.env.cons(c).name));
                }
            }
            Expr::Param(param) => {
                if param.level < level {
                    self.pr_c_expr(p, param.patt, 0, inner(own, context));
                } else {
                    self.pr_actual(p, param.level - level, &param.path, inner(own, context));
                }
            }
            Expr::Plus(plus) => {
                self.pr_c_expr(p, plus.arg, level, own);
                p.push(&format!(" + {}", plus.incr));
            }
            Expr::Var(var) => p.push(self.interner.text(var.name)),
            Expr::Return => p.push("return"),
            Expr::Builtin(_) | Expr::Math1(_) | Expr::Math2(_) => p.push("<builtin>"),
        }
        if own < context {
            p.push(")");
        }
    }

    fn eqn_parts(&self, func: ExprId) -> (ExprId, ExprId) {
        match self.exprs.get(func) {
            Expr::Lambda(lambda) => {
                (lambda.branches[0].formals[0].pattern, lambda.branches[0].body)
            }
            _ => unreachable!("let/where sugar wraps an equation"),
        }
    }

    fn pr_f_expr(&mut self, p: &mut Printer, name: &str, arg: ExprId, level: u32, context: i32) {
        if let Expr::Param(param) = self.exprs.get(arg).clone() {
            if param.level < level {
                self.pr_f_expr(p, name, param.patt, 0, context);
            } else {
                let Some(&env) = p.envs.last() else {
                    p.push("?");
                    return;
                };
                let slot = self.heap.env_nth(env, param.level - level);
                let cell = self.heap.alloc(Cell::Dirs(param.path.clone(), slot));
                if self.pr_f_value(p, name, 1, cell, context).is_err() {
                    p.push("...");
                }
            }
            return;
        }
        let op = self
            .interner
            .lookup(name)
            .and_then(|n| hope_ast::OpResolver::op_lookup(self.env, n));
        if let Some(op) = op {
            if let Expr::Pair(left, right) = self.exprs.get(arg).clone() {
                if op.level() < context {
                    p.push("(");
                }
                self.pr_c_expr(p, left, level, op.left_level());
                p.push(&format!(" {name} "));
                self.pr_c_expr(p, right, level, op.right_level());
                if op.level() < context {
                    p.push(")");
                }
            } else {
                p.push(&format!("({name}) "));
                self.pr_c_expr(p, arg, level, prec::ARG);
            }
        } else {
            p.push(&format!("{name} "));
            self.pr_c_expr(p, arg, level, prec::ARG);
        }
    }

    /// An expression prints as a list when it was built with the shared
    /// `::` reference, which is how list syntax came in.
    fn is_elist(&self, expr: ExprId) -> bool {
        match self.exprs.get(expr) {
            Expr::Apply(func, _) => Some(*func) == self.env.std.e_cons,
            _ => false,
        }
    }

    fn is_estring(&self, expr: ExprId) -> bool {
        let mut expr = expr;
        loop {
            match self.exprs.get(expr) {
                Expr::Apply(_, arg) => match self.exprs.get(*arg) {
                    Expr::Pair(head, tail) => {
                        if !matches!(self.exprs.get(*head), Expr::Char(_)) {
                            return false;
                        }
                        expr = *tail;
                    }
                    _ => return false,
                },
                Expr::Cons(_) => return true,
                _ => return false,
            }
        }
    }

    fn pr_elist(&mut self, p: &mut Printer, expr: ExprId, level: u32) {
        p.push("[");
        let mut expr = expr;
        let mut first = true;
        loop {
            let Expr::Apply(_, arg) = self.exprs.get(expr).clone() else { break };
            let Expr::Pair(head, tail) = self.exprs.get(arg).clone() else { break };
            if !first {
                p.push(", ");
            }
            first = false;
            self.pr_c_expr(p, head, level, prec::COMMA + 1);
            if Some(tail) == self.env.std.e_nil || matches!(self.exprs.get(tail), Expr::Cons(_))
            {
                break;
            }
            expr = tail;
        }
        p.push("]");
    }

    fn pr_estring(&mut self, p: &mut Printer, expr: ExprId) {
        p.push("\"");
        let mut expr = expr;
        while let Expr::Apply(_, arg) = self.exprs.get(expr) {
            let Expr::Pair(head, tail) = self.exprs.get(*arg) else { break };
            if let Expr::Char(c) = self.exprs.get(*head) {
                push_char(&mut p.out, *c);
            }
            expr = *tail;
        }
        p.push("\"");
    }

    fn pr_lambda(&mut self, p: &mut Printer, lambda: &hope_ast::expr::LambdaExpr, level: u32) {
        p.push("lambda ");
        for (i, branch) in lambda.branches.iter().enumerate() {
            if i > 0 {
                p.push(" | ");
            }
            self.pr_branch(p, branch, level);
        }
    }

    fn pr_branch(&mut self, p: &mut Printer, branch: &Branch, level: u32) {
        for formal in &branch.formals {
            self.pr_c_expr(p, formal.pattern, 0, prec::FORMAL);
            p.push(" ");
        }
        p.push("=> ");
        self.pr_c_expr(p, branch.body, level, prec::LAMBDA);
    }

    fn pr_presection(&mut self, p: &mut Printer, lambda: &hope_ast::expr::LambdaExpr, level: u32) {
        let body = lambda.branches[0].body;
        let Expr::Apply(func, arg) = self.exprs.get(body).clone() else { return };
        let Expr::Pair(left, _) = self.exprs.get(arg).clone() else { return };
        self.pr_c_expr(p, left, level, prec::COMMA + 1);
        p.push(" ");
        self.pr_section_op(p, func);
    }

    fn pr_postsection(&mut self, p: &mut Printer, lambda: &hope_ast::expr::LambdaExpr, level: u32)
    {
        let body = lambda.branches[0].body;
        let Expr::Apply(func, arg) = self.exprs.get(body).clone() else { return };
        let Expr::Pair(_, right) = self.exprs.get(arg).clone() else { return };
        self.pr_section_op(p, func);
        p.push(" ");
        self.pr_c_expr(p, right, level, prec::COMMA + 1);
    }

    fn pr_section_op(&mut self, p: &mut Printer, func: ExprId) {
        match self.exprs.get(func) {
            Expr::Defun(f) => p.push(self.interner.text(self.env.func(*f).name)),
            Expr::Cons(c) => p.push(self.interner.text(self.env.cons(*c).name)),
            Expr::Var(var) => p.push(self.interner.text(var.name)),
            _ => p.push("?"),
        }
    }

    /// If the expression amounts to an identifier, its name.
    pub(crate) fn expr_name(&self, expr: ExprId, level: u32) -> Option<Name> {
        match self.exprs.get(expr) {
            Expr::Defun(f) => Some(self.env.func(*f).name),
            Expr::Cons(c) => Some(self.env.cons(*c).name),
            Expr::Plus(_) => self.interner.lookup("+"),
            Expr::Var(var) => Some(var.name),
            Expr::Param(param) if param.level < level => self.expr_name(param.patt, 0),
            _ => None,
        }
    }

    fn precedence(&self, expr: ExprId) -> i32 {
        match self.exprs.get(expr) {
            Expr::Num(_) | Expr::Char(_) | Expr::Return => prec::ATOMIC,
            Expr::Pair(..) => prec::COMMA,
            Expr::Mu(_) => prec::MU,
            Expr::Lambda(lambda) => match lambda.kind {
                LambdaKind::Presect | LambdaKind::Postsect => prec::INFIX,
                _ => prec::LAMBDA,
            },
            Expr::Sugar(SugarKind::Where | SugarKind::Whererec, ..) => prec::WHERE,
            Expr::Sugar(SugarKind::Let | SugarKind::Letrec, ..) => prec::LET,
            Expr::Sugar(SugarKind::If, ..) => prec::IF,
            Expr::Apply(..) => prec::APPLY,
            Expr::Cons(c) => self.name_prec(self.env.cons(*c).name),
            Expr::Defun(f) => self.name_prec(self.env.func(*f).name),
            Expr::Plus(_) => self
                .interner
                .lookup("+")
                .and_then(|n| hope_ast::OpResolver::op_lookup(self.env, n))
                .map_or(prec::ATOMIC, |op| op.level()),
            Expr::Var(var) => self.name_prec(var.name),
            Expr::Param(param) => self.precedence(param.patt),
            Expr::Builtin(_) | Expr::Math1(_) | Expr::Math2(_) => prec::ATOMIC,
        }
    }

    fn name_prec(&self, name: Name) -> i32 {
        if hope_ast::OpResolver::op_lookup(self.env, name).is_some() {
            prec::INFIX
        } else {
            prec::ATOMIC
        }
    }
}

/// The context for sub-terms of a term already parenthesised.
const fn inner(own: i32, context: i32) -> i32 {
    if own < context {
        prec::BODY
    } else {
        context
    }
}
