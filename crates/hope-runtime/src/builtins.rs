//! Native operations behind the `Strict` decision-tree terminal.
//!
//! A builtin's single argument arrives already reduced to weak head
//! normal form; the operation may return a further suspension (the
//! output continuations and the lazy recursion of `compare` do), which
//! the evaluator keeps forcing.

use std::io::Write;

use hope_ast::expr::{Builtin, Math1, Math2};
use hope_ast::{Expr, ExprId};

use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::heap::{Cell, CellId, Env};

/// Longest string `str2num`/`error`/`read` will consume.
const MAX_TMP_STRING: usize = 1024;

type Eval<T> = Result<T, EvalError>;

impl Evaluator<'_> {
    /// Dispatches a strict builtin body on its forced argument.
    pub(crate) fn strict_call(&mut self, real: ExprId, arg: CellId) -> Eval<CellId> {
        match self.exprs.get(real).clone() {
            Expr::Builtin(op) => self.builtin_call(op, arg),
            Expr::Math1(op) => {
                let x = self.want_num(arg)?;
                Ok(self.heap.alloc(Cell::Num(op.apply(x))))
            }
            Expr::Math2(op) => self.math2_call(op, arg),
            _ => Err(EvalError::exec("internal error: strict body is not native")),
        }
    }

    fn builtin_call(&mut self, op: Builtin, arg: CellId) -> Eval<CellId> {
        match op {
            Builtin::Ord => {
                let c = self.want_char(arg)?;
                Ok(self.heap.alloc(Cell::Num(f64::from(c))))
            }
            Builtin::Chr => {
                let n = self.want_num(arg)?;
                if !(0.0..=255.0).contains(&n) {
                    return Err(EvalError::exec("value out of range")
                        .with_detail(format!("chr({})", num_to_string(n))));
                }
                Ok(self.heap.alloc(Cell::Char(n as u8)))
            }
            Builtin::NumToStr => {
                let n = self.want_num(arg)?;
                Ok(self.text_value(num_to_string(n).as_bytes()))
            }
            Builtin::StrToNum => {
                let text = self.string_argument(arg)?;
                let text = String::from_utf8_lossy(&text).trim().to_string();
                Ok(self.heap.alloc(Cell::Num(text.parse().unwrap_or(0.0))))
            }
            Builtin::Error => {
                let text = self.string_argument(arg)?;
                Err(EvalError::user(String::from_utf8_lossy(&text).into_owned()))
            }
            Builtin::Read => {
                if self.restricted {
                    return Err(EvalError::exec("read function disabled"));
                }
                let text = self.string_argument(arg)?;
                let filename = String::from_utf8_lossy(&text).into_owned();
                let stream = self.streams.open(&filename)?;
                Ok(self.heap.alloc(Cell::Stream(stream)))
            }
            Builtin::Print => self.print_value_builtin(arg),
            Builtin::WriteElement => self.write_element_builtin(arg),
            Builtin::Compare => self.compare_values(arg),
        }
    }

    fn math2_call(&mut self, op: Math2, arg: CellId) -> Eval<CellId> {
        let Cell::Pair(left, right) = self.heap.get(arg).clone() else {
            return Err(EvalError::exec("internal error: binary operator needs a pair"));
        };
        let left = self.evaluate(left)?;
        let x = self.want_num(left)?;
        let right = self.evaluate(right)?;
        let y = self.want_num(right)?;
        if op.checks_zero() && y == 0.0 {
            return Err(EvalError::exec("attempt to divide by zero"));
        }
        Ok(self.heap.alloc(Cell::Num(op.apply(x, y))))
    }

    /// Prints `>> value : type` on the terminal and continues with the
    /// post-print continuation.
    fn print_value_builtin(&mut self, arg: CellId) -> Eval<CellId> {
        let rendered = self.render_value(arg);
        let banner = self.type_banner.take();
        let _ = write!(self.out, ">> ");
        match rendered {
            Ok(text) => {
                let _ = write!(self.out, "{text}");
            }
            Err((partial, err)) => {
                // The partial text already ends in the ellipsis.
                let _ = writeln!(self.out, "{partial}");
                let _ = self.out.flush();
                return Err(err);
            }
        }
        if let Some(banner) = banner {
            let _ = write!(self.out, " : {banner}");
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
        let e_return = self.rt_names()?.e_return;
        Ok(self.heap.susp(e_return, Env::EMPTY))
    }

    /// Writes one element of a `write` list and returns the list
    /// continuation, which the drive loop applies to the tail.
    /// Characters are written raw, anything else on its own line.
    fn write_element_builtin(&mut self, arg: CellId) -> Eval<CellId> {
        if let Cell::Char(c) = self.heap.get(arg) {
            let byte = [*c];
            match self.write_out.as_mut() {
                Some(out) => {
                    let _ = out.write_all(&byte);
                }
                None => {
                    let _ = self.out.write_all(&byte);
                }
            }
        } else {
            let rendered = self.render_value(arg);
            let (text, failure) = match rendered {
                Ok(text) => (text, None),
                Err((partial, err)) => (partial, Some(err)),
            };
            match self.write_out.as_mut() {
                Some(out) => {
                    let _ = writeln!(out, "{text}");
                }
                None => {
                    let _ = writeln!(self.out, "{text}");
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }
        }
        let e_wr_list = self.rt_names()?.e_wr_list;
        Ok(self.heap.susp(e_wr_list, Env::EMPTY))
    }

    // ---- conversions ----

    /// A `char`-list value from native bytes.
    pub(crate) fn text_value(&mut self, bytes: &[u8]) -> CellId {
        let names = self.names.expect("standard environment initialised");
        let (nil, cons) = (names.nil, names.cons);
        let mut list = self.heap.alloc(Cell::Const(nil));
        for &byte in bytes.iter().rev() {
            let head = self.heap.alloc(Cell::Char(byte));
            let pair = self.heap.alloc(Cell::Pair(head, list));
            list = self.heap.alloc(Cell::Cons(cons, pair));
        }
        list
    }

    /// Forces a string value into native bytes.
    fn string_argument(&mut self, arg: CellId) -> Eval<Vec<u8>> {
        let mut out = Vec::new();
        let mut cur = arg;
        loop {
            let v = self.evaluate(cur)?;
            match self.heap.get(v).clone() {
                Cell::Cons(_, payload) => {
                    let payload = self.evaluate(payload)?;
                    let Cell::Pair(head, tail) = self.heap.get(payload).clone() else {
                        return Err(EvalError::exec("internal error: malformed string"));
                    };
                    let head = self.evaluate(head)?;
                    let c = self.want_char(head)?;
                    if out.len() >= MAX_TMP_STRING {
                        return Err(EvalError::exec("string too long"));
                    }
                    out.push(c);
                    cur = tail;
                }
                Cell::Const(_) => return Ok(out),
                _ => return Err(EvalError::exec("internal error: malformed string")),
            }
        }
    }

    fn want_num(&self, id: CellId) -> Eval<f64> {
        match self.heap.get(id) {
            Cell::Num(n) => Ok(*n),
            _ => Err(EvalError::exec("internal error: expected a number")),
        }
    }

    fn want_char(&self, id: CellId) -> Eval<u8> {
        match self.heap.get(id) {
            Cell::Char(c) => Ok(*c),
            _ => Err(EvalError::exec("internal error: expected a character")),
        }
    }
}

/// Renders a number the way values and `num2str` print it.
#[must_use]
pub fn num_to_string(n: f64) -> String {
    if n == f64::INFINITY {
        "inf".to_string()
    } else if n == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if n.is_nan() {
        "nan".to_string()
    } else {
        format!("{n}")
    }
}

/// Unary math builtins installable by name.
pub const MATH1: &[(&str, Math1)] = &[
    ("abs", Math1::Abs),
    ("acos", Math1::Acos),
    ("asin", Math1::Asin),
    ("atan", Math1::Atan),
    ("ceil", Math1::Ceil),
    ("cos", Math1::Cos),
    ("cosh", Math1::Cosh),
    ("exp", Math1::Exp),
    ("floor", Math1::Floor),
    ("log", Math1::Log),
    ("log10", Math1::Log10),
    ("sin", Math1::Sin),
    ("sinh", Math1::Sinh),
    ("sqrt", Math1::Sqrt),
    ("tanh", Math1::Tanh),
];

/// Binary math builtins installable by name.
pub const MATH2: &[(&str, Math2)] = &[
    ("+", Math2::Add),
    ("-", Math2::Sub),
    ("*", Math2::Mul),
    ("/", Math2::Divide),
    ("div", Math2::Div),
    ("mod", Math2::Mod),
    ("atan2", Math2::Atan2),
    ("pow", Math2::Pow),
];

/// General builtins installable by name.
pub const BUILTINS: &[(&str, Builtin)] = &[
    ("ord", Builtin::Ord),
    ("chr", Builtin::Chr),
    ("read", Builtin::Read),
    ("num2str", Builtin::NumToStr),
    ("str2num", Builtin::StrToNum),
    ("error", Builtin::Error),
    ("print", Builtin::Print),
    ("write_element", Builtin::WriteElement),
];
