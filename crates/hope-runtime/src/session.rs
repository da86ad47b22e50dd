//! The interpreter session.
//!
//! The session owns every arena and table, reads `;`-terminated items
//! from a stack of sources (the interactive terminal or a file at the
//! bottom, module files pushed by `uses` above it), and drives each item
//! through resolution, type inference, pattern compilation and lazy
//! evaluation. The `Standard` module is read before anything else; when
//! it finishes, native code is installed behind its declarations.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use hope_analyzer::ty::display::{render_cell, render_deftype, render_type};
use hope_analyzer::{
    check_type_defs, Declarer, FuncFlags, Inference, ModuleEnv, ResolveError, Resolver, Trace,
    TyArena, TypeError, SESSION, STANDARD,
};
use hope_ast::expr::{Builtin, ParamExpr};
use hope_ast::{
    Assoc, Branch, CaseArena, ConsId, Expr, ExprArena, ExprId, Formal, Interner, ModuleId, Name,
    Op, Path, SugarKind, Type,
};
use hope_parser::{lex_line, Item, Parser, Token};
use hope_source::{Diagnostic, ErrorKind, Reporter, Severity};

use crate::builtins::{BUILTINS, MATH1, MATH2};
use crate::eval::Evaluator;
use crate::functors::functor_defs;
use crate::heap::{Cell, Env, Heap, StreamId};
use crate::interrupt::Interrupt;
use crate::streams::Streams;

/// Extension of module source files.
pub const MODULE_EXTENSION: &str = ".hop";
/// The staging file of a `write … to` command.
const TEMP_FILE: &str = "TempFile";

/// A provider of source lines: a buffered reader, the terminal, or a
/// line editor.
pub trait LineSource {
    /// Reads one line (including its newline when present); `None` at
    /// end of input.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures of the underlying source.
    fn read_line(&mut self, prompt: &str) -> std::io::Result<Option<String>>;
}

/// Lines from any buffered reader; the prompt is not displayed.
pub struct ReadSource<R: BufRead>(pub R);

impl<R: BufRead> LineSource for ReadSource<R> {
    fn read_line(&mut self, _prompt: &str) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        match self.0.read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }
}

/// Runtime wiring established once `Standard` has finished.
#[derive(Debug, Clone, Copy)]
pub struct RtNames {
    /// `compare` applied to the sole environment slot, for its lazy
    /// recursion into constructor payloads.
    pub e_cmp: ExprId,
    /// The body of the standard `cmp_pair` equation.
    pub cmp_pair_body: ExprId,
    /// The `order` constructors.
    pub less: ConsId,
    /// See [`RtNames::less`].
    pub equal: ConsId,
    /// See [`RtNames::less`].
    pub greater: ConsId,
    /// The post-print continuation expression.
    pub e_return: ExprId,
    /// A reference to the `print` function.
    pub e_print: ExprId,
    /// A reference to the `write_list` function.
    pub e_wr_list: ExprId,
    /// The `nil` constructor (stream ends).
    pub nil: ConsId,
    /// The `::` constructor (stream elements).
    pub cons: ConsId,
}

/// Session options, from the command line.
#[derive(Debug, Default)]
pub struct Options {
    /// Disable file I/O, `save` and `edit`.
    pub restricted: bool,
    /// Listing mode: echo source and prefix reports.
    pub listing: bool,
    /// Wall-clock evaluation limit in seconds (0 for none).
    pub time_limit: u64,
    /// Module search path, in order; `None` entries stand for the
    /// built-in library.
    pub path: Vec<Option<PathBuf>>,
    /// Program arguments exposed as `argv`.
    pub argv: Vec<String>,
}

struct SourceFrame {
    reader: Box<dyn LineSource>,
    module: Option<ModuleId>,
    lineno: usize,
    interactive: bool,
    tokens: VecDeque<Token>,
    eof: bool,
}

/// The interpreter session.
pub struct Session {
    /// The identifier pool.
    pub interner: Interner,
    /// The expression arena.
    pub exprs: ExprArena,
    /// The decision-tree arena.
    pub cases: CaseArena,
    /// The module graph and tables.
    pub env: ModuleEnv,
    /// The inference-cell arena.
    pub tys: TyArena,
    /// The evaluation heap.
    pub heap: Heap,
    /// Open streams.
    pub streams: Streams,
    /// Diagnostic output.
    pub reporter: Reporter,
    /// Cancellation state.
    pub interrupt: Interrupt,
    /// Session options.
    pub options: Options,
    names: Option<RtNames>,
    sources: Vec<SourceFrame>,
    out: Box<dyn Write>,
    exiting: bool,
    failed: bool,
}

impl Session {
    /// Creates a session writing values to `out` and diagnostics through
    /// `reporter`.
    #[must_use]
    pub fn new(options: Options, out: Box<dyn Write>, reporter: Reporter) -> Self {
        let mut interner = Interner::new();
        let session_name = interner.intern("<Session>");
        let env = ModuleEnv::new(session_name);
        Self {
            interner,
            exprs: ExprArena::new(),
            cases: CaseArena::new(),
            env,
            tys: TyArena::new(),
            heap: Heap::new(),
            streams: Streams::new(),
            reporter,
            interrupt: Interrupt::new(),
            options,
            names: None,
            sources: Vec::new(),
            out,
            exiting: false,
            failed: false,
        }
    }

    /// Runs the session over a base source. Returns the process exit
    /// code: 0 on normal termination, 1 after a fatal error.
    pub fn run(&mut self, source: Box<dyn LineSource>, interactive: bool) -> i32 {
        self.sources.push(SourceFrame {
            reader: source,
            module: None,
            lineno: 0,
            interactive,
            tokens: VecDeque::new(),
            eof: false,
        });
        let standard = self.interner.intern("Standard");
        if let Err(diag) = self
            .env
            .mod_use(&self.interner, standard)
            .and_then(|()| self.mod_fetch())
        {
            self.report(diag);
            return 1;
        }
        while !self.exiting && !self.failed {
            let Some(tokens) = self.next_item() else { break };
            let before = self.reporter.error_count();
            let result = self.process_tokens(&tokens);
            if let Err(diag) = result {
                let fatal = diag.severity() == Severity::Abort;
                self.report(diag);
                if fatal {
                    self.failed = true;
                    break;
                }
            }
            if self.reporter.error_count() > before && self.env.in_standard() {
                self.report(Diagnostic::new(ErrorKind::Library, "error in system module"));
                self.failed = true;
            }
        }
        i32::from(self.failed)
    }

    // ---- reading items ----

    /// Collects the tokens of the next `;`-terminated item, pulling
    /// lines (and popping finished sources) as needed.
    fn next_item(&mut self) -> Option<Vec<Token>> {
        let mut item = Vec::new();
        loop {
            let frame = self.sources.last_mut()?;
            if let Some(token) = frame.tokens.pop_front() {
                if token == Token::Semi {
                    return Some(item);
                }
                item.push(token);
                continue;
            }
            if frame.eof {
                self.pop_frame();
                if !item.is_empty() {
                    // A file may end mid-item; a synthetic `;` closed it.
                    return Some(item);
                }
                continue;
            }
            let interactive = frame.interactive;
            let prompt = if interactive { ">: " } else { "" };
            match frame.reader.read_line(prompt) {
                Ok(Some(line)) => {
                    frame.lineno += 1;
                    // Only the main source goes into a listing.
                    if !interactive && frame.module.is_none() {
                        self.reporter.echo_line(&line);
                    }
                    let mut tokens = Vec::new();
                    let mut bad_tokens = Vec::new();
                    for lexed in lex_line(&line) {
                        match lexed {
                            Ok(token) => tokens.push(token),
                            Err(bad) => bad_tokens.push(bad),
                        }
                    }
                    for bad in bad_tokens {
                        self.report(Diagnostic::new(
                            ErrorKind::Lexical,
                            format!("malformed token '{}'", bad.trim()),
                        ));
                    }
                    let frame = self.sources.last_mut()?;
                    frame.tokens.extend(tokens);
                }
                Ok(None) | Err(_) => {
                    frame.eof = true;
                    // End any unterminated item.
                    frame.tokens.push_back(Token::Semi);
                }
            }
        }
    }

    fn pop_frame(&mut self) {
        let frame = self.sources.pop().expect("a frame to pop");
        if frame.module.is_some() {
            // Builtin installation runs while `Standard` is still the
            // current module, so its declarations are local.
            if self.env.in_standard() {
                if let Err(diag) = self.standard_finished() {
                    self.report(diag);
                    self.failed = true;
                    return;
                }
            }
            let _ = self.env.finish();
            if let Err(diag) = self.mod_fetch() {
                self.report(diag);
            }
        }
    }

    /// Opens the next queued module, if any, and pushes its source.
    fn mod_fetch(&mut self) -> Result<(), Diagnostic> {
        while let Some(id) = self.env.next_unread() {
            if id.index() == STANDARD {
                self.env.enter(&self.interner, id)?;
                self.push_module_source(
                    Box::new(ReadSource(std::io::Cursor::new(hope_stdlib::STANDARD_SOURCE))),
                    id,
                );
                return Ok(());
            }
            let name = self.interner.text(self.env.module(id).name).to_string();
            match self.open_module(&name) {
                Some(reader) => {
                    self.env.enter(&self.interner, id)?;
                    self.push_module_source(reader, id);
                    return Ok(());
                }
                None => {
                    self.report(Diagnostic::new(
                        ErrorKind::Semantic,
                        format!("'{name}': can't read module"),
                    ));
                    self.env.abandon(id);
                }
            }
        }
        Ok(())
    }

    /// The module is sought in each directory of the path in turn;
    /// empty path entries stand for the built-in library, which only
    /// holds `Standard`.
    fn open_module(&self, name: &str) -> Option<Box<dyn LineSource>> {
        let filename = format!("{name}{MODULE_EXTENSION}");
        for entry in &self.options.path {
            match entry {
                Some(dir) => {
                    let candidate = dir.join(&filename);
                    if let Ok(file) = std::fs::File::open(candidate) {
                        return Some(Box::new(ReadSource(std::io::BufReader::new(file))));
                    }
                }
                None => {}
            }
        }
        None
    }

    fn push_module_source(&mut self, reader: Box<dyn LineSource>, module: ModuleId) {
        self.sources.push(SourceFrame {
            reader,
            module: Some(module),
            lineno: 0,
            interactive: false,
            tokens: VecDeque::new(),
            eof: false,
        });
    }

    // ---- item processing ----

    fn process_tokens(&mut self, tokens: &[Token]) -> Result<(), Diagnostic> {
        let list_exprs = match (self.env.std.e_cons, self.env.std.e_nil) {
            (Some(cons), Some(nil)) => Some((cons, nil)),
            _ => None,
        };
        let item = Parser::new(tokens, &mut self.interner, &mut self.exprs, &self.env, list_exprs)
            .parse_item()?;
        self.process_item(item)
    }

    fn process_item(&mut self, item: Item) -> Result<(), Diagnostic> {
        match item {
            Item::Empty => Ok(()),
            Item::Uses(names) => {
                for name in names {
                    self.env.mod_use(&self.interner, name)?;
                }
                self.mod_fetch()
            }
            Item::Typevars(names) => {
                for name in names {
                    self.env.tv_declare(&mut self.interner, name)?;
                }
                Ok(())
            }
            Item::Op { name, prec, assoc } => {
                self.env.op_declare(Op::new(name, prec, assoc));
                Ok(())
            }
            Item::Dec { name, ty } => {
                Declarer::new(&mut self.env, &mut self.interner).decl_value(name, &ty)
            }
            Item::Abstype(headers) => {
                for header in headers {
                    let mut declarer = Declarer::new(&mut self.env, &mut self.interner);
                    declarer.start(&header)?;
                    let _ = declarer.abstype()?;
                }
                Ok(())
            }
            Item::Synonym { header, body } => {
                let mut declarer = Declarer::new(&mut self.env, &mut self.interner);
                declarer.start(&header)?;
                let dt = declarer.type_syn(&body)?;
                self.define_functor(dt);
                Ok(())
            }
            Item::Data { header, alts } => {
                let mut declarer = Declarer::new(&mut self.env, &mut self.interner);
                declarer.start(&header)?;
                let (dt, fulfilled) = declarer.decl_data(&mut self.tys, &alts)?;
                self.sync_list_exprs();
                for (fn_id, cons_id) in fulfilled {
                    let name = self.env.func(fn_id).name;
                    let lhs = self.exprs.var(name);
                    let rhs = self.exprs.cons(cons_id);
                    self.def_value(lhs, rhs)?;
                    self.env.func_mut(fn_id).flags.remove(FuncFlags::EXPLICIT_DEF);
                }
                self.define_functor(dt);
                Ok(())
            }
            Item::Def { lhs, rhs } => self.def_value(lhs, rhs),
            Item::Private => self.env.go_private(),
            Item::Display => self.display(),
            Item::Save(name) => self.save(name),
            Item::Exit => {
                self.exiting = true;
                Ok(())
            }
            Item::Edit(_) => {
                if self.options.restricted {
                    Err(Diagnostic::new(ErrorKind::Semantic, "'edit' command disabled"))
                } else {
                    Err(Diagnostic::new(
                        ErrorKind::Semantic,
                        "'edit' is not supported in this build",
                    ))
                }
            }
            Item::Write { expr, file } => self.wr_expr(expr, file),
            Item::Eval(expr) => self.eval_expr(expr),
        }
    }

    /// Creates the shared `[]`/`::` references once `list` exists.
    fn sync_list_exprs(&mut self) {
        if let (Some(nil), None) = (self.env.std.nil, self.env.std.e_nil) {
            self.env.std.e_nil = Some(self.exprs.cons(nil));
        }
        if let (Some(cons), None) = (self.env.std.cons, self.env.std.e_cons) {
            self.env.std.e_cons = Some(self.exprs.cons(cons));
        }
    }

    /// Runs the generated functor equations of a freshly declared type.
    fn define_functor(&mut self, dt: hope_ast::DefTypeId) {
        let defs = functor_defs(&mut self.exprs, &self.env, &mut self.interner, dt);
        for (lhs, rhs) in defs {
            if let Err(diag) = self.def_value(lhs, rhs) {
                self.report(diag);
            }
        }
        let name = self.env.deftype(dt).name;
        if let Some(fn_id) = self.env.fn_local(name) {
            self.env.func_mut(fn_id).flags.remove(FuncFlags::EXPLICIT_DEF);
        }
    }

    // ---- definitions ----

    /// Installs one defining equation.
    fn def_value(&mut self, lhs: ExprId, rhs: ExprId) -> Result<(), Diagnostic> {
        // A left-hand side written with if/then/else defines
        // `if_then_else` itself; re-read it as an application spine.
        if let Expr::Sugar(SugarKind::If, func, arg) = self.exprs.get(lhs).clone() {
            self.exprs.set(lhs, Expr::Apply(func, arg));
        }
        let mut args = Vec::new();
        let mut head = lhs;
        while let Expr::Apply(func, arg) = self.exprs.get(head).clone() {
            args.push(arg);
            head = func;
        }
        let arity = args.len() as u32;
        let Expr::Var(var) = self.exprs.get(head).clone() else {
            return Err(Diagnostic::new(ErrorKind::Semantic, "illegal left-hand-side"));
        };
        let name = var.name;
        let name_text = self.interner.text(name).to_string();
        let Some(fn_id) = self.env.fn_local(name) else {
            return Err(Diagnostic::new(
                ErrorKind::Semantic,
                format!("'{name_text}': value identifier not locally declared"),
            ));
        };
        {
            let func = self.env.func(fn_id);
            if func.explicit_def() && func.arity != arity {
                return Err(Diagnostic::new(
                    ErrorKind::Semantic,
                    format!("'{name_text}': attempted redefinition with a different arity"),
                ));
            }
            if func.code.is_some() && arity == 0 {
                return Err(Diagnostic::new(
                    ErrorKind::Semantic,
                    format!("'{name_text}': attempt to redefine value identifier"),
                ));
            }
        }

        let mut branch = Branch {
            formals: args.iter().rev().map(|&pattern| Formal::new(pattern)).collect(),
            body: rhs,
        };
        if let Err(err) =
            Resolver::new(&mut self.exprs, &self.env, &self.interner).resolve_branch(&mut branch)
        {
            self.report_resolve(err);
            return Ok(());
        }
        if self.env.func(fn_id).explicit_dec() {
            let func = self.env.func(fn_id).clone();
            let result = Inference::new(&mut self.tys, &self.env, &self.exprs, &self.interner)
                .chk_func(&branch, &func);
            if let Err(err) = result {
                self.report_type_error(err);
                return Ok(());
            }
        }

        {
            let func = self.env.func_mut(fn_id);
            if !func.explicit_def() {
                func.code = None;
                func.branches.clear();
                func.flags.insert(FuncFlags::EXPLICIT_DEF);
            }
            func.arity = arity;
        }
        self.exprs.set(head, Expr::Defun(fn_id));
        let old = match self.env.func(fn_id).code {
            Some(code) => Some(code),
            None if arity > 0 => Some(self.cases.f_nomatch(fn_id)),
            None => None,
        };
        let code = hope_compiler::Compiler::new(&mut self.exprs, &self.env, &mut self.cases)
            .comp_branch(old, &branch);
        let func = self.env.func_mut(fn_id);
        func.branches.push(branch);
        func.code = Some(code);
        log::debug!("defined '{name_text}' with arity {arity}");
        Ok(())
    }

    // ---- evaluation ----

    /// Wraps a top-level expression as `input => e`, binding the
    /// terminal character stream.
    fn resolve_top(&mut self, expr: ExprId) -> Result<(), ()> {
        let input = self.interner.intern("input");
        let pattern = self.exprs.var(input);
        let mut branch = Branch { formals: vec![Formal::new(pattern)], body: expr };
        match Resolver::new(&mut self.exprs, &self.env, &self.interner).resolve_branch(&mut branch)
        {
            Ok(()) => Ok(()),
            Err(err) => {
                self.report_resolve(err);
                Err(())
            }
        }
    }

    fn eval_expr(&mut self, expr: ExprId) -> Result<(), Diagnostic> {
        if self.resolve_top(expr).is_err() {
            return Ok(());
        }
        self.streams.reset();
        let ty = match Inference::new(&mut self.tys, &self.env, &self.exprs, &self.interner)
            .chk_expr(expr)
        {
            Ok(ty) => ty,
            Err(err) => {
                self.report_type_error(err);
                return Ok(());
            }
        };
        hope_compiler::Compiler::new(&mut self.exprs, &self.env, &mut self.cases).comp_expr(expr);
        let banner = render_cell(&mut self.tys, &self.env, &self.interner, ty);
        let Some(names) = self.names else {
            return Err(Diagnostic::new(ErrorKind::Library, "standard environment missing"));
        };

        self.heap.reset();
        let apply = self.exprs.apply(names.e_print, expr);
        let input_cell = self.heap.alloc(Cell::Stream(StreamId::Stdin));
        let env0 = self.heap.env_cons(input_cell, Env::EMPTY);
        let cell = self.heap.susp(apply, env0);
        self.interrupt.arm(self.options.time_limit);
        let result = {
            let mut evaluator = Evaluator {
                heap: &mut self.heap,
                exprs: &self.exprs,
                cases: &self.cases,
                env: &self.env,
                interner: &self.interner,
                streams: &mut self.streams,
                interrupt: &self.interrupt,
                names: Some(&names),
                out: &mut self.out,
                write_out: None,
                type_banner: Some(banner),
                restricted: self.options.restricted,
            };
            evaluator.evaluate(cell)
        };
        self.streams.close_all();
        if let Err(err) = result {
            self.report(err.into_diagnostic());
        }
        Ok(())
    }

    fn wr_expr(&mut self, expr: ExprId, file: Option<Vec<u8>>) -> Result<(), Diagnostic> {
        if self.options.restricted {
            return Err(Diagnostic::new(ErrorKind::Exec, "file output disabled"));
        }
        if self.resolve_top(expr).is_err() {
            return Ok(());
        }
        self.streams.reset();
        if let Err(err) = Inference::new(&mut self.tys, &self.env, &self.exprs, &self.interner)
            .chk_list(expr)
        {
            self.report_type_error(err);
            return Ok(());
        }
        hope_compiler::Compiler::new(&mut self.exprs, &self.env, &mut self.cases).comp_expr(expr);
        let Some(names) = self.names else {
            return Err(Diagnostic::new(ErrorKind::Library, "standard environment missing"));
        };

        let mut target = match &file {
            Some(_) => {
                let temp = std::fs::File::create(TEMP_FILE).map_err(|_| {
                    Diagnostic::new(ErrorKind::Exec, "can't create temporary file")
                })?;
                Some(Box::new(temp) as Box<dyn Write>)
            }
            None => None,
        };

        self.heap.reset();
        let apply = self.exprs.apply(names.e_wr_list, expr);
        let input_cell = self.heap.alloc(Cell::Stream(StreamId::Stdin));
        let env0 = self.heap.env_cons(input_cell, Env::EMPTY);
        let cell = self.heap.susp(apply, env0);
        self.interrupt.arm(self.options.time_limit);
        let result = {
            let mut evaluator = Evaluator {
                heap: &mut self.heap,
                exprs: &self.exprs,
                cases: &self.cases,
                env: &self.env,
                interner: &self.interner,
                streams: &mut self.streams,
                interrupt: &self.interrupt,
                names: Some(&names),
                out: &mut self.out,
                write_out: target.as_mut().map(|w| w as &mut dyn Write),
                type_banner: None,
                restricted: self.options.restricted,
            };
            evaluator.evaluate(cell)
        };
        self.streams.close_all();
        drop(target);
        match (result, file) {
            (Ok(_), Some(name)) => {
                let name = String::from_utf8_lossy(&name).into_owned();
                let _ = std::fs::remove_file(&name);
                std::fs::rename(TEMP_FILE, &name).map_err(|_| {
                    Diagnostic::new(ErrorKind::Exec, format!("'{name}': can't save output"))
                })?;
                Ok(())
            }
            (Ok(_), None) => Ok(()),
            (Err(err), file) => {
                if file.is_some() {
                    let _ = std::fs::remove_file(TEMP_FILE);
                }
                self.report(err.into_diagnostic());
                Ok(())
            }
        }
    }

    // ---- standard environment wiring ----

    fn standard_finished(&mut self) -> Result<(), Diagnostic> {
        check_type_defs(&mut self.env, &self.interner)?;
        self.sync_list_exprs();
        self.install_builtins()?;
        let names = self.init_names()?;
        self.names = Some(names);
        self.init_argv()?;
        log::debug!("standard environment initialised");
        Ok(())
    }

    fn lookup_fn(&mut self, name: &str) -> Result<hope_ast::FuncId, Diagnostic> {
        let interned = self.interner.intern(name);
        self.env.fn_lookup(interned).ok_or_else(|| {
            Diagnostic::new(ErrorKind::Library, format!("'{name}': undeclared built-in"))
        })
    }

    fn install_builtins(&mut self) -> Result<(), Diagnostic> {
        for &(name, op) in BUILTINS {
            let fn_id = self.lookup_fn(name)?;
            let body = self.exprs.alloc(Expr::Builtin(op));
            let code = self.cases.strict(body);
            let func = self.env.func_mut(fn_id);
            func.code = Some(code);
            func.arity = 1;
            func.branches.clear();
        }
        for &(name, op) in MATH1 {
            let fn_id = self.lookup_fn(name)?;
            self.check_math_arity(fn_id, name, 1)?;
            let body = self.exprs.alloc(Expr::Math1(op));
            let code = self.cases.strict(body);
            let func = self.env.func_mut(fn_id);
            func.code = Some(code);
            func.arity = 1;
            func.branches.clear();
        }
        for &(name, op) in MATH2 {
            let fn_id = self.lookup_fn(name)?;
            self.check_math_arity(fn_id, name, 2)?;
            let body = self.exprs.alloc(Expr::Math2(op));
            let code = self.cases.strict(body);
            let func = self.env.func_mut(fn_id);
            func.code = Some(code);
            func.arity = 1;
            func.branches.clear();
        }
        Ok(())
    }

    /// A math builtin must be declared `num -> num` or
    /// `num # num -> num`.
    fn check_math_arity(
        &self,
        fn_id: hope_ast::FuncId,
        name: &str,
        args: usize,
    ) -> Result<(), Diagnostic> {
        let bad = || {
            Diagnostic::new(
                ErrorKind::Library,
                format!("'{name}': built-in has wrong type"),
            )
        };
        let func = self.env.func(fn_id);
        let Some(qtype) = &func.qtype else { return Err(bad()) };
        let num = self.env.std.num;
        let Type::Cons { deftype, args: parts, .. } = &qtype.ty else { return Err(bad()) };
        if Some(*deftype) != self.env.std.function || parts.len() != 2 || parts[1].head() != num
        {
            return Err(bad());
        }
        match args {
            1 if parts[0].head() == num => Ok(()),
            2 => {
                let Type::Cons { deftype, args: pair, .. } = &parts[0] else {
                    return Err(bad());
                };
                if Some(*deftype) == self.env.std.product
                    && pair.len() == 2
                    && pair[0].head() == num
                    && pair[1].head() == num
                {
                    Ok(())
                } else {
                    Err(bad())
                }
            }
            _ => Err(bad()),
        }
    }

    fn init_names(&mut self) -> Result<RtNames, Diagnostic> {
        let missing = |what: &str| {
            Diagnostic::new(
                ErrorKind::Library,
                format!("{what}: standard definition missing"),
            )
        };
        // compare: structural comparison, strict in its pair.
        let compare_id = self.lookup_fn("compare")?;
        let body = self.exprs.alloc(Expr::Builtin(Builtin::Compare));
        let code = self.cases.strict(body);
        {
            let func = self.env.func_mut(compare_id);
            func.code = Some(code);
            func.arity = 1;
            func.branches.clear();
        }
        // The recursion vehicle: compare applied to the sole slot.
        let compare_ref = self.exprs.alloc(Expr::Defun(compare_id));
        let patt = {
            let v = self.interner.fresh("v");
            self.exprs.var(v)
        };
        let slot = self.exprs.alloc(Expr::Param(ParamExpr {
            level: 0,
            patt,
            path: Path::empty(),
        }));
        let e_cmp = self.exprs.apply(compare_ref, slot);

        let cmp_pair_id = self.lookup_fn("cmp_pair")?;
        let cmp_pair_body = match self.env.func(cmp_pair_id).code {
            Some(code) => match self.cases.get(code) {
                hope_ast::UCase::Success { body, .. } => *body,
                _ => return Err(missing("cmp_pair")),
            },
            None => return Err(missing("cmp_pair")),
        };

        let find_cons = |session: &mut Self, name: &str| {
            let interned = session.interner.intern(name);
            session.env.cons_lookup(interned).ok_or_else(|| missing(name))
        };
        let less = find_cons(self, "LESS")?;
        let equal = find_cons(self, "EQUAL")?;
        let greater = find_cons(self, "GREATER")?;

        let return_id = self.lookup_fn("return")?;
        let e_return = self.exprs.alloc(Expr::Return);
        let return_code = self.cases.success(e_return, 0);
        self.env.func_mut(return_id).code = Some(return_code);

        let print_id = self.lookup_fn("print")?;
        let e_print = self.exprs.alloc(Expr::Defun(print_id));
        let wr_list_id = self.lookup_fn("write_list")?;
        let e_wr_list = self.exprs.alloc(Expr::Defun(wr_list_id));

        let nil = self.env.std.nil.ok_or_else(|| missing("nil"))?;
        let cons = self.env.std.cons.ok_or_else(|| missing("::"))?;
        Ok(RtNames {
            e_cmp,
            cmp_pair_body,
            less,
            equal,
            greater,
            e_return,
            e_print,
            e_wr_list,
            nil,
            cons,
        })
    }

    /// Defines `argv` as the program's argument strings.
    fn init_argv(&mut self) -> Result<(), Diagnostic> {
        let (Some(e_cons), Some(e_nil)) = (self.env.std.e_cons, self.env.std.e_nil) else {
            return Ok(());
        };
        let mut list = e_nil;
        let argv = self.options.argv.clone();
        for arg in argv.iter().rev() {
            let text = self.exprs.text(e_cons, e_nil, arg.as_bytes());
            let pair = self.exprs.pair(text, list);
            list = self.exprs.apply(e_cons, pair);
        }
        let name = self.interner.intern("argv");
        let lhs = self.exprs.var(name);
        self.def_value(lhs, list)
    }

    // ---- display and save ----

    fn display(&mut self) -> Result<(), Diagnostic> {
        if !self.env.at_session() {
            return Err(Diagnostic::new(
                ErrorKind::Semantic,
                "'display' not permitted in module",
            ));
        }
        let text = self.dump_text(false);
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        Ok(())
    }

    fn save(&mut self, name: Name) -> Result<(), Diagnostic> {
        if self.options.restricted {
            return Err(Diagnostic::new(ErrorKind::Semantic, "'save' command disabled"));
        }
        if !self.env.at_session() {
            return Err(Diagnostic::new(
                ErrorKind::Semantic,
                "'save' not permitted in module",
            ));
        }
        let name_text = self.interner.text(name).to_string();
        let filename = format!("{name_text}{MODULE_EXTENSION}");
        if std::fs::metadata(&filename).is_ok() {
            return Err(Diagnostic::new(
                ErrorKind::Semantic,
                format!("'{name_text}': a module with this name already exists"),
            ));
        }
        let text = self.dump_text(true);
        std::fs::write(&filename, text).map_err(|_| {
            Diagnostic::new(ErrorKind::Semantic, format!("'{name_text}': can't save module"))
        })?;
        self.env.save_session_as(&self.interner, name)
    }

    /// The session's contents in re-parsable module-source form. Dumps
    /// print every type first as an `abstype` line so forward references
    /// resolve on re-reading.
    fn dump_text(&mut self, for_save: bool) -> String {
        let mut out = String::new();
        let session = self.env.session_module();
        // uses
        let used: Vec<String> = (hope_analyzer::ORDINARY..self.env.module_count())
            .filter(|&i| session.uses.contains(i))
            .map(|i| {
                self.interner.text(self.env.module(ModuleId::new(i)).name).to_string()
            })
            .collect();
        if !used.is_empty() {
            out.push_str(&format!("uses {};\n", used.join(", ")));
        }
        // typevar
        let tvars: Vec<String> = self
            .env
            .declared_tvars(ModuleId::new(SESSION))
            .iter()
            .map(|&tv| self.interner.text(tv).to_string())
            .collect();
        if !tvars.is_empty() {
            out.push_str(&format!("typevar {};\n", tvars.join(", ")));
        }
        // operators
        for op in self.env.session_module().ops.clone() {
            let keyword = match op.assoc {
                Assoc::Left => "infix",
                Assoc::Right => "infixr",
            };
            out.push_str(&format!(
                "{keyword} {} : {};\n",
                self.interner.text(op.name),
                op.prec
            ));
        }
        // types
        let types = self.env.session_module().types.clone();
        if for_save {
            for &dt in &types {
                out.push_str(&render_deftype(&self.env, &self.interner, dt, false));
                out.push('\n');
            }
            for &dt in &types {
                if !self.env.deftype(dt).is_abstract() {
                    out.push_str(&render_deftype(&self.env, &self.interner, dt, true));
                    out.push('\n');
                }
            }
        } else {
            for &dt in &types {
                out.push_str(&render_deftype(&self.env, &self.interner, dt, true));
                out.push('\n');
            }
        }
        // declarations, then definitions
        let fns = self.env.session_module().fns.clone();
        for &f in &fns {
            let func = self.env.func(f);
            if func.explicit_dec() {
                if let Some(qtype) = &func.qtype {
                    out.push_str(&format!(
                        "dec {} : {};\n",
                        self.interner.text(func.name),
                        render_type(&self.env, &self.interner, &qtype.ty)
                    ));
                }
            }
        }
        for &f in &fns {
            if self.env.func(f).explicit_def() {
                out.push('\n');
                let text = {
                    let mut evaluator = self.evaluator();
                    evaluator.render_fundef(f)
                };
                out.push_str(&text);
            }
        }
        out
    }

    // ---- diagnostics ----

    fn evaluator(&mut self) -> Evaluator<'_> {
        Evaluator {
            heap: &mut self.heap,
            exprs: &self.exprs,
            cases: &self.cases,
            env: &self.env,
            interner: &self.interner,
            streams: &mut self.streams,
            interrupt: &self.interrupt,
            names: self.names.as_ref(),
            out: &mut self.out,
            write_out: None,
            type_banner: None,
            restricted: self.options.restricted,
        }
    }

    fn report(&mut self, diag: Diagnostic) {
        let located = diag.at(self.location_module(), self.location_line());
        self.reporter.report(&located);
    }

    fn location_module(&self) -> Option<String> {
        let frame = self.sources.last()?;
        let module = frame.module?;
        Some(self.interner.text(self.env.module(module).name).to_string())
    }

    fn location_line(&self) -> Option<usize> {
        let frame = self.sources.last()?;
        if frame.interactive {
            None
        } else {
            Some(frame.lineno)
        }
    }

    fn report_resolve(&mut self, err: ResolveError) {
        let mut diag = Diagnostic::new(ErrorKind::Semantic, err.message);
        if let Some(expr) = err.trace {
            let line = {
                let mut evaluator = self.evaluator();
                evaluator.render_expr(expr)
            };
            diag.details.push(line);
        }
        self.report(diag);
    }

    fn report_type_error(&mut self, err: TypeError) {
        let mut diag = Diagnostic::new(ErrorKind::Type, err.message);
        for trace in err.traces {
            match trace {
                Trace::Expr(expr) => {
                    let line = {
                        let mut evaluator = self.evaluator();
                        evaluator.render_expr(expr)
                    };
                    diag.details.push(line);
                }
                Trace::ExprType(expr, ty) => {
                    let expr_text = {
                        let mut evaluator = self.evaluator();
                        evaluator.render_expr(expr)
                    };
                    let ty_text = render_cell(&mut self.tys, &self.env, &self.interner, ty);
                    diag.details.push(format!("{expr_text} : {ty_text}"));
                }
                Trace::Argument { func, arg, ty } => {
                    self.render_argument_trace(&mut diag, func, arg, ty);
                }
                Trace::Declared(qtype) => {
                    diag.details.push(format!(
                        "declared type: {}",
                        render_type(&self.env, &self.interner, &qtype.ty)
                    ));
                }
                Trace::Inferred(ty) => {
                    diag.details.push(format!(
                        "inferred type: {}",
                        render_cell(&mut self.tys, &self.env, &self.interner, ty)
                    ));
                }
            }
        }
        self.report(diag);
    }

    /// An operator applied to a pair reports each operand with its own
    /// type.
    fn render_argument_trace(
        &mut self,
        diag: &mut Diagnostic,
        func: ExprId,
        arg: ExprId,
        ty: hope_analyzer::TyCellId,
    ) {
        let op_name = {
            let evaluator = self.evaluator();
            evaluator.expr_name(func, u32::MAX)
        };
        let is_op = op_name
            .is_some_and(|name| hope_ast::OpResolver::op_lookup(&self.env, name).is_some());
        if is_op {
            if let Expr::Pair(left, right) = self.exprs.get(arg).clone() {
                let parts = self.tys.cons_args(ty);
                if parts.len() == 2 {
                    for (sub, part) in [(left, parts[0]), (right, parts[1])] {
                        let expr_text = {
                            let mut evaluator = self.evaluator();
                            evaluator.render_expr(sub)
                        };
                        let ty_text =
                            render_cell(&mut self.tys, &self.env, &self.interner, part);
                        diag.details.push(format!("{expr_text} : {ty_text}"));
                    }
                    return;
                }
            }
        }
        let expr_text = {
            let mut evaluator = self.evaluator();
            evaluator.render_expr(arg)
        };
        let ty_text = render_cell(&mut self.tys, &self.env, &self.interner, ty);
        diag.details.push(format!("{expr_text} : {ty_text}"));
    }
}
