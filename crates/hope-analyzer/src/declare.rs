//! Processing of type declarations.
//!
//! `data`, `type` and `abstype` items arrive as parsed headers and
//! surface type terms; this module resolves them against the tables,
//! runs the recursion and polarity checks, and installs the results.
//! Data and synonym declarations may fulfil an earlier `abstype` of the
//! same name.

use hope_ast::{ConsId, DefTypeId, Interner, Name, QType, Type, TypeExpr};
use hope_parser::{ConsDecl, ParamDecl, PolarityMark, TypeHeader};
use hope_source::{Diagnostic, ErrorKind};

use crate::defs::{Cons, DefType, Func, Polarity, TypeBody};
use crate::module::ModuleEnv;
use crate::rectype;
use crate::ty::TyArena;

/// Longest admissible synonym-to-head expansion chain.
pub const MAX_SYN_DEPTH: u32 = 64;

fn sem(msg: String) -> Diagnostic { Diagnostic::new(ErrorKind::Semantic, msg) }

/// State of the type declaration currently being processed.
pub struct CurrentDecl {
    /// The (possibly pre-existing) table entry.
    pub id: DefTypeId,
    /// Whether an abstract declaration is being fulfilled.
    pub already_defined: bool,
    /// The new formal parameters, in order.
    pub params: Vec<Name>,
    /// Polarity markers from the header (abstract declarations).
    pub marks: Vec<Option<PolarityMark>>,
    /// Whether the parameters were written tupled.
    pub tupled: bool,
}

/// Declaration processor; also resolves surface types for `dec` items.
pub struct Declarer<'a> {
    /// The module environment.
    pub env: &'a mut ModuleEnv,
    /// The identifier pool.
    pub interner: &'a mut Interner,
    cur: Option<CurrentDecl>,
}

impl<'a> Declarer<'a> {
    /// Creates a declarer.
    pub fn new(env: &'a mut ModuleEnv, interner: &'a mut Interner) -> Self {
        Self { env, interner, cur: None }
    }

    fn text(&self, name: Name) -> &str { self.interner.text(name) }

    /// Begins a type declaration from its header, reusing an abstract
    /// entry when the name is already declared.
    pub fn start(&mut self, header: &TypeHeader) -> Result<(), Diagnostic> {
        let arity = header.params.len() as u32;
        let existing = self.env.dt_local(header.name);
        let (id, already_defined) = match existing {
            Some(id) => {
                let dt = self.env.deftype(id);
                if !dt.is_abstract() {
                    return Err(sem(format!(
                        "'{}': attempt to redefine type",
                        self.text(header.name)
                    )));
                }
                if dt.arity != arity {
                    return Err(sem(format!(
                        "'{}': wrong number of type arguments",
                        self.text(header.name)
                    )));
                }
                if dt.tupled != header.tupled {
                    return Err(sem(format!(
                        "'{}': different argument syntax",
                        self.text(header.name)
                    )));
                }
                (id, true)
            }
            None => {
                let id = self.env.alloc_deftype(DefType {
                    name: header.name,
                    arity,
                    tupled: header.tupled,
                    params: Vec::new(),
                    polarity: Vec::new(),
                    body: TypeBody::Abstract,
                    syn_depth: 0,
                    private_mark: None,
                });
                (id, false)
            }
        };
        self.check_params_distinct(&header.params)?;
        self.cur = Some(CurrentDecl {
            id,
            already_defined,
            params: header.params.iter().map(|p| p.name).collect(),
            marks: header.params.iter().map(|p| p.polarity).collect(),
            tupled: header.tupled,
        });
        Ok(())
    }

    fn check_params_distinct(&self, params: &[ParamDecl]) -> Result<(), Diagnostic> {
        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(sem(format!(
                    "'{}': parameter is repeated",
                    self.text(param.name)
                )));
            }
        }
        Ok(())
    }

    fn cur(&self) -> &CurrentDecl { self.cur.as_ref().expect("declaration in progress") }

    /// Completes an `abstype` declaration.
    pub fn abstype(&mut self) -> Result<Option<DefTypeId>, Diagnostic> {
        let cur = self.cur.take().expect("declaration in progress");
        if cur.already_defined {
            return Ok(None);
        }
        // Parameters of an abstract type take their polarity from the
        // declaration markers; unmarked ones admit any use.
        let polarity = cur
            .marks
            .iter()
            .map(|mark| match mark {
                Some(PolarityMark::Pos) => Polarity::Pos,
                Some(PolarityMark::Neg) => Polarity::Neg,
                Some(PolarityMark::None) => Polarity::None,
                None => Polarity::Both,
            })
            .collect();
        let dt = self.env.deftype_mut(cur.id);
        dt.params = cur.params;
        dt.polarity = polarity;
        self.declare(cur.id);
        Ok(Some(cur.id))
    }

    /// Completes a `type` synonym declaration. Returns the entry id for
    /// the functor definition the caller generates.
    pub fn type_syn(&mut self, body: &TypeExpr) -> Result<DefTypeId, Diagnostic> {
        let body = self.resolve_in_decl(body)?;
        let cur = self.cur.take().expect("declaration in progress");
        let name = self.env.deftype(cur.id).name;
        if rectype::is_header(self.env, &body, cur.id) {
            return Err(sem(format!(
                "'{}': left-recursive type definition",
                self.text(name)
            )));
        }
        rectype::bad_rectype(self.env, self.interner, cur.id, &body)?;
        let polarity = rectype::compute(self.env, cur.id, cur.params.len(), [&body].into_iter());
        if cur.already_defined {
            rectype::check_preserved(self.interner, self.env.deftype(cur.id), &polarity)?;
        }

        // Depth of the expansion chain through the synonym's head.
        let mut head = &body;
        while let Type::Mu { body, .. } = head {
            head = body;
        }
        let syn_depth = 1 + match head.head() {
            Some(dt) => self.env.deftype(dt).syn_depth,
            None => 0,
        };
        if syn_depth > MAX_SYN_DEPTH {
            return Err(sem("type synonyms nested too deeply".to_string()));
        }

        let dt = self.env.deftype_mut(cur.id);
        dt.params = cur.params;
        dt.polarity = polarity;
        dt.body = TypeBody::Synonym(body);
        dt.syn_depth = syn_depth;
        if cur.already_defined {
            self.env.fix_synonyms();
        } else {
            self.declare(cur.id);
        }
        Ok(cur.id)
    }

    /// Completes a `data` declaration. Returns the entry id and the
    /// functions whose earlier declarations the new constructors fulfil.
    pub fn decl_data(
        &mut self,
        tys: &mut TyArena,
        alts: &[ConsDecl],
    ) -> Result<(DefTypeId, Vec<(hope_ast::FuncId, ConsId)>), Diagnostic> {
        let cur_id = self.cur().id;
        let cur_arity = self.cur().params.len();
        let newtype = self.current_newtype();

        let mut built = Vec::with_capacity(alts.len());
        for (index, alt) in alts.iter().enumerate() {
            if self.env.cons_local(alt.name).is_some() {
                return Err(sem(format!(
                    "'{}': attempt to redefine constructor",
                    self.text(alt.name)
                )));
            }
            let args: Vec<Type> = alt
                .args
                .iter()
                .map(|arg| self.resolve_in_decl(arg))
                .collect::<Result<_, _>>()?;
            for arg in &args {
                rectype::bad_rectype(self.env, self.interner, cur_id, arg)?;
            }
            let (ty, nargs) = if alt.tupled {
                let product = self.multi_pair(&args)?;
                (self.arrow(product, newtype.clone())?, 1)
            } else {
                let mut ty = newtype.clone();
                for arg in args.iter().rev() {
                    ty = self.arrow(arg.clone(), ty)?;
                }
                (ty, args.len() as u32)
            };
            built.push(Cons {
                name: alt.name,
                nargs,
                index: index as u32,
                parent: cur_id,
                ty,
                ntvars: cur_arity as u32,
            });
        }

        let cur = self.cur.take().expect("declaration in progress");
        let mut field_types: Vec<Type> = Vec::new();
        for cons in &built {
            let mut ty = &cons.ty;
            while let Type::Cons { deftype, args, .. } = ty {
                if Some(*deftype) != self.env.std.function || args.len() != 2 {
                    break;
                }
                field_types.push(args[0].clone());
                ty = &args[1];
            }
        }
        let polarity = rectype::compute(self.env, cur.id, cur.params.len(), field_types.iter());
        if cur.already_defined {
            rectype::check_preserved(self.interner, self.env.deftype(cur.id), &polarity)?;
        }

        // Fulfilled value declarations are checked before anything is
        // installed.
        let mut pending = Vec::new();
        for (i, cons) in built.iter().enumerate() {
            if let Some(fn_id) = self.env.fn_local(cons.name) {
                let func = self.env.func(fn_id);
                if func.code.is_some() {
                    return Err(sem(format!(
                        "'{}': attempt to redefine value identifier",
                        self.text(cons.name)
                    )));
                }
                if let Some(qtype) = func.qtype.clone() {
                    let cons_q = QType { ty: cons.ty.clone(), ntvars: cons.ntvars };
                    if !tys.ty_instance(self.env, &qtype, &cons_q) {
                        return Err(sem(format!(
                            "'{}': type does not match declaration",
                            self.text(cons.name)
                        )));
                    }
                }
                pending.push((fn_id, i));
            }
        }

        let mut cons_ids = Vec::with_capacity(built.len());
        for cons in built {
            cons_ids.push(self.env.alloc_cons(cons));
        }
        let fulfilled =
            pending.into_iter().map(|(fn_id, i)| (fn_id, cons_ids[i])).collect::<Vec<_>>();

        let dt = self.env.deftype_mut(cur.id);
        dt.params = cur.params;
        dt.polarity = polarity;
        dt.body = TypeBody::Data(cons_ids);
        dt.syn_depth = 0;
        if !cur.already_defined {
            self.declare(cur.id);
        } else {
            self.remember(cur.id);
        }
        Ok((cur.id, fulfilled))
    }

    /// Registers the type in the current module, together with its
    /// value-level functor entry.
    fn declare(&mut self, id: DefTypeId) {
        self.env.dt_declare(id);
        let name = self.env.deftype(id).name;
        let _ = self.env.add_func(Func::functor(name, id));
        log::debug!("declared type '{}'", self.text(name));
        self.remember(id);
    }

    /// Notes standard types and constructors while `Standard` is read.
    fn remember(&mut self, id: DefTypeId) {
        if !self.env.in_standard() {
            return;
        }
        let name_text = self.text(self.env.deftype(id).name).to_string();
        match name_text.as_str() {
            "->" => self.env.std.function = Some(id),
            "#" => self.env.std.product = Some(id),
            "bool" => self.env.std.truval = Some(id),
            "num" => self.env.std.num = Some(id),
            "list" => self.env.std.list = Some(id),
            "char" => self.env.std.character = Some(id),
            _ => {}
        }
        if let TypeBody::Data(cons_ids) = self.env.deftype(id).body.clone() {
            for c in cons_ids {
                match self.text(self.env.cons(c).name) {
                    "nil" => self.env.std.nil = Some(c),
                    "::" => self.env.std.cons = Some(c),
                    "succ" => self.env.std.succ = Some(c),
                    _ => {}
                }
            }
        }
    }

    /// The application of the current declaration to its own parameters.
    fn current_newtype(&self) -> Type {
        let cur = self.cur();
        Type::Cons {
            deftype: cur.id,
            tupled: cur.tupled,
            args: cur
                .params
                .iter()
                .enumerate()
                .map(|(i, &name)| Type::var(name, i as u32))
                .collect(),
        }
    }

    fn arrow(&self, from: Type, to: Type) -> Result<Type, Diagnostic> {
        let function = self
            .env
            .std
            .function
            .ok_or_else(|| Diagnostic::new(ErrorKind::Library, "'->' is not defined"))?;
        Ok(Type::Cons { deftype: function, tupled: true, args: vec![from, to] })
    }

    fn multi_pair(&self, args: &[Type]) -> Result<Type, Diagnostic> {
        let product = self
            .env
            .std
            .product
            .ok_or_else(|| Diagnostic::new(ErrorKind::Library, "'#' is not defined"))?;
        let mut iter = args.iter().rev();
        let mut ty = iter
            .next()
            .cloned()
            .ok_or_else(|| sem("a tupled constructor needs arguments".to_string()))?;
        for arg in iter {
            ty = Type::Cons { deftype: product, tupled: true, args: vec![arg.clone(), ty] };
        }
        Ok(ty)
    }

    /// Processes `dec name : t;`.
    ///
    /// # Errors
    ///
    /// The name must not already be explicitly declared or taken by a
    /// constructor (`succ` excepted: it is both a constructor of `num`
    /// and a function).
    pub fn decl_value(&mut self, name: Name, ty: &TypeExpr) -> Result<(), Diagnostic> {
        let qtype = self.qualified_type(ty)?;
        let existing = self.env.fn_local(name);
        let already_declared =
            existing.is_some_and(|f| self.env.func(f).explicit_dec());
        let cons_clash = self
            .env
            .cons_local(name)
            .is_some_and(|c| Some(c) != self.env.std.succ);
        if already_declared || cons_clash {
            return Err(sem(format!(
                "'{}': value identifier already declared",
                self.text(name)
            )));
        }
        if let Some(f) = existing {
            self.env.del_func(f);
        }
        let _ = self.env.add_func(Func::declared(name, qtype));
        Ok(())
    }

    // ---- surface type resolution ----

    /// Resolves a type inside the current declaration (bare names are
    /// its parameters).
    fn resolve_in_decl(&mut self, te: &TypeExpr) -> Result<Type, Diagnostic> {
        let mut mu_stack = Vec::new();
        self.resolve_type_expr(te, &mut mu_stack, true)
    }

    /// Resolves the type of a `dec`, numbering its free variables in
    /// order of first appearance.
    pub fn qualified_type(&mut self, te: &TypeExpr) -> Result<QType, Diagnostic> {
        let mut mu_stack = Vec::new();
        let mut ty = self.resolve_type_expr(te, &mut mu_stack, false)?;
        let mut seen: Vec<Name> = Vec::new();
        number_vars(&mut ty, &mut seen);
        Ok(QType { ty, ntvars: seen.len() as u32 })
    }

    fn resolve_type_expr(
        &mut self,
        te: &TypeExpr,
        mu_stack: &mut Vec<Name>,
        in_decl: bool,
    ) -> Result<Type, Diagnostic> {
        match te {
            TypeExpr::Name(name) => {
                if let Some(pos) = mu_stack.iter().rposition(|&v| v == *name) {
                    return Ok(Type::Var {
                        name: *name,
                        index: (mu_stack.len() - 1 - pos) as u32,
                        mu_bound: true,
                    });
                }
                if in_decl {
                    let cur = self.cur();
                    if let Some(i) = cur.params.iter().position(|&p| p == *name) {
                        return Ok(Type::var(*name, i as u32));
                    }
                } else if self.env.tv_lookup(self.interner, *name) {
                    return Ok(Type::var(*name, 0));
                }
                self.resolve_tycons(*name, false, &[], mu_stack, in_decl)
            }
            TypeExpr::Apply { name, tupled, args } => {
                self.resolve_tycons(*name, *tupled, args, mu_stack, in_decl)
            }
            TypeExpr::Mu { var, body } => {
                mu_stack.push(*var);
                let body = self.resolve_type_expr(body, mu_stack, in_decl)?;
                let _ = mu_stack.pop();
                Ok(Type::Mu { var: *var, body: Box::new(body) })
            }
        }
    }

    fn resolve_tycons(
        &mut self,
        name: Name,
        tupled: bool,
        args: &[TypeExpr],
        mu_stack: &mut Vec<Name>,
        in_decl: bool,
    ) -> Result<Type, Diagnostic> {
        let id = if in_decl && self.env.deftype(self.cur().id).name == name {
            self.cur().id
        } else {
            self.env
                .dt_lookup(name)
                .ok_or_else(|| sem(format!("'{}' is not a defined type", self.text(name))))?
        };
        let (arity, dt_tupled) = {
            let dt = self.env.deftype(id);
            (dt.arity, dt.tupled)
        };
        if arity != args.len() as u32 {
            return Err(sem(format!(
                "'{}': wrong number of type arguments",
                self.text(name)
            )));
        }
        if !args.is_empty() && dt_tupled != tupled {
            return Err(sem(format!(
                "'{}': different argument syntax",
                self.text(name)
            )));
        }
        let args = args
            .iter()
            .map(|arg| self.resolve_type_expr(arg, mu_stack, in_decl))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Type::Cons { deftype: id, tupled, args })
    }
}

/// Numbers non-μ variables by first appearance.
fn number_vars(ty: &mut Type, seen: &mut Vec<Name>) {
    match ty {
        Type::Var { name, index, mu_bound } => {
            if !*mu_bound {
                let n = match seen.iter().position(|&s| s == *name) {
                    Some(n) => n,
                    None => {
                        seen.push(*name);
                        seen.len() - 1
                    }
                };
                *index = n as u32;
            }
        }
        Type::Mu { body, .. } => number_vars(body, seen),
        Type::Cons { args, .. } => {
            for arg in args {
                number_vars(arg, seen);
            }
        }
    }
}
