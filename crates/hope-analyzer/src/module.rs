//! The module graph and its tables.
//!
//! Modules own four ordered tables keyed by interned name: operators,
//! types, functions, and (through the types) data constructors. The
//! runtime keeps a stack of modules being read; the bottom is the
//! interactive session and `Standard` is always module 1. A `private`
//! marker installs a shadow module whose additions are discarded when the
//! module finishes, preserving only the public part.

use hope_ast::{ConsId, DefTypeId, FuncId, ModuleId, Name, Op, OpResolver};
use hope_source::{Diagnostic, ErrorKind};

use crate::defs::{Cons, DefType, Func, PrivateMark, TypeBody};

/// Most modules a session can touch.
pub const MAX_MODULES: usize = 64;
/// Most distinct type variables a session can declare.
pub const MAX_TVARS: usize = 64;

/// A small index set over module or type-variable numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdSet(u64);

impl IdSet {
    /// The empty set.
    #[must_use]
    pub const fn new() -> Self { Self(0) }

    /// Adds an index.
    pub fn add(&mut self, index: usize) { self.0 |= 1 << index; }

    /// Removes an index.
    pub fn remove(&mut self, index: usize) { self.0 &= !(1 << index); }

    /// Membership test.
    #[must_use]
    pub const fn contains(self, index: usize) -> bool { self.0 & (1 << index) != 0 }

    /// In-place union.
    pub fn union(&mut self, other: Self) { self.0 |= other.0; }

    /// Number of members.
    #[must_use]
    pub const fn card(self) -> usize { self.0.count_ones() as usize }
}

/// One module's tables.
#[derive(Debug)]
pub struct Module {
    /// The module's name.
    pub name: Name,
    /// Index in the module list.
    pub index: ModuleId,
    /// Modules mentioned in `uses` clauses.
    pub uses: IdSet,
    /// Transitive closure of `uses`.
    pub all_uses: IdSet,
    /// Type variables declared here.
    pub tvars: IdSet,
    /// Type variables visible here (including used modules').
    pub all_tvars: IdSet,
    /// Operators, in declaration order.
    pub ops: Vec<Op>,
    /// Types, in declaration order.
    pub types: Vec<DefTypeId>,
    /// Functions, in declaration order.
    pub fns: Vec<FuncId>,
    /// The public part, when this is a private continuation module.
    pub public: Option<ModuleId>,
}

impl Module {
    fn new(name: Name, index: ModuleId) -> Self {
        Self {
            name,
            index,
            uses: IdSet::new(),
            all_uses: IdSet::new(),
            tvars: IdSet::new(),
            all_tvars: IdSet::new(),
            ops: Vec::new(),
            types: Vec::new(),
            fns: Vec::new(),
            public: None,
        }
    }

    fn clear(&mut self) {
        self.uses = IdSet::new();
        self.all_uses = IdSet::new();
        self.tvars = IdSet::new();
        self.all_tvars = IdSet::new();
        self.ops.clear();
        self.types.clear();
        self.fns.clear();
        self.public = None;
    }
}

/// The names the interpreter itself needs from the `Standard` module.
///
/// Filled in as the corresponding declarations are read and checked when
/// `Standard` finishes.
#[derive(Debug, Default)]
pub struct StdNames {
    /// The product type `#`.
    pub product: Option<DefTypeId>,
    /// The function type `->`.
    pub function: Option<DefTypeId>,
    /// `bool`.
    pub truval: Option<DefTypeId>,
    /// `num`.
    pub num: Option<DefTypeId>,
    /// `list`.
    pub list: Option<DefTypeId>,
    /// `char`.
    pub character: Option<DefTypeId>,
    /// The `nil` constructor.
    pub nil: Option<ConsId>,
    /// The `::` constructor.
    pub cons: Option<ConsId>,
    /// The distinguished `succ` constructor of `num`.
    pub succ: Option<ConsId>,
    /// The shared `nil` reference behind `[]` syntax.
    pub e_nil: Option<hope_ast::ExprId>,
    /// The shared `::` reference behind list syntax.
    pub e_cons: Option<hope_ast::ExprId>,
    /// The standard `id` function.
    pub id_fn: Option<FuncId>,
}

/// The session index: modules, the module stack, and the permanent
/// type/constructor/function tables.
#[derive(Debug)]
pub struct ModuleEnv {
    modules: Vec<Module>,
    stack: Vec<ModuleId>,
    unread: IdSet,
    deftypes: Vec<DefType>,
    conses: Vec<Cons>,
    funcs: Vec<Func>,
    tvar_list: Vec<Name>,
    /// Names required from `Standard`.
    pub std: StdNames,
}

/// Index of the interactive session module.
pub const SESSION: usize = 0;
/// Index of the standard environment.
pub const STANDARD: usize = 1;
/// First ordinary module index.
pub const ORDINARY: usize = 2;

impl ModuleEnv {
    /// Creates the environment with the session module on the stack.
    #[must_use]
    pub fn new(session_name: Name) -> Self {
        let mut env = Self {
            modules: Vec::new(),
            stack: Vec::new(),
            unread: IdSet::new(),
            deftypes: Vec::new(),
            conses: Vec::new(),
            funcs: Vec::new(),
            tvar_list: Vec::new(),
            std: StdNames::default(),
        };
        let session = env.new_module(session_name).expect("session module");
        env.stack.push(session);
        env
    }

    fn new_module(&mut self, name: Name) -> Result<ModuleId, Diagnostic> {
        if self.modules.len() == MAX_MODULES {
            return Err(Diagnostic::new(ErrorKind::Semantic, "too many modules"));
        }
        let id = ModuleId::new(self.modules.len());
        self.modules.push(Module::new(name, id));
        Ok(id)
    }

    /// The module currently being read.
    #[must_use]
    pub fn current(&self) -> ModuleId { *self.stack.last().expect("module stack") }

    /// Shared access to a module.
    #[must_use]
    pub fn module(&self, id: ModuleId) -> &Module { &self.modules[id.index()] }

    fn module_mut(&mut self, id: ModuleId) -> &mut Module { &mut self.modules[id.index()] }

    /// The name of the module currently being read.
    #[must_use]
    pub fn current_name(&self) -> Name { self.module(self.current()).name }

    /// Whether the current module is (the private part of) `Standard`.
    #[must_use]
    pub fn in_standard(&self) -> bool {
        let current = self.module(self.current());
        current.index.index() == STANDARD
            || current.public.is_some_and(|public| public.index() == STANDARD)
    }

    /// Whether the current module is the interactive session.
    #[must_use]
    pub fn at_session(&self) -> bool { self.current().index() == SESSION }

    /// How many modules exist.
    #[must_use]
    pub fn module_count(&self) -> usize { self.modules.len() }

    // ---- uses ----

    /// Finds or registers a module, queueing unknown ones for reading.
    fn resolve_module(&mut self, name: Name) -> Result<ModuleId, Diagnostic> {
        for module in self.modules.iter().skip(STANDARD) {
            if module.name == name {
                return Ok(module.index);
            }
        }
        let id = self.new_module(name)?;
        self.unread.add(id.index());
        Ok(id)
    }

    /// Records `uses name` in the current module.
    ///
    /// # Errors
    ///
    /// Rejects cyclic `uses` chains through the module stack.
    pub fn mod_use(
        &mut self,
        interner: &hope_ast::Interner,
        name: Name,
    ) -> Result<(), Diagnostic> {
        let id = self.resolve_module(name)?;
        for &reading in &self.stack {
            let module = self.module(reading);
            if reading == id || module.public == Some(id) {
                return Err(Diagnostic::new(
                    ErrorKind::Semantic,
                    format!("'{}': cyclic 'uses' reference", interner.text(name)),
                ));
            }
        }
        let used_all_uses = self.module(id).all_uses;
        let used_all_tvars = self.module(id).all_tvars;
        let current = self.current();
        let module = self.module_mut(current);
        module.uses.add(id.index());
        module.all_uses.add(id.index());
        module.all_uses.union(used_all_uses);
        module.all_tvars.union(used_all_tvars);
        Ok(())
    }

    /// The next queued module the current module uses, if any. The
    /// caller opens its source and then confirms with [`Self::enter`]
    /// or abandons with [`Self::abandon`].
    #[must_use]
    pub fn next_unread(&self) -> Option<ModuleId> {
        let current = self.module(self.current());
        (STANDARD..self.modules.len())
            .find(|&i| self.unread.contains(i) && current.uses.contains(i))
            .map(ModuleId::new)
    }

    /// Starts reading a fetched module.
    pub fn enter(
        &mut self,
        interner: &hope_ast::Interner,
        id: ModuleId,
    ) -> Result<(), Diagnostic> {
        self.unread.remove(id.index());
        self.stack.push(id);
        if id.index() != STANDARD {
            let standard = self.module(ModuleId::new(STANDARD)).name;
            self.mod_use(interner, standard)?;
        }
        Ok(())
    }

    /// Drops a module that could not be read.
    pub fn abandon(&mut self, id: ModuleId) {
        let current = self.current();
        self.module_mut(current).uses.remove(id.index());
    }

    /// Finishes the module on top of the stack: resets privately defined
    /// abstract types, propagates the public closure into every user,
    /// and pops the stack. Returns the public module that finished.
    pub fn finish(&mut self) -> ModuleId {
        let top = self.stack.pop().expect("module stack");
        let mut public = top;
        if let Some(public_id) = self.module(top).public {
            public = public_id;
            let types = self.module(public_id).types.clone();
            for dt_id in types {
                self.reset_private(dt_id);
            }
            self.fix_synonyms_of(public_id);
        }
        let all_uses = self.module(public).all_uses;
        let all_tvars = self.module(public).all_tvars;
        for &reader in &self.stack.clone() {
            if self.module(reader).uses.contains(public.index()) {
                let module = self.module_mut(reader);
                module.all_uses.union(all_uses);
                module.all_tvars.union(all_tvars);
            }
        }
        public
    }

    /// Installs a private continuation module; everything declared after
    /// this point is discarded when the module finishes.
    pub fn go_private(&mut self) -> Result<(), Diagnostic> {
        if self.at_session() {
            return Ok(());
        }
        let current = self.current();
        let name = self.module(current).name;
        let shadow_id = self.new_module(name)?;
        {
            let (uses, all_uses, tvars, all_tvars) = {
                let module = self.module(current);
                (module.uses, module.all_uses, module.tvars, module.all_tvars)
            };
            let shadow = self.module_mut(shadow_id);
            shadow.uses.union(uses);
            shadow.all_uses.union(all_uses);
            shadow.tvars.union(tvars);
            shadow.all_tvars.union(all_tvars);
            shadow.public = Some(current);
        }
        let types = self.module(current).types.clone();
        for dt_id in types {
            let dt = self.deftype_mut(dt_id);
            dt.private_mark = if dt.is_abstract() {
                Some(PrivateMark { params: dt.params.clone(), polarity: dt.polarity.clone() })
            } else {
                None
            };
        }
        let top = self.stack.last_mut().expect("module stack");
        *top = shadow_id;
        Ok(())
    }

    /// Moves the session's contents into a newly registered module, as
    /// the `save` command does after dumping, leaving the session using
    /// `Standard` and the new module.
    pub fn save_session_as(
        &mut self,
        interner: &hope_ast::Interner,
        name: Name,
    ) -> Result<(), Diagnostic> {
        let id = self.new_module(name)?;
        let (uses, all_uses, tvars, all_tvars, ops, types, fns) = {
            let session = &mut self.modules[SESSION];
            let taken = (
                session.uses,
                session.all_uses,
                session.tvars,
                session.all_tvars,
                std::mem::take(&mut session.ops),
                std::mem::take(&mut session.types),
                std::mem::take(&mut session.fns),
            );
            session.clear();
            taken
        };
        let saved = self.module_mut(id);
        saved.uses = uses;
        saved.all_uses = all_uses;
        saved.tvars = tvars;
        saved.all_tvars = all_tvars;
        saved.ops = ops;
        saved.types = types;
        saved.fns = fns;
        let standard = self.module(ModuleId::new(STANDARD)).name;
        self.mod_use(interner, standard)?;
        self.mod_use(interner, name)
    }

    /// The interactive session's module.
    #[must_use]
    pub fn session_module(&self) -> &Module { &self.modules[SESSION] }

    fn reset_private(&mut self, dt_id: DefTypeId) {
        let dt = self.deftype_mut(dt_id);
        if let Some(mark) = dt.private_mark.take() {
            dt.params = mark.params;
            dt.polarity = mark.polarity;
            dt.syn_depth = 0;
            dt.body = TypeBody::Abstract;
        }
    }

    /// Recomputes `syn_depth` for the current module's type synonyms.
    ///
    /// Needed when an abstract type is fulfilled by a synonym and when
    /// privately-defined abstract types are reset.
    pub fn fix_synonyms(&mut self) {
        let current = self.current();
        self.fix_synonyms_of(current);
        if let Some(public) = self.module(current).public {
            self.fix_synonyms_of(public);
        }
    }

    fn fix_synonyms_of(&mut self, id: ModuleId) {
        let types = self.module(id).types.clone();
        for dt_id in types {
            let depth = self.chain_depth(dt_id);
            self.deftype_mut(dt_id).syn_depth = depth;
        }
    }

    fn chain_depth(&self, start: DefTypeId) -> u32 {
        let mut depth = 0;
        let mut dt = self.deftype(start);
        loop {
            let TypeBody::Synonym(body) = &dt.body else { break };
            depth += 1;
            let mut ty = body;
            while let hope_ast::Type::Mu { body, .. } = ty {
                ty = body;
            }
            match ty.head() {
                Some(next) => dt = self.deftype(next),
                None => break,
            }
        }
        depth
    }

    // ---- lookups ----

    fn look_here<T>(&self, mut find: impl FnMut(&Module) -> Option<T>) -> Option<T> {
        let current = self.module(self.current());
        if let Some(found) = find(current) {
            return Some(found);
        }
        current.public.and_then(|public| find(self.module(public)))
    }

    fn look_everywhere<T>(&self, mut find: impl FnMut(&Module) -> Option<T>) -> Option<T> {
        if let Some(found) = self.look_here(&mut find) {
            return Some(found);
        }
        let all_uses = self.module(self.current()).all_uses;
        for i in (STANDARD..self.modules.len()).rev() {
            if all_uses.contains(i) {
                if let Some(found) = find(&self.modules[i]) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// The visible type declared under `name`, if any.
    #[must_use]
    pub fn dt_lookup(&self, name: Name) -> Option<DefTypeId> {
        self.look_everywhere(|m| {
            m.types.iter().copied().find(|&id| self.deftype(id).name == name)
        })
    }

    /// The type declared under `name` in the current module.
    #[must_use]
    pub fn dt_local(&self, name: Name) -> Option<DefTypeId> {
        self.look_here(|m| m.types.iter().copied().find(|&id| self.deftype(id).name == name))
    }

    fn cons_in(&self, module: &Module, name: Name) -> Option<ConsId> {
        for &dt_id in &module.types {
            if let TypeBody::Data(constructors) = &self.deftype(dt_id).body {
                for &c in constructors {
                    if self.cons(c).name == name {
                        return Some(c);
                    }
                }
            }
        }
        None
    }

    /// The visible data constructor named `name`, if any.
    #[must_use]
    pub fn cons_lookup(&self, name: Name) -> Option<ConsId> {
        self.look_everywhere(|m| self.cons_in(m, name))
    }

    /// The data constructor named `name` in the current module.
    #[must_use]
    pub fn cons_local(&self, name: Name) -> Option<ConsId> {
        self.look_here(|m| self.cons_in(m, name))
    }

    /// The visible function named `name`, if any.
    #[must_use]
    pub fn fn_lookup(&self, name: Name) -> Option<FuncId> {
        self.look_everywhere(|m| m.fns.iter().copied().find(|&id| self.func(id).name == name))
    }

    /// The function named `name` in the current module.
    #[must_use]
    pub fn fn_local(&self, name: Name) -> Option<FuncId> {
        self.look_here(|m| m.fns.iter().copied().find(|&id| self.func(id).name == name))
    }

    // ---- table access ----

    /// Shared access to a declared type.
    #[must_use]
    pub fn deftype(&self, id: DefTypeId) -> &DefType { &self.deftypes[id.index()] }

    /// Mutable access to a declared type.
    pub fn deftype_mut(&mut self, id: DefTypeId) -> &mut DefType {
        &mut self.deftypes[id.index()]
    }

    /// Shared access to a constructor.
    #[must_use]
    pub fn cons(&self, id: ConsId) -> &Cons { &self.conses[id.index()] }

    /// Shared access to a function.
    #[must_use]
    pub fn func(&self, id: FuncId) -> &Func { &self.funcs[id.index()] }

    /// Mutable access to a function.
    pub fn func_mut(&mut self, id: FuncId) -> &mut Func { &mut self.funcs[id.index()] }

    /// Allocates a type entry; it is not visible until
    /// [`Self::dt_declare`] runs.
    pub fn alloc_deftype(&mut self, dt: DefType) -> DefTypeId {
        let id = DefTypeId::new(self.deftypes.len());
        self.deftypes.push(dt);
        id
    }

    /// Allocates a constructor entry.
    pub fn alloc_cons(&mut self, cons: Cons) -> ConsId {
        let id = ConsId::new(self.conses.len());
        self.conses.push(cons);
        id
    }

    /// Adds a function to the current module.
    pub fn add_func(&mut self, func: Func) -> FuncId {
        let id = FuncId::new(self.funcs.len());
        self.funcs.push(func);
        let current = self.current();
        self.module_mut(current).fns.push(id);
        id
    }

    /// Removes a function from the current module's table (used when a
    /// declaration replaces an implicitly created entry).
    pub fn del_func(&mut self, id: FuncId) {
        let current = self.current();
        self.module_mut(current).fns.retain(|&f| f != id);
    }

    /// Makes a declared type visible in the current module.
    pub fn dt_declare(&mut self, id: DefTypeId) {
        let current = self.current();
        self.module_mut(current).types.push(id);
    }

    /// The number of data constructors of a constructor's parent type.
    #[must_use]
    pub fn num_cases(&self, cons: ConsId) -> usize {
        match &self.deftype(self.cons(cons).parent).body {
            TypeBody::Data(constructors) => constructors.len(),
            _ => 1,
        }
    }

    // ---- operators ----

    /// Declares an operator in the current module.
    pub fn op_declare(&mut self, op: Op) {
        let current = self.current();
        self.module_mut(current).ops.push(op);
    }

    // ---- type variables ----

    /// Declares a type variable in the current module; primes are
    /// ignored so the printer's primed names round-trip.
    pub fn tv_declare(
        &mut self,
        interner: &mut hope_ast::Interner,
        name: Name,
    ) -> Result<(), Diagnostic> {
        let name = self.tv_trim(interner, name);
        let n = match self.tvar_list.iter().position(|&tv| tv == name) {
            Some(n) => n,
            None => {
                if self.tvar_list.len() == MAX_TVARS {
                    return Err(Diagnostic::new(ErrorKind::Semantic, "too many type variables"));
                }
                self.tvar_list.push(name);
                self.tvar_list.len() - 1
            }
        };
        let current = self.current();
        let module = self.module_mut(current);
        module.tvars.add(n);
        module.all_tvars.add(n);
        Ok(())
    }

    /// Whether `name` is a declared type variable visible here.
    #[must_use]
    pub fn tv_lookup(&self, interner: &hope_ast::Interner, name: Name) -> bool {
        let text = interner.text(name);
        let trimmed = text.split('\'').next().unwrap_or(text);
        let module = self.module(self.current());
        self.tvar_list.iter().enumerate().any(|(n, &tv)| {
            module.all_tvars.contains(n) && interner.text(tv) == trimmed
        })
    }

    fn tv_trim(&self, interner: &mut hope_ast::Interner, name: Name) -> Name {
        let text = interner.text(name);
        match text.find('\'') {
            Some(cut) => {
                let trimmed = text[..cut].to_string();
                interner.intern(&trimmed)
            }
            None => name,
        }
    }

    /// Renders inference variable `n` as the `n+1`'th visible type
    /// variable, adding primes when the declared ones run out.
    #[must_use]
    pub fn tvar_display(&self, interner: &hope_ast::Interner, n: usize) -> String {
        let module = self.module(self.current());
        let visible: Vec<Name> = self
            .tvar_list
            .iter()
            .enumerate()
            .filter(|&(i, _)| module.all_tvars.contains(i))
            .map(|(_, &tv)| tv)
            .collect();
        if visible.is_empty() {
            let mut out = String::from("alpha");
            out.push_str(&"'".repeat(n));
            return out;
        }
        let mut out = interner.text(visible[n % visible.len()]).to_string();
        out.push_str(&"'".repeat(n / visible.len()));
        out
    }

    /// The type variables declared directly in a module, for dumps.
    #[must_use]
    pub fn declared_tvars(&self, id: ModuleId) -> Vec<Name> {
        let module = self.module(id);
        self.tvar_list
            .iter()
            .enumerate()
            .filter(|&(i, _)| module.tvars.contains(i))
            .map(|(_, &tv)| tv)
            .collect()
    }
}

impl OpResolver for ModuleEnv {
    fn op_lookup(&self, name: Name) -> Option<Op> {
        self.look_everywhere(|m| m.ops.iter().copied().find(|op| op.name == name))
    }
}
