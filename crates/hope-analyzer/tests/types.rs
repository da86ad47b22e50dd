//! Inference-cell properties: undo on failure, instance checks, and
//! memoized synonym expansion.

use hope_analyzer::defs::{Cons, DefType, TypeBody};
use hope_analyzer::{ModuleEnv, TyArena, TyCell};
use hope_ast::{DefTypeId, Interner, QType, Type};

struct Fixture {
    pool: Interner,
    env: ModuleEnv,
}

impl Fixture {
    fn new() -> Self {
        let mut pool = Interner::new();
        let session = pool.intern("<Session>");
        Self { pool, env: ModuleEnv::new(session) }
    }

    fn deftype(&mut self, name: &str, arity: u32, body: TypeBody) -> DefTypeId {
        let name = self.pool.intern(name);
        let id = self.env.alloc_deftype(DefType {
            name,
            arity,
            tupled: false,
            params: Vec::new(),
            polarity: Vec::new(),
            body,
            syn_depth: 0,
            private_mark: None,
        });
        self.env.dt_declare(id);
        id
    }

    /// A nullary data type with one constructor, so cells have a
    /// concrete head.
    fn atom_type(&mut self, name: &str) -> DefTypeId {
        let id = self.deftype(name, 0, TypeBody::Abstract);
        let cname = self.pool.intern(&format!("mk_{name}"));
        let c = self.env.alloc_cons(Cons {
            name: cname,
            nargs: 0,
            index: 0,
            parent: id,
            ty: Type::constant(id),
            ntvars: 0,
        });
        self.env.deftype_mut(id).body = TypeBody::Data(vec![c]);
        id
    }
}

fn var(pool: &mut Interner, text: &str, index: u32) -> Type {
    Type::var(pool.intern(text), index)
}

#[test]
fn failed_unification_undoes_every_instantiation() {
    let mut fx = Fixture::new();
    let pair = fx.deftype("p", 2, TypeBody::Abstract);
    let t0 = fx.atom_type("t0");
    let t1 = fx.atom_type("t1");
    let mut tys = TyArena::new();

    // p(v, t0) against p(t1, t1): the first argument instantiates v,
    // the second fails, and the whole attempt must roll back.
    let v = tys.new_tvar();
    let a0 = tys.const_type(t0);
    let left_args = {
        let tail = tys.new_tlist(a0, None);
        Some(tys.new_tlist(v, Some(tail)))
    };
    let left = tys.new_tcons(pair, left_args);
    let b0 = tys.const_type(t1);
    let b1 = tys.const_type(t1);
    let right_args = {
        let tail = tys.new_tlist(b1, None);
        Some(tys.new_tlist(b0, Some(tail)))
    };
    let right = tys.new_tcons(pair, right_args);

    assert!(!tys.unify(&fx.env, left, right));
    assert!(matches!(tys.get(tys.deref(v)), TyCell::Var), "v must be uninstantiated again");
    assert!(
        matches!(tys.get(tys.deref(left)), TyCell::Cons { .. }),
        "the identified cells must be split again"
    );
    // And the same unification against a compatible partner succeeds.
    let c0 = tys.const_type(t0);
    let ok_args = {
        let tail = tys.new_tlist(c0, None);
        let head = tys.const_type(t1);
        Some(tys.new_tlist(head, Some(tail)))
    };
    let ok = tys.new_tcons(pair, ok_args);
    assert!(tys.unify(&fx.env, left, ok));
    assert_eq!(tys.deref(v), tys.deref(tys.cons_args(ok)[0]));
}

#[test]
fn instance_is_reflexive_for_declared_types() {
    let mut fx = Fixture::new();
    let arrow = fx.deftype("fn2", 2, TypeBody::Abstract);
    let declared = QType {
        ty: Type::Cons {
            deftype: arrow,
            tupled: false,
            args: vec![var(&mut fx.pool, "a", 0), var(&mut fx.pool, "a", 0)],
        },
        ntvars: 1,
    };
    let mut tys = TyArena::new();
    let copy = tys.copy_type(&fx.env, &declared.ty, declared.ntvars, false);
    assert!(tys.instance(&fx.env, &declared, copy));
}

#[test]
fn declarations_demand_an_inferred_type_at_least_as_general() {
    let mut fx = Fixture::new();
    let arrow = fx.deftype("fn2", 2, TypeBody::Abstract);
    let t0 = fx.atom_type("t0");
    let general = QType {
        ty: Type::Cons {
            deftype: arrow,
            tupled: false,
            args: vec![var(&mut fx.pool, "a", 0), var(&mut fx.pool, "a", 0)],
        },
        ntvars: 1,
    };
    let concrete = QType {
        ty: Type::Cons {
            deftype: arrow,
            tupled: false,
            args: vec![Type::constant(t0), Type::constant(t0)],
        },
        ntvars: 0,
    };
    let mut tys = TyArena::new();
    // A fully general inferred type satisfies a concrete declaration…
    assert!(tys.ty_instance(&fx.env, &concrete, &general));
    // …but a concrete inferred type cannot satisfy a general
    // declaration: its head clashes with the frozen variable.
    assert!(!tys.ty_instance(&fx.env, &general, &concrete));
}

#[test]
fn synonym_expansion_is_idempotent_and_ties_recursion() {
    let mut fx = Fixture::new();
    let pair = fx.deftype("p", 2, TypeBody::Abstract);
    let num = fx.atom_type("n");
    // type s == p(s, n);  (a regular equirecursive synonym)
    let syn = fx.deftype("s", 0, TypeBody::Abstract);
    let body = Type::Cons {
        deftype: pair,
        tupled: false,
        args: vec![Type::constant(syn), Type::constant(num)],
    };
    {
        let dt = fx.env.deftype_mut(syn);
        dt.body = TypeBody::Synonym(body);
        dt.syn_depth = 1;
    }

    let mut tys = TyArena::new();
    let cell = tys.new_tcons(syn, None);
    let expanded = tys.expand_type(&fx.env, cell);
    let again = tys.expand_type(&fx.env, expanded);
    assert_eq!(expanded, again, "expansion must be idempotent");

    // The expansion is a cyclic graph: the first argument of the pair
    // leads back to the expansion itself.
    let args = tys.cons_args(expanded);
    assert_eq!(args.len(), 2);
    assert_eq!(tys.deref(args[0]), expanded, "recursion must tie back");
}
