//! Decision-tree compilation tests.

use std::collections::HashMap;

use hope_analyzer::defs::{Cons, DefType, TypeBody};
use hope_analyzer::ModuleEnv;
use hope_ast::cases::{LCase, NUM_EQUAL, NUM_GREATER, NUM_LESS};
use hope_ast::{
    Branch, CaseArena, CaseId, Dir, Expr, ExprArena, Formal, Interner, Type, UCase,
};

use crate::Compiler;

struct Fixture {
    pool: Interner,
    env: ModuleEnv,
    exprs: ExprArena,
    cases: CaseArena,
}

impl Fixture {
    fn new() -> Self {
        let mut pool = Interner::new();
        let session = pool.intern("<Session>");
        let env = ModuleEnv::new(session);
        Self { pool, env, exprs: ExprArena::new(), cases: CaseArena::new() }
    }

    /// Declares `data colour == red ++ green;` directly in the tables.
    fn with_colour(mut self) -> Self {
        let name = self.pool.intern("colour");
        let dt = self.env.alloc_deftype(DefType {
            name,
            arity: 0,
            tupled: false,
            params: vec![],
            polarity: vec![],
            body: TypeBody::Abstract,
            syn_depth: 0,
            private_mark: None,
        });
        let mut cons_ids = Vec::new();
        for (index, text) in ["red", "green"].iter().enumerate() {
            let cname = self.pool.intern(text);
            cons_ids.push(self.env.alloc_cons(Cons {
                name: cname,
                nargs: 0,
                index: index as u32,
                parent: dt,
                ty: Type::constant(dt),
                ntvars: 0,
            }));
        }
        self.env.deftype_mut(dt).body = TypeBody::Data(cons_ids);
        self.env.dt_declare(dt);
        self
    }

    fn var(&mut self, name: &str) -> hope_ast::ExprId {
        let name = self.pool.intern(name);
        self.exprs.var(name)
    }

    fn unary(&mut self, pattern: hope_ast::ExprId, body: hope_ast::ExprId) -> Branch {
        Branch { formals: vec![Formal::new(pattern)], body }
    }

    fn compile(&mut self, branches: &[Branch]) -> CaseId {
        let dummy = self.exprs.num(0.0);
        let mut code = self.cases.l_nomatch(dummy);
        for branch in branches {
            let mut compiler = Compiler::new(&mut self.exprs, &self.env, &mut self.cases);
            code = compiler.comp_branch(Some(code), branch);
        }
        code
    }

    /// Counts the actual pointers into every node reachable from `root`
    /// (the root itself owns one, from the code slot) and compares with
    /// the stored reference counts.
    fn assert_ref_integrity(&self, root: CaseId) {
        let mut counts: HashMap<usize, u32> = HashMap::new();
        let mut stack = vec![root];
        *counts.entry(root.index()).or_insert(0) += 1;
        let mut seen = std::collections::HashSet::new();
        let mut visited = Vec::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node.index()) {
                continue;
            }
            visited.push(node);
            if let UCase::Case(case) = self.cases.get(node) {
                case.cases.for_each_slot(|limb| {
                    *counts.entry(limb.index()).or_insert(0) += 1;
                    stack.push(limb);
                });
            }
        }
        for node in visited {
            if let UCase::Case(case) = self.cases.get(node) {
                assert_eq!(
                    case.refs,
                    counts[&node.index()],
                    "node {} has {} recorded references but {} pointers",
                    node.index(),
                    case.refs,
                    counts[&node.index()]
                );
            }
        }
    }
}

#[test]
fn pair_literal_merge_shares_the_default_success() {
    // --- f (x, 0) <= "a";  --- f (x, y) <= "b";
    let mut fx = Fixture::new();
    let x = fx.var("x");
    let zero = fx.exprs.num(0.0);
    let p1 = fx.exprs.pair(x, zero);
    let a = fx.exprs.num(10.0);
    let eq1 = fx.unary(p1, a);

    let x2 = fx.var("x");
    let y2 = fx.var("y");
    let p2 = fx.exprs.pair(x2, y2);
    let b = fx.exprs.num(20.0);
    let eq2 = fx.unary(p2, b);

    let code = fx.compile(&[eq1, eq2]);

    let UCase::Case(case) = fx.cases.get(code) else { panic!("expected a dispatch") };
    assert_eq!(case.level, 0);
    assert_eq!(case.path.dirs(), &[Dir::Unroll, Dir::Right]);
    let LCase::Numeric { limbs } = &case.cases else { panic!("expected numeric limbs") };
    let UCase::Success { body, size } = fx.cases.get(limbs[NUM_EQUAL]) else {
        panic!("expected success on the equal limb")
    };
    assert_eq!(*size, 1);
    assert!(matches!(fx.exprs.get(*body), Expr::Num(n) if *n == 10.0));
    // The two other limbs share one success node for "b".
    assert_eq!(limbs[NUM_LESS], limbs[NUM_GREATER]);
    assert!(matches!(fx.cases.get(limbs[NUM_LESS]), UCase::Success { size: 0, .. }));
    fx.assert_ref_integrity(code);
}

#[test]
fn a_more_specific_equation_displaces_a_success() {
    // --- f x <= 1;  --- f 0 <= 2;
    let mut fx = Fixture::new();
    let x = fx.var("x");
    let one = fx.exprs.num(1.0);
    let eq1 = fx.unary(x, one);
    let zero = fx.exprs.num(0.0);
    let two = fx.exprs.num(2.0);
    let eq2 = fx.unary(zero, two);

    let code = fx.compile(&[eq1, eq2]);
    let UCase::Case(case) = fx.cases.get(code) else { panic!("expected a dispatch") };
    let LCase::Numeric { limbs } = &case.cases else { panic!("expected numeric limbs") };
    assert!(matches!(fx.cases.get(limbs[NUM_EQUAL]), UCase::Success { size: 1, .. }));
    assert!(matches!(fx.cases.get(limbs[NUM_GREATER]), UCase::Success { size: 0, .. }));
    fx.assert_ref_integrity(code);
}

#[test]
fn equal_positions_follow_the_selected_limb() {
    // --- f 0 <= 1;  --- f 1 <= 2;
    let mut fx = Fixture::new();
    let zero = fx.exprs.num(0.0);
    let r1 = fx.exprs.num(1.0);
    let eq1 = fx.unary(zero, r1);
    let one = fx.exprs.num(1.0);
    let r2 = fx.exprs.num(2.0);
    let eq2 = fx.unary(one, r2);

    let code = fx.compile(&[eq1, eq2]);
    let UCase::Case(case) = fx.cases.get(code) else { panic!("expected a dispatch") };
    assert!(case.path.is_empty());
    let LCase::Numeric { limbs } = &case.cases else { panic!("expected numeric limbs") };
    assert!(matches!(fx.cases.get(limbs[NUM_EQUAL]), UCase::Success { .. }));
    let UCase::Case(deeper) = fx.cases.get(limbs[NUM_GREATER]) else {
        panic!("expected a nested dispatch for the 1 pattern")
    };
    assert_eq!(deeper.path.dirs(), &[Dir::Pred]);
    let LCase::Numeric { limbs: inner } = &deeper.cases else { panic!("expected numeric limbs") };
    assert!(matches!(fx.cases.get(inner[NUM_EQUAL]), UCase::Success { .. }));
    fx.assert_ref_integrity(code);
}

#[test]
fn algebraic_dispatch_uses_constructor_indices() {
    // --- f red <= 1;  --- f green <= 2;
    let mut fx = Fixture::new().with_colour();
    let red = fx.var("red");
    let green = fx.var("green");
    // Resolution would rewrite these; do it by hand here.
    let red_cons = fx.env.cons_lookup(fx.pool.intern("red")).unwrap();
    let green_cons = fx.env.cons_lookup(fx.pool.intern("green")).unwrap();
    fx.exprs.set(red, Expr::Cons(red_cons));
    fx.exprs.set(green, Expr::Cons(green_cons));
    let r1 = fx.exprs.num(1.0);
    let r2 = fx.exprs.num(2.0);
    let eq1 = fx.unary(red, r1);
    let eq2 = fx.unary(green, r2);

    let code = fx.compile(&[eq1, eq2]);
    let UCase::Case(case) = fx.cases.get(code) else { panic!("expected a dispatch") };
    let LCase::Algebraic { limbs } = &case.cases else { panic!("expected algebraic limbs") };
    assert_eq!(limbs.len(), 2);
    assert!(matches!(fx.cases.get(limbs[0]), UCase::Success { .. }));
    assert!(matches!(fx.cases.get(limbs[1]), UCase::Success { .. }));
    fx.assert_ref_integrity(code);
}

#[test]
fn later_positions_duplicate_into_every_limb() {
    // --- f x 0 <= 1;  --- f 0 y <= 2;
    // The first equation tests argument 2 (level 0); the second tests
    // argument 1 (level 1), which merges into every limb.
    let mut fx = Fixture::new();
    let x = fx.var("x");
    let z1 = fx.exprs.num(0.0);
    let r1 = fx.exprs.num(1.0);
    let eq1 = Branch { formals: vec![Formal::new(x), Formal::new(z1)], body: r1 };
    let z2 = fx.exprs.num(0.0);
    let y = fx.var("y");
    let r2 = fx.exprs.num(2.0);
    let eq2 = Branch { formals: vec![Formal::new(z2), Formal::new(y)], body: r2 };

    let code = fx.compile(&[eq1, eq2]);
    let UCase::Case(case) = fx.cases.get(code) else { panic!("expected a dispatch") };
    assert_eq!(case.level, 0);
    let LCase::Numeric { limbs } = case.cases.clone() else { panic!("expected numeric limbs") };
    // The first equation keeps its success on the equal limb (source
    // order breaks the specificity tie); the side branches now dispatch
    // on the level-1 argument.
    assert!(matches!(fx.cases.get(limbs[NUM_EQUAL]), UCase::Success { .. }));
    for limb in [limbs[NUM_LESS], limbs[NUM_GREATER]] {
        let UCase::Case(inner) = fx.cases.get(limb) else {
            panic!("expected a nested dispatch")
        };
        assert_eq!(inner.level, 1);
    }
    fx.assert_ref_integrity(code);
}
