//! Name-resolution rewrites: pattern variables, constructor recognition,
//! `n+k` patterns and scope levels.

use hope_analyzer::defs::{Cons, DefType, Func, TypeBody};
use hope_analyzer::{ModuleEnv, Resolver};
use hope_ast::{Branch, Expr, ExprArena, Formal, Interner, QType, Type};

struct Fixture {
    pool: Interner,
    env: ModuleEnv,
    exprs: ExprArena,
}

impl Fixture {
    fn new() -> Self {
        let mut pool = Interner::new();
        let session = pool.intern("<Session>");
        Self { pool, env: ModuleEnv::new(session), exprs: ExprArena::new() }
    }

    /// `data colour == red ++ green;` installed directly.
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

    fn with_function(mut self, name: &str) -> Self {
        let name = self.pool.intern(name);
        let qtype = QType { ty: Type::var(self.pool.intern("a"), 0), ntvars: 1 };
        let _ = self.env.add_func(Func::declared(name, qtype));
        self
    }

    fn var(&mut self, name: &str) -> hope_ast::ExprId {
        let name = self.pool.intern(name);
        self.exprs.var(name)
    }
}

#[test]
fn pattern_variables_become_param_references() {
    let mut fx = Fixture::new();
    let x = fx.var("x");
    let y = fx.var("y");
    let pattern = fx.exprs.pair(x, y);
    let use_x = fx.var("x");
    let use_y = fx.var("y");
    let body = fx.exprs.pair(use_y, use_x);
    let mut branch = Branch { formals: vec![Formal::new(pattern)], body };

    Resolver::new(&mut fx.exprs, &fx.env, &fx.pool).resolve_branch(&mut branch).expect("resolves");
    assert_eq!(branch.formals[0].nvars, 2);
    let Expr::Param(px) = fx.exprs.get(use_x) else { panic!("x must resolve to a parameter") };
    assert_eq!(px.level, 0);
    assert_eq!(px.patt, x);
    // x was bound at the pair's left, reached through an unrolling
    // projection.
    assert_eq!(px.path.dirs(), &[hope_ast::Dir::Unroll, hope_ast::Dir::Left]);
    assert!(matches!(fx.exprs.get(use_y), Expr::Param(_)));
}

#[test]
fn nullary_constructors_shed_their_variable_disguise() {
    let mut fx = Fixture::new().with_colour();
    let red_pat = fx.var("red");
    let body = fx.var("red");
    let mut branch = Branch { formals: vec![Formal::new(red_pat)], body };
    Resolver::new(&mut fx.exprs, &fx.env, &fx.pool).resolve_branch(&mut branch).expect("resolves");
    assert!(matches!(fx.exprs.get(red_pat), Expr::Cons(_)));
    assert!(matches!(fx.exprs.get(body), Expr::Cons(_)));
    assert_eq!(branch.formals[0].nvars, 0);
}

#[test]
fn plus_patterns_are_rewritten() {
    let mut fx = Fixture::new();
    // The pattern (n + 2), as parsed: apply of '+' to the pair (n, 2).
    let plus = fx.var("+");
    let n = fx.var("n");
    let two = fx.exprs.num(2.0);
    let arg = fx.exprs.pair(n, two);
    let pattern = fx.exprs.apply(plus, arg);
    let body = fx.var("n");
    let mut branch = Branch { formals: vec![Formal::new(pattern)], body };
    Resolver::new(&mut fx.exprs, &fx.env, &fx.pool).resolve_branch(&mut branch).expect("resolves");
    let Expr::Plus(rewritten) = fx.exprs.get(pattern) else { panic!("expected a plus pattern") };
    assert_eq!(rewritten.incr, 2);
    let Expr::Param(p) = fx.exprs.get(body) else { panic!("body n must resolve") };
    assert_eq!(p.path.dirs(), &[hope_ast::Dir::Pred, hope_ast::Dir::Pred]);
}

#[test]
fn unbound_names_fall_through_to_functions_then_fail() {
    let mut fx = Fixture::new().with_function("known");
    let x = fx.var("x");
    let body = fx.var("known");
    let mut branch = Branch { formals: vec![Formal::new(x)], body };
    Resolver::new(&mut fx.exprs, &fx.env, &fx.pool).resolve_branch(&mut branch).expect("resolves");
    assert!(matches!(fx.exprs.get(body), Expr::Defun(_)));

    let x2 = fx.var("x");
    let missing = fx.var("missing");
    let mut bad = Branch { formals: vec![Formal::new(x2)], body: missing };
    let err = Resolver::new(&mut fx.exprs, &fx.env, &fx.pool)
        .resolve_branch(&mut bad)
        .expect_err("must fail");
    assert!(err.message.contains("undefined variable"));
}

#[test]
fn repeated_pattern_variables_are_rejected() {
    let mut fx = Fixture::new();
    let x1 = fx.var("x");
    let x2 = fx.var("x");
    let pattern = fx.exprs.pair(x1, x2);
    let body = fx.exprs.num(0.0);
    let mut branch = Branch { formals: vec![Formal::new(pattern)], body };
    let err = Resolver::new(&mut fx.exprs, &fx.env, &fx.pool)
        .resolve_branch(&mut branch)
        .expect_err("must fail");
    assert!(err.message.contains("occurs twice"));
}

#[test]
fn scope_levels_count_from_the_innermost_binding() {
    // Two formals: f x; a reference to f in the body is one scope out.
    let mut fx = Fixture::new();
    let f = fx.var("f");
    let x = fx.var("x");
    let use_f = fx.var("f");
    let use_x = fx.var("x");
    let body = fx.exprs.apply(use_f, use_x);
    let mut branch = Branch { formals: vec![Formal::new(f), Formal::new(x)], body };
    Resolver::new(&mut fx.exprs, &fx.env, &fx.pool).resolve_branch(&mut branch).expect("resolves");
    let Expr::Param(pf) = fx.exprs.get(use_f) else { panic!("f resolves") };
    let Expr::Param(px) = fx.exprs.get(use_x) else { panic!("x resolves") };
    assert_eq!(pf.level, 1, "first argument is one scope out");
    assert_eq!(px.level, 0, "last argument is the innermost scope");
}
