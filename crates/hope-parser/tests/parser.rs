//! Parser integration tests with a small fixed operator table.

use hope_ast::{Assoc, Expr, ExprArena, ExprId, Interner, Name, Op, OpResolver, SugarKind};
use hope_parser::{lex_line, Item, Parser, Token};

#[derive(Default)]
struct TestOps {
    table: Vec<Op>,
}

impl TestOps {
    fn declare(&mut self, pool: &mut Interner, name: &str, prec: i32, assoc: Assoc) {
        let name = pool.intern(name);
        self.table.push(Op::new(name, prec, assoc));
    }
}

impl OpResolver for TestOps {
    fn op_lookup(&self, name: Name) -> Option<Op> {
        self.table.iter().find(|op| op.name == name).copied()
    }
}

struct Fixture {
    pool: Interner,
    ops: TestOps,
    arena: ExprArena,
}

impl Fixture {
    fn new() -> Self {
        let mut pool = Interner::new();
        let mut ops = TestOps::default();
        ops.declare(&mut pool, "->", 1, Assoc::Right);
        ops.declare(&mut pool, "#", 2, Assoc::Right);
        ops.declare(&mut pool, "::", 4, Assoc::Right);
        ops.declare(&mut pool, "+", 5, Assoc::Left);
        ops.declare(&mut pool, "-", 5, Assoc::Left);
        ops.declare(&mut pool, "*", 6, Assoc::Left);
        Self { pool, ops, arena: ExprArena::new() }
    }

    fn tokens(line: &str) -> Vec<Token> {
        lex_line(line).into_iter().collect::<Result<_, _>>().expect("clean lex")
    }

    fn parse(&mut self, line: &str) -> Item {
        let tokens = Self::tokens(line);
        let mut parser = Parser::new(&tokens, &mut self.pool, &mut self.arena, &self.ops, None);
        parser.parse_item().expect("parse")
    }

    fn name_of(&self, id: ExprId) -> &str {
        match self.arena.get(id) {
            Expr::Var(var) => self.pool.text(var.name),
            other => panic!("expected a variable, got {other:?}"),
        }
    }
}

#[test]
fn equation_item_has_spine_lhs() {
    let mut fx = Fixture::new();
    let Item::Def { lhs, .. } = fx.parse("--- fact 0 <= 1;") else { panic!("expected def") };
    let Expr::Apply(func, arg) = fx.arena.get(lhs) else { panic!("expected apply") };
    assert_eq!(fx.name_of(*func), "fact");
    assert!(matches!(fx.arena.get(*arg), Expr::Num(n) if *n == 0.0));
}

#[test]
fn operators_apply_the_named_function_to_a_pair() {
    let mut fx = Fixture::new();
    let Item::Eval(root) = fx.parse("1 + 2 * 3;") else { panic!("expected eval") };
    let Expr::Apply(plus, arg) = fx.arena.get(root) else { panic!("expected apply") };
    assert_eq!(fx.name_of(*plus), "+");
    let Expr::Pair(one, product) = fx.arena.get(*arg) else { panic!("expected pair") };
    assert!(matches!(fx.arena.get(*one), Expr::Num(n) if *n == 1.0));
    let Expr::Apply(times, _) = fx.arena.get(*product) else { panic!("expected apply") };
    assert_eq!(fx.name_of(*times), "*");
}

#[test]
fn left_associativity_nests_leftward() {
    let mut fx = Fixture::new();
    let Item::Eval(root) = fx.parse("1 - 2 - 3;") else { panic!("expected eval") };
    // ((1 - 2) - 3): the left operand of the outer '-' is itself an apply.
    let Expr::Apply(_, arg) = fx.arena.get(root) else { panic!("expected apply") };
    let Expr::Pair(left, right) = fx.arena.get(*arg) else { panic!("expected pair") };
    assert!(matches!(fx.arena.get(*left), Expr::Apply(..)));
    assert!(matches!(fx.arena.get(*right), Expr::Num(n) if *n == 3.0));
}

#[test]
fn if_parses_to_sugared_spine() {
    let mut fx = Fixture::new();
    let Item::Eval(root) = fx.parse("if x then 1 else 2;") else { panic!("expected eval") };
    assert!(matches!(fx.arena.get(root), Expr::Sugar(SugarKind::If, ..)));
}

#[test]
fn let_and_where_desugar_to_equations() {
    let mut fx = Fixture::new();
    let Item::Eval(root) = fx.parse("let x == 1 in x;") else { panic!("expected eval") };
    let Expr::Sugar(SugarKind::Let, eqn, bound) = fx.arena.get(root) else {
        panic!("expected let sugar")
    };
    assert!(matches!(fx.arena.get(*eqn), Expr::Lambda(..)));
    assert!(matches!(fx.arena.get(*bound), Expr::Num(n) if *n == 1.0));

    let Item::Eval(root) = fx.parse("x where x == 2;") else { panic!("expected eval") };
    assert!(matches!(fx.arena.get(root), Expr::Sugar(SugarKind::Where, ..)));
}

#[test]
fn lambda_alternatives_share_one_node() {
    let mut fx = Fixture::new();
    let Item::Eval(root) = fx.parse("lambda x y => x | u v => v;") else { panic!("expected eval") };
    let Expr::Lambda(lambda) = fx.arena.get(root) else { panic!("expected lambda") };
    assert_eq!(lambda.branches.len(), 2);
    assert_eq!(lambda.arity, 2);
}

#[test]
fn sections_build_single_branch_lambdas() {
    let mut fx = Fixture::new();
    let Item::Eval(root) = fx.parse("(1 +);") else { panic!("expected eval") };
    let Expr::Lambda(lambda) = fx.arena.get(root) else { panic!("expected section") };
    assert_eq!(lambda.kind, hope_ast::LambdaKind::Presect);

    let Item::Eval(root) = fx.parse("(+ 1);") else { panic!("expected eval") };
    let Expr::Lambda(lambda) = fx.arena.get(root) else { panic!("expected section") };
    assert_eq!(lambda.kind, hope_ast::LambdaKind::Postsect);

    let Item::Eval(root) = fx.parse("(+);") else { panic!("expected eval") };
    assert!(matches!(fx.arena.get(root), Expr::Var(_)));
}

#[test]
fn declarations_parse() {
    let mut fx = Fixture::new();
    let Item::Dec { ty, .. } = fx.parse("dec fact : num -> num;") else { panic!("expected dec") };
    let hope_ast::TypeExpr::Apply { tupled, args, .. } = ty else { panic!("expected arrow") };
    assert!(tupled);
    assert_eq!(args.len(), 2);

    let Item::Data { header, alts } = fx.parse("data list alpha == nil ++ alpha :: list alpha;")
    else {
        panic!("expected data")
    };
    assert_eq!(fx.pool.text(header.name), "list");
    assert_eq!(alts.len(), 2);
    assert_eq!(fx.pool.text(alts[1].name), "::");
    assert!(alts[1].tupled);
    assert_eq!(alts[1].args.len(), 2);
}

#[test]
fn infix_type_header_parses() {
    let mut fx = Fixture::new();
    let Item::Abstype(headers) = fx.parse("abstype alpha # beta;") else {
        panic!("expected abstype")
    };
    assert_eq!(headers.len(), 1);
    assert_eq!(fx.pool.text(headers[0].name), "#");
    assert!(headers[0].tupled);
    assert_eq!(headers[0].params.len(), 2);
}

#[test]
fn write_and_commands_parse() {
    let mut fx = Fixture::new();
    assert!(matches!(fx.parse("display;"), Item::Display));
    assert!(matches!(fx.parse("exit;"), Item::Exit));
    assert!(matches!(fx.parse("uses numerals;"), Item::Uses(names) if names.len() == 1));
    let Item::Write { file, .. } = fx.parse("write 1 to \"out\";") else { panic!("expected write") };
    assert_eq!(file.as_deref(), Some(b"out".as_slice()));
}

#[test]
fn syntax_errors_name_the_offending_token() {
    let mut fx = Fixture::new();
    let tokens = Fixture::tokens("let x 1;");
    let mut parser = Parser::new(&tokens, &mut fx.pool, &mut fx.arena, &fx.ops, None);
    let err = parser.parse_item().expect_err("should fail");
    assert!(err.to_string().contains("syntax error"));
}
