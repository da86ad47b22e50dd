//! End-to-end interpreter scenarios, run through a full session over the
//! embedded standard environment.

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use hope_runtime::{Options, ReadSource, Session};
use hope_source::Reporter;

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Vec<u8>>>);

impl Shared {
    fn text(&self) -> String { String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned() }
}

impl Write for Shared {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

/// Runs a source text to completion; returns (stdout, stderr, exit code).
fn run(source: &str) -> (String, String, i32) {
    let out = Shared::default();
    let err = Shared::default();
    let reporter = Reporter::to_sink(Box::new(err.clone()), false);
    let options = Options { argv: vec!["hope".to_string()], ..Options::default() };
    let mut session = Session::new(options, Box::new(out.clone()), reporter);
    let code = session.run(
        Box::new(ReadSource(Cursor::new(source.to_string()))),
        false,
    );
    (out.text(), err.text(), code)
}

fn expect_clean(source: &str) -> String {
    let (out, err, code) = run(source);
    assert_eq!(code, 0, "exit code; stderr: {err}");
    assert!(err.is_empty(), "unexpected diagnostics: {err}\nstdout: {out}");
    out
}

#[test]
fn factorial_evaluates() {
    let out = expect_clean(
        "dec fact : num -> num;\n\
         --- fact 0 <= 1;\n\
         --- fact (n+1) <= (n+1) * fact n;\n\
         fact 5;\n",
    );
    assert!(out.contains(">> 120 : num"), "got: {out}");
}

#[test]
fn map_over_a_list_literal() {
    let out = expect_clean("map (lambda x => x * x) [1, 2, 3, 4];\n");
    assert!(out.contains(">> [1, 4, 9, 16] : list num"), "got: {out}");
}

#[test]
fn string_round_trip() {
    let out = expect_clean("num2str (str2num \"3.14\");\n");
    assert!(out.contains(">> \"3.14\" : list char"), "got: {out}");
}

#[test]
fn lazy_infinite_list_terminates() {
    let out = expect_clean("letrec ones == 1 :: ones in head (tail ones);\n");
    assert!(out.contains(">> 1 : num"), "got: {out}");
}

#[test]
fn merged_equations_choose_by_specificity() {
    let source = "dec f : num # num -> list char;\n\
                  --- f (x, 0) <= \"a\";\n\
                  --- f (x, y) <= \"b\";\n\
                  f (5, 0);\n\
                  f (5, 1);\n";
    let out = expect_clean(source);
    let first = out.find(">> \"a\" : list char").expect("specific equation fires");
    let second = out.find(">> \"b\" : list char").expect("default equation fires");
    assert!(first < second);
}

#[test]
fn type_error_names_both_types() {
    let (_, err, code) = run("true + 1;\n");
    assert_eq!(code, 0);
    assert!(err.contains("type error"), "got: {err}");
    assert!(err.contains("bool"), "got: {err}");
    assert!(err.contains("num"), "got: {err}");
}

#[test]
fn match_failure_reports_the_call() {
    let source = "dec g : num -> num;\n\
                  --- g 0 <= 1;\n\
                  g 5;\n";
    let (_, err, code) = run(source);
    assert_eq!(code, 0);
    assert!(err.contains("run-time error"), "got: {err}");
    assert!(err.contains("'g': no matching equation"), "got: {err}");
    assert!(err.contains("g 5"), "got: {err}");
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let (_, err, _) = run("1 / 0;\n");
    assert!(err.contains("attempt to divide by zero"), "got: {err}");
}

#[test]
fn structural_comparison_and_booleans() {
    let out = expect_clean("3 < 4;\n(1, 2) = (1, 2);\n(1, 2) = (1, 3);\n\"ab\" < \"b\";\n");
    assert!(out.contains(">> true : bool"), "got: {out}");
    let trues = out.matches(">> true : bool").count();
    let falses = out.matches(">> false : bool").count();
    assert_eq!(trues, 3, "got: {out}");
    assert_eq!(falses, 1, "got: {out}");
}

#[test]
fn comparing_functions_is_rejected() {
    let (_, err, _) = run("dec k : num -> num;\n--- k x <= x;\nk = k;\n");
    assert!(err.contains("cannot compare functions"), "got: {err}");
    assert!(err.contains("'k'"), "got: {err}");
}

#[test]
fn conditionals_and_where() {
    let out = expect_clean("if 1 < 2 then 10 else 20;\ny * y where y == 6;\n");
    assert!(out.contains(">> 10 : num"), "got: {out}");
    assert!(out.contains(">> 36 : num"), "got: {out}");
}

#[test]
fn sections_and_partial_application() {
    let out = expect_clean("map (2 *) [1, 2, 3];\nmap (* 2) [3, 4];\n");
    assert!(out.contains(">> [2, 4, 6] : list num"), "got: {out}");
    assert!(out.contains(">> [6, 8] : list num"), "got: {out}");
}

#[test]
fn user_errors_surface() {
    let (_, err, _) = run("error \"boom\";\n");
    assert!(err.contains("user error"), "got: {err}");
    assert!(err.contains("boom"), "got: {err}");
}

#[test]
fn undefined_variables_are_semantic_errors() {
    let (_, err, code) = run("frobnicate 1;\n");
    assert_eq!(code, 0);
    assert!(err.contains("semantic error"), "got: {err}");
    assert!(err.contains("frobnicate"), "got: {err}");
}

#[test]
fn user_data_types_print_with_their_constructors() {
    let source = "data tree == leaf ++ node (tree # num # tree);\n\
                  node (leaf, 3, leaf);\n";
    let out = expect_clean(source);
    assert!(out.contains(">> node (leaf, 3, leaf) : tree"), "got: {out}");
}

#[test]
fn display_lists_declarations() {
    let source = "dec one : num;\n--- one <= 1;\ndisplay;\n";
    let out = expect_clean(source);
    assert!(out.contains("dec one : num;"), "got: {out}");
    assert!(out.contains("--- one <= 1;"), "got: {out}");
}

#[test]
fn write_streams_characters_raw() {
    let out = expect_clean("write \"ab\";\n");
    assert!(out.contains("ab"), "got: {out}");
}

#[test]
fn repeated_evaluation_is_stable() {
    let source = "dec fib : num -> num;\n\
                  --- fib 0 <= 0;\n\
                  --- fib 1 <= 1;\n\
                  --- fib (n+2) <= fib (n+1) + fib n;\n\
                  fib 10;\n\
                  fib 10;\n";
    let out = expect_clean(source);
    assert_eq!(out.matches(">> 55 : num").count(), 2, "got: {out}");
}

#[test]
fn pattern_match_on_user_synonym() {
    let source = "type pair2 == num # num;\n\
                  dec swap : pair2 -> pair2;\n\
                  --- swap (x, y) <= (y, x);\n\
                  swap (1, 2);\n";
    let out = expect_clean(source);
    assert!(out.contains(">> 2, 1 : "), "got: {out}");
}

#[test]
fn equirecursive_synonyms_type_infinite_structures() {
    let source = "type stream == mu s => num # s;\n\
                  dec hd : stream -> num;\n\
                  --- hd (x, rest) <= x;\n\
                  dec from : num -> stream;\n\
                  --- from n <= (n, from (n+1));\n\
                  hd (from 7);\n";
    let out = expect_clean(source);
    assert!(out.contains(">> 7 : num"), "got: {out}");
}

#[test]
fn value_level_mu_ties_a_knot() {
    let out = expect_clean("head (tail (mu l => 1 :: l));\n");
    assert!(out.contains(">> 1 : num"), "got: {out}");
}

#[test]
fn private_definitions_vanish_with_their_module() {
    let dir = std::env::temp_dir().join(format!("hope-priv-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp module dir");
    std::fs::write(
        dir.join("Hidden.hop"),
        "dec visible : num;\n\
         --- visible <= 1;\n\
         private;\n\
         dec secret : num;\n\
         --- secret <= 2;\n",
    )
    .expect("module file");

    let out = Shared::default();
    let err = Shared::default();
    let reporter = Reporter::to_sink(Box::new(err.clone()), false);
    let options = Options { path: vec![Some(dir.clone())], ..Options::default() };
    let mut session = Session::new(options, Box::new(out.clone()), reporter);
    let code = session.run(
        Box::new(ReadSource(Cursor::new(
            "uses Hidden;\nvisible;\nsecret;\n".to_string(),
        ))),
        false,
    );
    let _ = std::fs::remove_dir_all(&dir);
    assert_eq!(code, 0);
    assert!(out.text().contains(">> 1 : num"), "got: {}", out.text());
    assert!(err.text().contains("secret: undefined variable"), "got: {}", err.text());
}

#[test]
fn restricted_mode_disables_read() {
    let out = Shared::default();
    let err = Shared::default();
    let reporter = Reporter::to_sink(Box::new(err.clone()), false);
    let options = Options { restricted: true, ..Options::default() };
    let mut session = Session::new(options, Box::new(out.clone()), reporter);
    let _ = session.run(
        Box::new(ReadSource(Cursor::new("read \"somefile\";\n".to_string()))),
        false,
    );
    assert!(err.text().contains("read function disabled"), "got: {}", err.text());
}
