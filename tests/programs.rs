//! End-to-end behaviour of whole programs evaluated through `Interpreter`.

#![expect(clippy::unwrap_used)] // test code OK

use miniskim::ast::Value;
use miniskim::reader::parse_expr;
use miniskim::{Error, EvalLimits, Interpreter, MAX_EVAL_DEPTH};
use pretty_assertions::assert_eq;

fn num(n: f64) -> Value {
    Value::Number(n)
}

fn run(interp: &Interpreter, src: &str) -> Value {
    match interp.eval_str(src) {
        Ok(v) => v,
        Err(e) => panic!("'{src}' failed: {e}"),
    }
}

fn with_prelude() -> Interpreter {
    let interp = Interpreter::new();
    assert!(interp.load_prelude().iter().all(|o| !o.is_recovered()));
    interp
}

#[test]
fn evaluation_is_deterministic() {
    let program = "
        (define fib (lambda (n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))))
        (list (fib 10) (map fib '(1 2 3 4 5)))";
    let first = run(&with_prelude(), program);
    for _ in 0..3 {
        assert_eq!(run(&with_prelude(), program), first);
    }
    assert_eq!(first.to_string(), "(55 (1 1 2 3 5))");
}

#[test]
fn number_text_round_trips() {
    for text in ["0", "5", "42", "2.5", "0.125", "3.14159", "1000000", "0.1"] {
        let parsed = parse_expr(text).unwrap();
        let expected: f64 = text.parse().unwrap();
        assert_eq!(parsed, num(expected), "{text}");
        let reparsed = parse_expr(&parsed.to_string()).unwrap();
        assert_eq!(reparsed, parsed, "{text}");
    }
}

#[test]
fn define_then_lookup() {
    let interp = Interpreter::new();
    assert_eq!(run(&interp, "(define x 5)"), Value::symbol("x"));
    assert_eq!(run(&interp, "x"), num(5.0));
}

#[test]
fn lambda_application() {
    let interp = Interpreter::new();
    assert_eq!(run(&interp, "((lambda (x) (+ x 1)) 4)"), num(5.0));
}

#[test]
fn closures_resolve_free_variables_lexically() {
    let interp = Interpreter::new();
    run(
        &interp,
        "(define make-adder (lambda (n) (lambda (x) (+ x n))))
         (define add5 (make-adder 5))",
    );
    // A different `n` in the global frame and at the call site
    run(&interp, "(define n 100)");
    assert_eq!(run(&interp, "(add5 1)"), num(6.0));
    assert_eq!(run(&interp, "((lambda (n) (add5 1)) 1000)"), num(6.0));
}

#[test]
fn set_is_visible_through_captured_scope() {
    let interp = Interpreter::new();
    run(
        &interp,
        "(define x 1)
         (define get-x (lambda () x))",
    );
    assert_eq!(run(&interp, "(set! x 2)"), num(2.0));
    assert_eq!(run(&interp, "(get-x)"), num(2.0));
    assert_eq!(run(&interp, "x"), num(2.0));
}

#[test]
fn set_inside_closure_updates_outer_scope() {
    let interp = Interpreter::new();
    run(
        &interp,
        "(define total 0)
         (define bump (lambda (k) (set! total (+ total k))))
         (bump 3)
         (bump 4)",
    );
    assert_eq!(run(&interp, "total"), num(7.0));
}

#[test]
fn zero_is_true_only_empty_list_is_false() {
    let interp = Interpreter::new();
    assert_eq!(run(&interp, "(if 0 \"a\" \"b\")"), Value::symbol("\"a\""));
    assert_eq!(run(&interp, "(if '() \"a\" \"b\")"), Value::symbol("\"b\""));
    assert_eq!(run(&interp, "(if (zero? 0) 'yes 'no)"), Value::symbol("yes"));
    assert_eq!(run(&interp, "(if (zero? 1) 'yes 'no)"), Value::symbol("no"));
}

#[test]
fn pair_primitives() {
    let interp = Interpreter::new();
    assert_eq!(run(&interp, "(car (cons 1 2))"), num(1.0));
    assert_eq!(run(&interp, "(cdr (cons 1 2))"), num(2.0));
    assert_eq!(run(&interp, "(null? '())"), Value::True);
    assert_eq!(run(&interp, "(pair? (cons 1 2))"), Value::True);
    assert_eq!(run(&interp, "(pair? '())"), Value::Nil);
}

#[test]
fn redefinition_in_same_frame_overwrites() {
    let interp = Interpreter::new();
    run(
        &interp,
        "(define v 1)
         (define read-v (lambda () v))
         (define v 2)",
    );
    assert_eq!(run(&interp, "v"), num(2.0));
    // The closure shares the overwritten slot
    assert_eq!(run(&interp, "(read-v)"), num(2.0));
    let count = interp
        .env()
        .get_all_bindings()
        .iter()
        .filter(|(name, _)| name == "v")
        .count();
    assert_eq!(count, 1);
}

#[test]
fn redefinition_in_call_frame_does_not_touch_global() {
    let interp = Interpreter::new();
    run(
        &interp,
        "(define w 1)
         (define f (lambda (w) (begin (define w 10) w)))",
    );
    assert_eq!(run(&interp, "(f 5)"), num(10.0));
    assert_eq!(run(&interp, "w"), num(1.0));
}

#[test]
fn deep_recursion_reports_depth_exhaustion() {
    // Default limits on a plain spawned thread, which starts with a 2MB stack
    std::thread::spawn(|| {
        let interp = Interpreter::new();
        run(
            &interp,
            "(define tri (lambda (n) (if (zero? n) 0 (+ n (tri (sub1 n))))))",
        );
        assert_eq!(run(&interp, "(tri 100)"), num(5050.0));

        let err = interp.eval_str("(tri 100000)").unwrap_err();
        assert_eq!(err, Error::DepthExceeded(MAX_EVAL_DEPTH));

        // State is intact after the failure
        assert_eq!(run(&interp, "(tri 10)"), num(55.0));
    })
    .join()
    .unwrap();
}

#[test]
fn lowered_depth_limit_is_honoured() {
    let interp = Interpreter::with_limits(EvalLimits { max_depth: 300 });
    run(
        &interp,
        "(define tri (lambda (n) (if (zero? n) 0 (+ n (tri (sub1 n))))))",
    );
    let outcomes = interp.run_source("(tri 1000) (tri 5)");
    assert_eq!(outcomes[0].error, Some(Error::DepthExceeded(300)));
    assert_eq!(outcomes[1].value, num(15.0));
}

#[test]
fn source_units_recover_and_continue() {
    let interp = Interpreter::new();
    let outcomes = interp.run_source(
        "(define a 1)
         (undefined-fn a)
         (set! a (+ a 1))
         a",
    );
    assert_eq!(outcomes.len(), 4);
    assert!(matches!(
        outcomes[1].error,
        Some(Error::UnknownOperator(ref name)) if name == "undefined-fn"
    ));
    assert_eq!(outcomes[1].value, Value::Nil);
    assert_eq!(outcomes[3].value, num(2.0));
}

#[test]
fn comments_and_quote_shorthand() {
    let interp = with_prelude();
    let value = run(
        &interp,
        "; leading comment
         (define xs '(1 2 3)) ; trailing comment
         (length xs)",
    );
    assert_eq!(value, num(3.0));
}
