//! Source-unit driver: a global environment plus the evaluation limits, with
//! helpers for the bootstrap, program files and REPL input.
//!
//! Every top-level expression of a source unit is evaluated in the degraded
//! mode: a failure (reader error or evaluation error) is logged, yields a
//! recovered [`Outcome`] holding `()`, and evaluation continues with the next
//! expression. Only failing to read the source file itself is fatal.

use std::path::Path;

use tracing::{debug, warn};

use crate::Error;
use crate::ast::Value;
use crate::evaluator::{
    Environment, EvalLimits, Outcome, create_global_env, eval_recovering, eval_with_limits,
};
use crate::reader::Reader;

/// Definitions evaluated before any user program unless disabled
pub const PRELUDE: &str = include_str!("prelude.scm");

pub struct Interpreter {
    env: Environment,
    limits: EvalLimits,
    precision: Option<usize>,
}

impl Interpreter {
    /// Fresh global environment holding only the builtins
    pub fn new() -> Self {
        Self::with_limits(EvalLimits::default())
    }

    pub fn with_limits(limits: EvalLimits) -> Self {
        Interpreter {
            env: create_global_env(),
            limits,
            precision: None,
        }
    }

    /// Print numbers with `precision` fixed decimals, both in [`Self::render`]
    /// and in the `display` builtin, which is rebound in the global frame
    pub fn with_precision(self, precision: Option<usize>) -> Self {
        self.env
            .register_builtin_operation::<_, (Value,)>("display", move |value: Value| {
                println!("{}", value.render(precision));
                Value::Nil
            });
        Interpreter { precision, ..self }
    }

    /// Output text for a result, honouring the configured precision
    pub fn render(&self, value: &Value) -> String {
        value.render(self.precision)
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn limits(&self) -> &EvalLimits {
        &self.limits
    }

    /// Lazily read and evaluate `source`, one top-level expression per item
    pub fn outcomes<'a>(&'a self, source: &'a str) -> impl Iterator<Item = Outcome> + 'a {
        let mut reader = Reader::new(source);
        std::iter::from_fn(move || match reader.read() {
            Ok(Some(expr)) => Some(eval_recovering(&expr, &self.env, &self.limits)),
            Ok(None) => None,
            Err(err) => Some(Outcome::recovered(err)),
        })
    }

    /// Evaluate every expression in `source`, collecting the outcomes
    pub fn run_source(&self, source: &str) -> Vec<Outcome> {
        self.outcomes(source).collect()
    }

    /// Evaluate the embedded prelude
    pub fn load_prelude(&self) -> Vec<Outcome> {
        debug!(unit = "prelude", "loading source unit");
        self.run_source(PRELUDE)
    }

    /// Read and evaluate a source file. Only an I/O failure is an error;
    /// failures inside the file are reported through the outcomes.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Vec<Outcome>, Error> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("unable to open file {}: {e}", path.display())))?;
        debug!(unit = %path.display(), bytes = source.len(), "loading source unit");
        let outcomes = self.run_source(&source);
        let failures = outcomes.iter().filter(|o| o.is_recovered()).count();
        if failures > 0 {
            warn!(unit = %path.display(), failures, "source unit finished with errors");
        }
        Ok(outcomes)
    }

    /// Strict evaluation of every expression in `source`: stops at the first
    /// error and returns the last value otherwise. Empty input yields `()`.
    pub fn eval_str(&self, source: &str) -> Result<Value, Error> {
        let mut last = Value::Nil;
        for expr in Reader::new(source) {
            last = eval_with_limits(&expr?, &self.env, &self.limits)?;
        }
        Ok(last)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, num, val};
    use pretty_assertions::assert_eq;

    fn prelude_interpreter() -> Interpreter {
        let interp = Interpreter::new();
        let outcomes = interp.load_prelude();
        assert!(
            outcomes.iter().all(|o| !o.is_recovered()),
            "prelude failed: {outcomes:?}"
        );
        interp
    }

    #[test]
    fn test_prelude_definitions() {
        let interp = prelude_interpreter();
        let test_cases = vec![
            ("(not '())", val(true)),
            ("(not 0)", nil()),
            ("(add1 41)", val(42)),
            ("(cadr '(1 2 3))", val(2)),
            ("(caddr '(1 2 3))", val(3)),
            ("(length '())", val(0)),
            ("(length '(a b c))", val(3)),
            ("(abs (- 4))", val(4)),
            ("(abs 4)", val(4)),
            ("(append '(1 2) '(3))", val([1, 2, 3])),
            ("(map add1 '(1 2 3))", val([2, 3, 4])),
        ];
        for (src, expected) in test_cases {
            assert_eq!(interp.eval_str(src).unwrap(), expected, "{src}");
        }
    }

    #[test]
    fn test_run_source_continues_after_errors() {
        let interp = Interpreter::new();
        let outcomes = interp.run_source(
            "(define x 1)
             (car 5)
             undefined
             )
             (+ x 1)",
        );
        let values: Vec<Value> = outcomes.iter().map(|o| o.value.clone()).collect();
        let failed: Vec<bool> = outcomes.iter().map(Outcome::is_recovered).collect();
        assert_eq!(
            values,
            vec![Value::symbol("x"), nil(), nil(), nil(), val(2)]
        );
        assert_eq!(failed, vec![false, true, true, true, false]);
    }

    #[test]
    fn test_unterminated_list_ends_the_unit() {
        let interp = Interpreter::new();
        let outcomes = interp.run_source("(+ 1 2) (+ 3");
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].value, val(3));
        assert!(matches!(
            &outcomes[1].error,
            Some(Error::ParseError(pe)) if pe.kind == crate::ParseErrorKind::Incomplete
        ));
    }

    #[test]
    fn test_eval_str_stops_at_first_error() {
        let interp = Interpreter::new();
        assert_eq!(interp.eval_str("").unwrap(), nil());
        assert_eq!(interp.eval_str("1 2 3").unwrap(), val(3));
        let err = interp.eval_str("(define a 1) (car a) (define b 2)").unwrap_err();
        assert!(matches!(err, Error::TypeError(_)));
        assert!(interp.env().get("a").is_some());
        assert!(interp.env().get("b").is_none());
    }

    #[test]
    fn test_precision_applies_to_results_and_display() {
        let interp = Interpreter::new().with_precision(Some(2));
        assert_eq!(interp.render(&val(5)), "5.00");
        assert_eq!(interp.render(&val([1, 2])), "(1.00 2.00)");

        // `display` is rebound but keeps its contract
        assert!(matches!(
            interp.env().get("display"),
            Some(Value::BuiltinFunction { .. })
        ));
        assert_eq!(interp.eval_str("(display 5)").unwrap(), nil());
        assert!(interp.eval_str("(display 1 2)").is_err());

        let plain = Interpreter::new();
        assert_eq!(plain.render(&num(2.5)), "2.5");
    }

    #[test]
    fn test_load_file_missing_is_io_error() {
        let interp = Interpreter::new();
        let err = interp
            .load_file("/nonexistent/definitely/missing.scm")
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_load_file_evaluates_contents() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("miniskim-load-{}.scm", std::process::id()));
        std::fs::write(&path, "; squares\n(define sq (lambda (x) (* x x)))\n(sq 9)\n").unwrap();

        let interp = Interpreter::new();
        let outcomes = interp.load_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].value, val(81));
    }
}
