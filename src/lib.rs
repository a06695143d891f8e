//! miniskim - a minimal interpreter for a Scheme-like S-expression language
//!
//! The crate is organised around the classic eval/apply core:
//!
//! ```scheme
//! (define square (lambda (x) (* x x)))
//! (square 4)                  ; => 16
//! (if 0 (quote yes) (quote no)) ; => yes, only the empty list is false
//! ```
//!
//! ## Semantics in brief
//!
//! - There is a single numeric kind (`f64`) and no string kind: text is a symbol.
//! - The empty list `()` is the one and only false value. Truth is decided by
//!   identity with that sentinel, so `0` is true.
//! - Closures capture the environment active when `lambda` was evaluated.
//! - `set!` overwrites a shared binding slot in place, so every closure that
//!   captured the enclosing scope observes the update.
//! - There is no tail-call elimination. Recursion depth is bounded by
//!   [`MAX_EVAL_DEPTH`] (configurable per interpreter) and exceeding it yields
//!   [`Error::DepthExceeded`] rather than overflowing the native stack.
//!
//! ## Modules
//!
//! - `ast`: the value model and printer
//! - `reader`: tokenizer and parser producing values from source text
//! - `assoc`: the association tree backing a single scope frame
//! - `evaluator`: eval/apply, special forms and the environment chain
//! - `builtinops`: the registry of native operations
//! - `interpreter`: bootstrap loading and source-unit evaluation
//! - `config`: runtime settings from the environment and command line
//!
//! ## Logging
//!
//! The library logs through `tracing`. Recovered errors are reported at `warn`,
//! source-unit loading at `debug` and every special form / application at
//! `trace`. Enable with e.g. `RUST_LOG=miniskim=debug`.

/// Maximum reader nesting depth for parenthesised data
pub const MAX_PARSE_DEPTH: usize = 512;

/// Default maximum evaluation depth. Each nested `eval` consumes one level, so a
/// non-tail recursive procedure uses a small constant number of levels per call.
/// The evaluator grows its native stack as needed, so this holds on any thread.
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Categorizes the different kinds of reader errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (stray `)`, malformed numeral)
    InvalidSyntax,
    /// Input ended before the expression was complete (unclosed parens)
    Incomplete,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Extra input found after a complete expression where exactly one was expected
    TrailingContent,
}

/// A structured error providing detailed information about a reader failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 60 chars)
    pub context: Option<String>,
    /// The problematic token, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with a context snippet around `error_offset` (a byte offset)
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 60;

        let mut start = error_offset.saturating_sub(20).min(input.len());
        while !input.is_char_boundary(start) {
            start -= 1;
        }
        let snippet: String = input[start..].chars().take(MAX_CONTEXT).collect();

        let mut context = String::new();
        if start > 0 {
            context.push_str("[...]");
        }
        context.push_str(&snippet);
        if start + snippet.len() < input.len() {
            context.push_str("[...]");
        }
        let context = context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(context), found)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    ParseError(ParseError),
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    #[error("Unknown function: {0}")]
    UnknownOperator(String),
    #[error("Cannot apply non-procedure: {0}")]
    NotApplicable(String),
    #[error("Malformed lambda: {0}")]
    MalformedLambda(String),
    #[error("Malformed {form}: {message}")]
    MalformedSpecialForm { form: &'static str, message: String },
    #[error("Not a valid expression: {0}")]
    BadForm(String),
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("{}", arity_message(.expected, .got, .expression))]
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>,
    },
    #[error("Evaluation depth limit exceeded (max: {0})")]
    DepthExceeded(usize),
    #[error("EvaluationError: {0}")]
    EvalError(String),
    #[error("I/O error: {0}")]
    Io(String),
}

fn arity_message(expected: &usize, got: &usize, expression: &Option<String>) -> String {
    match expression {
        Some(expr) => {
            format!("ArityError: expression {expr}: expected {expected} arguments, got {got}")
        }
        None => format!("ArityError: procedure expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    pub(crate) fn malformed(form: &'static str, message: impl Into<String>) -> Self {
        Error::MalformedSpecialForm {
            form,
            message: message.into(),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::ParseError(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

pub mod assoc;
pub mod ast;
pub mod builtinops;
pub mod config;
pub mod evaluator;
pub mod interpreter;
pub mod reader;
mod stack;

pub use ast::Value;
pub use evaluator::{Environment, EvalLimits, Outcome, eval};
pub use interpreter::Interpreter;
