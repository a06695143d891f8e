//! Built-in operations registry.
//!
//! Every native procedure the interpreter starts with is listed once in
//! [`BUILTIN_OPS`] and bound into the outermost frame by
//! [`crate::evaluator::create_global_env`]:
//!
//! ```scheme
//! (car (quote (1 2)))   ; => 1
//! (+ 1 2 3)             ; => 6
//! (zero? 0)             ; => #t
//! (null? 0)             ; => ()
//! ```
//!
//! ## Functions vs Special Forms
//!
//! Builtins are ordinary procedures: their arguments are evaluated left to
//! right before the call. `define`, `set!`, `if`, `quote` and `lambda` control
//! evaluation of their operands and are handled by the evaluator, not here.
//!
//! ## Conventions
//!
//! - Predicates return `#t` or `()`. There is no separate false value.
//! - Numeric operations reject non-numbers with a `TypeError`; nothing is coerced.
//! - `car` and `cdr` of `()` return `()`, mirroring the self-referential
//!   empty-list sentinel.
//! - `-` and `/` fold left. With one argument they negate and take the
//!   reciprocal respectively.
//!
//! ## Adding New Operations
//!
//! 1. Write a plain Rust function using `f64`, `Value`, `NumIter` or `ValueIter`
//!    parameters and returning anything `Into<Value>` or a `Result` of one
//! 2. Add a `BuiltinOp` entry to `BUILTIN_OPS` with its identifier and arity
//! 3. Add table-driven tests below

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::evaluator::intooperation::{
    IntoOperation, IntoVariadicOperation, NumIter, OperationFn, ValueIter,
};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, LazyLock};

/// Argument count accepted by a builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(n) if got != n => Err(Error::arity_error(n, got)),
            Arity::AtLeast(min) if got < min => Err(Error::arity_error(min, got)),
            _ => Ok(()),
        }
    }
}

/// Definition of a built-in operation
#[derive(Clone)]
pub struct BuiltinOp {
    /// The identifier bound in the global frame
    pub id: &'static str,
    /// The erased implementation. Arity is validated before it runs.
    pub func: Arc<OperationFn>,
    /// Expected number of arguments
    pub arity: Arity,
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    /// The runtime value bound to this operation's identifier
    pub fn to_value(&self) -> Value {
        Value::BuiltinFunction {
            id: Rc::from(self.id),
            func: Arc::clone(&self.func),
        }
    }
}

//
// Builtin Function Implementations
//

// Macro to generate chained numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(first: NumberType, rest: NumIter<'_>) -> bool {
            let mut prev = first;
            for current in rest {
                if !(prev $op current) {
                    return false;
                }
                prev = current;
            }
            true
        }
    };
}

numeric_comparison!(builtin_num_eq, ==);
numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);

fn builtin_add(args: NumIter<'_>) -> NumberType {
    args.sum()
}

fn builtin_mul(args: NumIter<'_>) -> NumberType {
    args.product()
}

fn builtin_sub(first: NumberType, rest: NumIter<'_>) -> NumberType {
    if rest.len() == 0 {
        return -first;
    }
    rest.fold(first, |acc, n| acc - n)
}

fn builtin_div(first: NumberType, rest: NumIter<'_>) -> Result<NumberType, Error> {
    let (mut result, divisors) = if rest.len() == 0 {
        (1.0, vec![first])
    } else {
        (first, rest.collect())
    };
    for n in divisors {
        if n == 0.0 {
            return Err(Error::EvalError("division by zero".into()));
        }
        result /= n;
    }
    Ok(result)
}

fn builtin_sub1(n: NumberType) -> NumberType {
    n - 1.0
}

fn builtin_is_zero(n: NumberType) -> bool {
    n == 0.0
}

fn builtin_is_positive(n: NumberType) -> bool {
    n > 0.0
}

fn builtin_is_negative(n: NumberType) -> bool {
    n < 0.0
}

fn builtin_car(value: Value) -> Result<Value, Error> {
    match value.head() {
        Some(head) => Ok(head.clone()),
        None => Err(Error::TypeError(format!("car: expected a pair, got {value}"))),
    }
}

fn builtin_cdr(value: Value) -> Result<Value, Error> {
    match value.tail() {
        Some(tail) => Ok(tail.clone()),
        None => Err(Error::TypeError(format!("cdr: expected a pair, got {value}"))),
    }
}

fn builtin_cons(head: Value, tail: Value) -> Value {
    Value::cons(head, tail)
}

fn builtin_list(args: ValueIter<'_>) -> Value {
    Value::list_from_iter(args.cloned())
}

fn builtin_is_null(value: Value) -> bool {
    value.is_nil()
}

fn builtin_is_pair(value: Value) -> bool {
    value.is_pair()
}

fn builtin_is_eq(a: Value, b: Value) -> bool {
    a.ptr_eq(&b)
}

fn builtin_begin(args: ValueIter<'_>) -> Value {
    args.last().cloned().unwrap_or(Value::Nil)
}

fn builtin_display(value: Value) -> Value {
    println!("{value}");
    Value::Nil
}

/// Global registry of all built-in operations.
///
/// Each builtin is a plain Rust function wired through the typed adapter
/// layer once at initialization time, and wrapped with its arity check.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn builtin_variadic<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    fn op(id: &'static str, arity: Arity, inner: Arc<OperationFn>) -> BuiltinOp {
        let func: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
            arity.validate(args.len())?;
            inner(args)
        });
        BuiltinOp { id, func, arity }
    }

    vec![
        // List operations
        op("car", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_car)),
        op("cdr", Arity::Exact(1), builtin_fixed::<(Value,), _>(builtin_cdr)),
        op(
            "cons",
            Arity::Exact(2),
            builtin_fixed::<(Value, Value), _>(builtin_cons),
        ),
        op(
            "list",
            Arity::Any,
            builtin_variadic::<(ValueIter<'static>,), _>(builtin_list),
        ),
        // Numeric operations
        op(
            "sub1",
            Arity::Exact(1),
            builtin_fixed::<(NumberType,), _>(builtin_sub1),
        ),
        op(
            "+",
            Arity::Any,
            builtin_variadic::<(NumIter<'static>,), _>(builtin_add),
        ),
        op(
            "*",
            Arity::Any,
            builtin_variadic::<(NumIter<'static>,), _>(builtin_mul),
        ),
        op(
            "-",
            Arity::AtLeast(1),
            builtin_variadic::<(NumberType, NumIter<'static>), _>(builtin_sub),
        ),
        op(
            "/",
            Arity::AtLeast(1),
            builtin_variadic::<(NumberType, NumIter<'static>), _>(builtin_div),
        ),
        // Predicates
        op(
            "zero?",
            Arity::Exact(1),
            builtin_fixed::<(NumberType,), _>(builtin_is_zero),
        ),
        op(
            "positive?",
            Arity::Exact(1),
            builtin_fixed::<(NumberType,), _>(builtin_is_positive),
        ),
        op(
            "negative?",
            Arity::Exact(1),
            builtin_fixed::<(NumberType,), _>(builtin_is_negative),
        ),
        op(
            "null?",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_is_null),
        ),
        op(
            "pair?",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_is_pair),
        ),
        op(
            "eq?",
            Arity::Exact(2),
            builtin_fixed::<(Value, Value), _>(builtin_is_eq),
        ),
        // Comparison
        op(
            "=",
            Arity::AtLeast(2),
            builtin_variadic::<(NumberType, NumIter<'static>), _>(builtin_num_eq),
        ),
        op(
            "<",
            Arity::AtLeast(2),
            builtin_variadic::<(NumberType, NumIter<'static>), _>(builtin_lt),
        ),
        op(
            ">",
            Arity::AtLeast(2),
            builtin_variadic::<(NumberType, NumIter<'static>), _>(builtin_gt),
        ),
        // Sequencing and output
        op(
            "begin",
            Arity::Any,
            builtin_variadic::<(ValueIter<'static>,), _>(builtin_begin),
        ),
        op(
            "display",
            Arity::Exact(1),
            builtin_fixed::<(Value,), _>(builtin_display),
        ),
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Get all builtin operations (for internal use by evaluator)
pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its identifier
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}
