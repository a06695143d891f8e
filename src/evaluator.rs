use std::rc::Rc;

use tracing::{trace, warn};

use crate::Error;
use crate::MAX_EVAL_DEPTH;
use crate::assoc::AssocTree;
use crate::ast::{Closure, Value};
use crate::builtinops::get_builtin_ops;
use crate::stack::ensure_sufficient_stack;

mod environment;
pub mod intooperation;

pub use environment::Environment;

/// Tunable evaluation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    /// Maximum nesting of `eval` calls before [`Error::DepthExceeded`]
    pub max_depth: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        EvalLimits {
            max_depth: MAX_EVAL_DEPTH,
        }
    }
}

/// The special forms, recognised by exact symbol text in operator position.
/// They take precedence over any variable of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Define,
    SetBang,
    If,
    Quote,
    Lambda,
}

impl SpecialForm {
    pub fn from_symbol(name: &str) -> Option<Self> {
        match name {
            "define" => Some(SpecialForm::Define),
            "set!" => Some(SpecialForm::SetBang),
            "if" => Some(SpecialForm::If),
            "quote" => Some(SpecialForm::Quote),
            "lambda" => Some(SpecialForm::Lambda),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SpecialForm::Define => "define",
            SpecialForm::SetBang => "set!",
            SpecialForm::If => "if",
            SpecialForm::Quote => "quote",
            SpecialForm::Lambda => "lambda",
        }
    }
}

/// Shape of an expression, decided once before evaluation proper
enum Form<'a> {
    SelfEvaluating,
    Variable(&'a str),
    Special(SpecialForm, &'a Value),
    Application {
        operator: &'a Value,
        operands: &'a Value,
    },
    Empty,
}

/// Symbols spelled with surrounding double quotes stand for themselves, which
/// gives the language a text literal without a separate string kind.
fn is_text_literal(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('"') && name.ends_with('"')
}

fn classify(expr: &Value) -> Form<'_> {
    match expr {
        Value::Symbol(name) if is_text_literal(name) => Form::SelfEvaluating,
        Value::Symbol(name) => Form::Variable(name),
        Value::Pair(pair) => match pair.head.as_symbol().and_then(SpecialForm::from_symbol) {
            Some(form) => Form::Special(form, &pair.tail),
            None => Form::Application {
                operator: &pair.head,
                operands: &pair.tail,
            },
        },
        Value::Nil => Form::Empty,
        Value::Number(_) | Value::True | Value::Closure(_) | Value::BuiltinFunction { .. } => {
            Form::SelfEvaluating
        }
    }
}

/// Evaluate an expression with the default [`EvalLimits`]
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    eval_with_limits(expr, env, &EvalLimits::default())
}

pub fn eval_with_limits(expr: &Value, env: &Environment, limits: &EvalLimits) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, limits, 0)
}

/// Evaluate an expression with depth tracking to turn runaway recursion into
/// an error instead of a native stack overflow
fn eval_with_depth_tracking(
    expr: &Value,
    env: &Environment,
    limits: &EvalLimits,
    depth: usize,
) -> Result<Value, Error> {
    if depth >= limits.max_depth {
        return Err(Error::DepthExceeded(limits.max_depth));
    }
    ensure_sufficient_stack(|| eval_form(expr, env, limits, depth))
}

fn eval_form(
    expr: &Value,
    env: &Environment,
    limits: &EvalLimits,
    depth: usize,
) -> Result<Value, Error> {
    match classify(expr) {
        Form::SelfEvaluating => Ok(expr.clone()),

        Form::Variable(name) => env
            .get(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned())),

        Form::Special(form, operands) => {
            trace!(form = form.keyword(), depth, "special form");
            let args = operands
                .to_vec()
                .map_err(|_| Error::malformed(form.keyword(), "operands must form a proper list"))?;
            match form {
                SpecialForm::Define => eval_define(&args, env, limits, depth),
                SpecialForm::SetBang => eval_set(&args, env, limits, depth),
                SpecialForm::If => eval_if(&args, env, limits, depth),
                SpecialForm::Quote => eval_quote(&args),
                SpecialForm::Lambda => eval_lambda(&args, env),
            }
        }

        Form::Application { operator, operands } => {
            eval_application(operator, operands, env, limits, depth)
                .map_err(|err| add_context(err, expr))
        }

        Form::Empty => Err(Error::BadForm(
            "() cannot be evaluated; quote it to get the empty list".to_owned(),
        )),
    }
}

/// Helper function to add expression context to errors
fn add_context(error: Error, expr: &Value) -> Error {
    let context = format!("while evaluating: {expr}");
    match error {
        Error::EvalError(msg) => Error::EvalError(format!("{msg}\n  Context: {context}")),
        Error::TypeError(msg) if !msg.contains("\n  Context:") => {
            Error::TypeError(format!("{msg}\n  Context: {context}"))
        }
        other => other,
    }
}

/// Evaluate argument expressions strictly left to right
fn eval_args(
    operands: &Value,
    env: &Environment,
    limits: &EvalLimits,
    depth: usize,
) -> Result<Vec<Value>, Error> {
    if !operands.is_proper_list() {
        return Err(Error::BadForm(format!(
            "application arguments must form a proper list, got {operands}"
        )));
    }
    operands
        .iter()
        .map(|arg| eval_with_depth_tracking(arg, env, limits, depth + 1))
        .collect()
}

fn eval_application(
    operator: &Value,
    operands: &Value,
    env: &Environment,
    limits: &EvalLimits,
    depth: usize,
) -> Result<Value, Error> {
    let func = match operator {
        Value::Symbol(name) if !is_text_literal(name) => env
            .get(name)
            .ok_or_else(|| Error::UnknownOperator(name.to_string()))?,
        _ => eval_with_depth_tracking(operator, env, limits, depth + 1)?,
    };
    let args = eval_args(operands, env, limits, depth)?;
    apply_with_depth(&func, args, limits, depth)
}

/// Apply a procedure to already-evaluated arguments
pub fn apply(func: &Value, args: Vec<Value>, limits: &EvalLimits) -> Result<Value, Error> {
    apply_with_depth(func, args, limits, 0)
}

fn apply_with_depth(
    func: &Value,
    args: Vec<Value>,
    limits: &EvalLimits,
    depth: usize,
) -> Result<Value, Error> {
    trace!(procedure = %func, argc = args.len(), depth, "apply");
    match func {
        Value::BuiltinFunction { func, .. } => func(args),
        Value::Closure(closure) => {
            let params: Vec<Rc<str>> = closure
                .params
                .iter()
                .filter_map(|p| match p {
                    Value::Symbol(name) => Some(Rc::clone(name)),
                    _ => None,
                })
                .collect();
            if params.len() != args.len() {
                return Err(Error::arity_error_with_expr(
                    params.len(),
                    args.len(),
                    format!("{func}"),
                ));
            }

            let frame = AssocTree::from_bindings(params.into_iter().zip(args));
            let call_env = closure.env.push(frame);

            eval_with_depth_tracking(&closure.body, &call_env, limits, depth + 1).map_err(
                |err| match err {
                    Error::EvalError(msg) => {
                        Error::EvalError(format!("{msg}\n  In lambda: {}", closure.body))
                    }
                    other => other,
                },
            )
        }
        other => Err(Error::NotApplicable(format!("{other}"))),
    }
}

/// Evaluate quote special form
fn eval_quote(args: &[Value]) -> Result<Value, Error> {
    match args {
        [datum] => Ok(datum.clone()),
        _ => Err(Error::malformed(
            "quote",
            format!("expected 1 operand, got {}", args.len()),
        )),
    }
}

/// Evaluate define special form. Returns the defined symbol.
fn eval_define(
    args: &[Value],
    env: &Environment,
    limits: &EvalLimits,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth_tracking(expr, env, limits, depth + 1)?;
            env.define(Rc::clone(name), value);
            Ok(Value::Symbol(Rc::clone(name)))
        }
        [other, _] => Err(Error::malformed(
            "define",
            format!("name must be a symbol, got {other}"),
        )),
        _ => Err(Error::malformed(
            "define",
            format!("expected 2 operands, got {}", args.len()),
        )),
    }
}

/// Evaluate set! special form. Overwrites the nearest binding in place and
/// returns the new value.
fn eval_set(
    args: &[Value],
    env: &Environment,
    limits: &EvalLimits,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let slot = env
                .lookup(name)
                .ok_or_else(|| Error::UnboundVariable(name.to_string()))?;
            let value = eval_with_depth_tracking(expr, env, limits, depth + 1)?;
            *slot.borrow_mut() = value.clone();
            Ok(value)
        }
        [other, _] => Err(Error::malformed(
            "set!",
            format!("name must be a symbol, got {other}"),
        )),
        _ => Err(Error::malformed(
            "set!",
            format!("expected 2 operands, got {}", args.len()),
        )),
    }
}

/// Evaluate if special form. Only `()` is false.
fn eval_if(
    args: &[Value],
    env: &Environment,
    limits: &EvalLimits,
    depth: usize,
) -> Result<Value, Error> {
    match args {
        [test, then_expr, else_expr] => {
            let condition = eval_with_depth_tracking(test, env, limits, depth + 1)?;
            let branch = if condition.is_nil() { else_expr } else { then_expr };
            eval_with_depth_tracking(branch, env, limits, depth + 1)
        }
        _ => Err(Error::malformed(
            "if",
            format!("expected 3 operands, got {}", args.len()),
        )),
    }
}

/// Evaluate lambda special form
fn eval_lambda(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [params, body] => {
            if !params.is_proper_list() {
                return Err(Error::MalformedLambda(format!(
                    "parameters must be a list, got {params}"
                )));
            }
            let mut seen = AssocTree::new();
            for param in params.iter() {
                match param {
                    Value::Symbol(name) => {
                        if seen.find(name).is_some() {
                            return Err(Error::MalformedLambda(format!(
                                "duplicate parameter name: {name}"
                            )));
                        }
                        seen.insert(Rc::clone(name), Value::Nil);
                    }
                    other => {
                        return Err(Error::MalformedLambda(format!(
                            "parameters must be symbols, got {other}"
                        )));
                    }
                }
            }

            Ok(Value::Closure(Rc::new(Closure {
                params: params.clone(),
                body: body.clone(),
                env: env.clone(),
            })))
        }
        _ => Err(Error::MalformedLambda(format!(
            "expected parameters and a body, got {} operands",
            args.len()
        ))),
    }
}

/// Result of evaluating in degrade-to-sentinel mode: on failure `value` is
/// `()` and the error is kept alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub value: Value,
    pub error: Option<Error>,
}

impl Outcome {
    pub fn ok(value: Value) -> Self {
        Outcome { value, error: None }
    }

    /// Substitute `()` for a failed evaluation, logging the error
    pub fn recovered(error: Error) -> Self {
        warn!(%error, "recovered from evaluation error");
        Outcome {
            value: Value::Nil,
            error: Some(error),
        }
    }

    pub fn is_recovered(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_result(self) -> Result<Value, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

impl From<Result<Value, Error>> for Outcome {
    fn from(result: Result<Value, Error>) -> Self {
        match result {
            Ok(value) => Outcome::ok(value),
            Err(error) => Outcome::recovered(error),
        }
    }
}

/// Evaluate without propagating: any error degrades to the `()` sentinel
pub fn eval_recovering(expr: &Value, env: &Environment, limits: &EvalLimits) -> Outcome {
    eval_with_limits(expr, env, limits).into()
}

/// Create a global environment with built-in functions
pub fn create_global_env() -> Environment {
    let env = Environment::new();
    for builtin_op in get_builtin_ops() {
        env.define(builtin_op.id, builtin_op.to_value());
    }
    env
}
