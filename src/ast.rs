//! This module defines the runtime value model shared by the reader and the
//! evaluator. Every object is a [`Value`]: numbers, symbols, pairs, closures,
//! builtins and the two sentinels (`Nil` for empty/false, `True`).
//!
//! Pairs and closures are reference counted, so structures can be freely
//! aliased: quoting a list, capturing an environment or passing an argument
//! never copies the underlying cells. The `Nil` sentinel behaves like the
//! self-referential pair of classic implementations: its head and tail are
//! `Nil` again.
//!
//! Ergonomic helpers such as [`sym`], [`num`], [`nil`] and [`list`] are
//! provided for building values in code and tests. The [`std::fmt::Display`]
//! implementation is the pretty-printer; numbers print in their shortest
//! round-trip form so the reader can read printed output back.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::Error;
use crate::evaluator::Environment;
use crate::evaluator::intooperation::OperationFn;

/// Type alias for number values in the interpreter
pub(crate) type NumberType = f64;

/// A cons cell
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub head: Value,
    pub tail: Value,
}

/// A procedure created by `lambda`: parameter list, body and the environment
/// that was active when the `lambda` form was evaluated.
pub struct Closure {
    pub params: Value,
    pub body: Value,
    pub env: Environment,
}

/// Core value type of the interpreter
#[derive(Clone)]
pub enum Value {
    /// The empty list, "no value" and the one false value
    Nil,
    /// The canonical true value returned by predicates
    True,
    /// Numbers (double precision only)
    Number(NumberType),
    /// Symbols, which double as the language's only text kind
    Symbol(Rc<str>),
    /// Cons cells
    Pair(Rc<Pair>),
    /// User-defined procedures
    Closure(Rc<Closure>),
    /// Native operations, compared by id
    BuiltinFunction { id: Rc<str>, func: Arc<OperationFn> },
}

impl Value {
    pub fn cons(head: Value, tail: Value) -> Value {
        Value::Pair(Rc::new(Pair { head, tail }))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::from(name))
    }

    /// Convert a Rust bool into one of the two sentinels
    pub fn from_bool(b: bool) -> Value {
        if b { Value::True } else { Value::Nil }
    }

    /// Head of a pair. `Nil` is its own head; other atoms have none.
    pub fn head(&self) -> Option<&Value> {
        match self {
            Value::Pair(p) => Some(&p.head),
            Value::Nil => Some(self),
            _ => None,
        }
    }

    /// Tail of a pair. `Nil` is its own tail; other atoms have none.
    pub fn tail(&self) -> Option<&Value> {
        match self {
            Value::Pair(p) => Some(&p.tail),
            Value::Nil => Some(self),
            _ => None,
        }
    }

    /// Check if a value is the empty/false sentinel. This is the only notion of
    /// falsehood: `0`, the empty symbol and so on are all true.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<NumberType> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Build a proper list from an iterator of values
    pub fn list_from_iter<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, head| Value::cons(head, tail))
    }

    /// Iterate over the elements of a list. Iteration stops at the first
    /// non-pair tail; use [`Value::to_vec`] to reject improper lists.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { cur: self }
    }

    /// Collect a proper list into a vector, or report the offending tail.
    pub fn to_vec(&self) -> Result<Vec<Value>, Error> {
        let mut out = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Value::Nil => return Ok(out),
                Value::Pair(p) => {
                    out.push(p.head.clone());
                    cur = &p.tail;
                }
                other => return Err(Error::TypeError(format!("improper list ending in {other}"))),
            }
        }
    }

    /// Is this a `Nil`-terminated chain of pairs (including `Nil` itself)?
    pub fn is_proper_list(&self) -> bool {
        let mut cur = self;
        loop {
            match cur {
                Value::Nil => return true,
                Value::Pair(p) => cur = &p.tail,
                _ => return false,
            }
        }
    }

    /// Reference identity. Atoms without heap identity (numbers, the sentinels)
    /// compare by variant and payload.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::True, Value::True) => true,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::BuiltinFunction { id: a, .. }, Value::BuiltinFunction { id: b, .. }) => a == b,
            _ => false,
        }
    }

    /// Printer adapter rendering numbers with a fixed number of decimals
    pub fn fixed(&self, precision: usize) -> Fixed<'_> {
        Fixed {
            value: self,
            precision,
        }
    }

    /// Text for output: fixed decimals when `precision` is set, round-trip
    /// form otherwise
    pub fn render(&self, precision: Option<usize>) -> String {
        match precision {
            Some(p) => self.fixed(p).to_string(),
            None => self.to_string(),
        }
    }
}

/// Iterator over the heads of a chain of pairs
pub struct ListIter<'a> {
    cur: &'a Value,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cur {
            Value::Pair(p) => {
                self.cur = &p.tail;
                Some(&p.head)
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::True => write!(f, "True"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Pair(p) => write!(f, "Pair({:?}, {:?})", p.head, p.tail),
            Value::Closure(c) => write!(f, "Closure(params={:?}, body={:?})", c.params, c.body),
            Value::BuiltinFunction { id, .. } => write!(f, "BuiltinFunction({id})"),
        }
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::from_bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list_from_iter(v.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list_from_iter(arr.into_iter().map(Into::into))
    }
}

// Fallible conversions from `Value` back into primitive Rust types, used by the
// builtin adapters.

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<NumberType, Error> {
        match value {
            Value::Number(n) => Ok(n),
            other => Err(Error::TypeError(format!("expected number, got {other}"))),
        }
    }
}

/// Helper function for creating symbols
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::symbol(name.as_ref())
}

/// Helper function for creating numbers
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn num(n: NumberType) -> Value {
    Value::Number(n)
}

/// Helper function for creating Values from anything convertible
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// The empty list
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::Nil
}

/// Helper for mixed-type proper lists
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn list(items: Vec<Value>) -> Value {
    Value::list_from_iter(items)
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, precision: Option<usize>) -> fmt::Result {
    match value {
        Value::Nil => write!(f, "()"),
        Value::True => write!(f, "#t"),
        Value::Number(n) => match precision {
            Some(p) => write!(f, "{n:.p$}"),
            None => write!(f, "{n}"),
        },
        Value::Symbol(s) => write!(f, "{s}"),
        Value::Pair(p) => {
            write!(f, "(")?;
            write_value(f, &p.head, precision)?;
            let mut cur = &p.tail;
            loop {
                match cur {
                    Value::Nil => break,
                    Value::Pair(next) => {
                        write!(f, " ")?;
                        write_value(f, &next.head, precision)?;
                        cur = &next.tail;
                    }
                    other => {
                        write!(f, " . ")?;
                        write_value(f, other, precision)?;
                        break;
                    }
                }
            }
            write!(f, ")")
        }
        Value::Closure(c) => {
            write!(f, "#<lambda ")?;
            write_value(f, &c.params, precision)?;
            write!(f, " ")?;
            write_value(f, &c.body, precision)?;
            write!(f, ">")
        }
        Value::BuiltinFunction { id, .. } => write!(f, "#<builtin:{id}>"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, None)
    }
}

/// See [`Value::fixed`]
pub struct Fixed<'a> {
    value: &'a Value,
    precision: usize,
}

impl fmt::Display for Fixed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self.value, Some(self.precision))
    }
}

/// Structural equality. Closures compare by identity since their environments
/// are live, mutable scopes.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::True, Value::True) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::BuiltinFunction { id: a, .. }, Value::BuiltinFunction { id: b, .. }) => a == b,
            _ => false,
        }
    }
}
