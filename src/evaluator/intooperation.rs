use crate::Error;
use crate::ast::{NumberType, Value};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

// NOTE: This module is internal plumbing for the evaluator.
// It defines the adapter layer that turns strongly-typed Rust
// functions into the erased `OperationFn` used at runtime, so the
// builtin registry can be written as plain functions such as
// `fn(f64) -> bool` or `fn(f64, NumIter<'_>) -> f64`.

/// Canonical erased builtin function type used by the evaluator.
///
/// Builtins receive ownership of their evaluated argument vector.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync;

// =====================================================================
// Fixed-position parameter conversion
// =====================================================================

/// Turns a single evaluated argument into a strongly-typed parameter.
pub(crate) trait FromParam {
    type Param;

    fn from_arg(value: Value) -> Result<Self::Param, Error>;
}

impl FromParam for Value {
    type Param = Value;

    fn from_arg(value: Value) -> Result<Self::Param, Error> {
        Ok(value)
    }
}

impl FromParam for NumberType {
    type Param = NumberType;

    fn from_arg(value: Value) -> Result<Self::Param, Error> {
        NumberType::try_from(value)
    }
}

// =====================================================================
// Typed iterators over rest arguments
// =====================================================================

/// Describes how to view a `Value` slice as a typed iterator.
/// Implementations validate the whole slice up front and then project
/// each element infallibly.
#[doc(hidden)]
pub trait ValueElementKind {
    type Item<'a>;

    fn precheck(slice: &[Value]) -> Result<(), Error>;
    fn project(v: &Value) -> Self::Item<'_>;
}

/// Generic iterator over a slice of arguments, parameterized by a
/// [`ValueElementKind`] that determines the element type.
#[doc(hidden)]
pub struct TypedValueIter<'a, K: ValueElementKind> {
    inner: std::slice::Iter<'a, Value>,
    _marker: PhantomData<K>,
}

impl<'a, K> TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    pub(crate) fn new(values: &'a [Value]) -> Result<Self, Error> {
        K::precheck(values)?;
        Ok(TypedValueIter {
            inner: values.iter(),
            _marker: PhantomData,
        })
    }
}

impl<'a, K> Iterator for TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    type Item = K::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(K::project)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> DoubleEndedIterator for TypedValueIter<'_, K>
where
    K: ValueElementKind,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(K::project)
    }
}

impl<K> ExactSizeIterator for TypedValueIter<'_, K> where K: ValueElementKind {}
impl<K> FusedIterator for TypedValueIter<'_, K> where K: ValueElementKind {}

#[doc(hidden)]
pub struct ValueKind;

impl ValueElementKind for ValueKind {
    type Item<'a> = &'a Value;

    fn precheck(_slice: &[Value]) -> Result<(), Error> {
        Ok(())
    }

    fn project(v: &Value) -> Self::Item<'_> {
        v
    }
}

#[doc(hidden)]
pub struct NumberKind;

impl ValueElementKind for NumberKind {
    type Item<'a> = NumberType;

    fn precheck(slice: &[Value]) -> Result<(), Error> {
        match slice.iter().find(|v| !matches!(v, Value::Number(_))) {
            Some(bad) => Err(Error::TypeError(format!("expected number, got {bad}"))),
            None => Ok(()),
        }
    }

    fn project(v: &Value) -> Self::Item<'_> {
        // precheck guarantees every element is a number
        v.as_number().unwrap_or(NumberType::NAN)
    }
}

/// Borrowed iterator over the remaining arguments as `&Value`.
pub type ValueIter<'a> = TypedValueIter<'a, ValueKind>;

/// Borrowed iterator over numeric arguments; the whole tail is type
/// checked before the builtin runs.
pub type NumIter<'a> = TypedValueIter<'a, NumberKind>;

/// Constructs rest-parameter values from the argument tail.
pub(crate) trait FromRest {
    type Param<'a>;

    fn from_rest(slice: &[Value]) -> Result<Self::Param<'_>, Error>;
}

impl<K> FromRest for TypedValueIter<'static, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_rest(slice: &[Value]) -> Result<Self::Param<'_>, Error> {
        TypedValueIter::<K>::new(slice)
    }
}

// =====================================================================
// Return-type adaptation
// =====================================================================

/// Normalizes builtin return types to `Result<Value, Error>`.
pub(crate) trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<T> IntoValueResult for T
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Converts a fixed-arity Rust function into an [`OperationFn`].
pub(crate) trait IntoOperation<Args> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Converts a function ending in a rest parameter ([`ValueIter`] or
/// [`NumIter`]) into an [`OperationFn`].
pub(crate) trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

// =====================================================================
// Variadic adapters
// =====================================================================

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            let rest = <I as FromRest>::from_rest(&args)?;
            (self)(rest).into_value_result()
        })
    }
}

/// Implements `IntoVariadicOperation` for a fixed prefix of `FromParam`
/// parameters followed by a single rest parameter.
macro_rules! impl_into_variadic_operation_for_prefix_and_rest {
    ($prefix:expr, $( $p:ident : $A:ident ),+ ) => {
        impl<F, I, R, $( $A ),+> IntoVariadicOperation<( $( $A, )+ I, )> for F
        where
            I: FromRest,
            $( $A: FromParam, )+
            F: for<'a> Fn(
                    $( <$A as FromParam>::Param ),+,
                    <I as FromRest>::Param<'a>,
                ) -> R
                + Send
                + Sync
                + 'static,
            R: IntoValueResult,
        {
            fn into_variadic_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Value>| {
                    if args.len() < $prefix {
                        return Err(Error::arity_error($prefix, args.len()));
                    }
                    let rest_values = args.split_off($prefix);
                    let mut prefix = args.into_iter();
                    $(
                        let $p = match prefix.next() {
                            Some(v) => <$A as FromParam>::from_arg(v)?,
                            None => return Err(Error::arity_error($prefix, 0)),
                        };
                    )+
                    let rest = <I as FromRest>::from_rest(&rest_values)?;
                    (self)( $( $p ),+, rest ).into_value_result()
                })
            }
        }
    };
}

impl_into_variadic_operation_for_prefix_and_rest!(1, p0: A1);
impl_into_variadic_operation_for_prefix_and_rest!(2, p0: A1, p1: A2);

// =====================================================================
// Fixed-arity adapters
// =====================================================================

/// Implements `IntoOperation` for functions of a given arity. Arity is
/// checked before any conversion runs.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: Fn( $( <$A as FromParam>::Param ),+ ) -> R + Send + Sync + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |args: Vec<Value>| {
                    if args.len() != $arity {
                        return Err(Error::arity_error($arity, args.len()));
                    }
                    let mut args = args.into_iter();
                    $(
                        let $p = match args.next() {
                            Some(v) => <$A as FromParam>::from_arg(v)?,
                            None => return Err(Error::arity_error($arity, 0)),
                        };
                    )+
                    (self)( $( $p ),+ ).into_value_result()
                })
            }
        }
    };
}

impl_into_operation_for_arity!(1, p0: A1);
impl_into_operation_for_arity!(2, p0: A1, p1: A2);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixed_arity_adapter() {
        fn add(a: NumberType, b: NumberType) -> NumberType {
            a + b
        }
        let op = IntoOperation::<(NumberType, NumberType)>::into_operation(add);
        assert_eq!(op(vec![val(2), val(3)]).unwrap(), val(5));

        // Arity and type errors
        assert!(matches!(
            op(vec![val(2)]).unwrap_err(),
            Error::ArityError { expected: 2, got: 1, .. }
        ));
        assert!(matches!(
            op(vec![val(2), sym("x")]).unwrap_err(),
            Error::TypeError(_)
        ));
    }

    #[test]
    fn test_variadic_rest_only() {
        fn sum(nums: NumIter<'_>) -> NumberType {
            nums.sum()
        }
        let op = IntoVariadicOperation::<(NumIter<'static>,)>::into_variadic_operation(sum);
        assert_eq!(op(vec![]).unwrap(), val(0));
        assert_eq!(op(vec![val(1), val(2), val(3)]).unwrap(), val(6));
        assert!(op(vec![val(1), sym("two")]).is_err());
    }

    #[test]
    fn test_variadic_prefix_and_rest() {
        fn count_after(first: Value, rest: ValueIter<'_>) -> Result<Value, Error> {
            Ok(Value::list_from_iter([first, val(rest.count() as i32)]))
        }
        let op = IntoVariadicOperation::<(Value, ValueIter<'static>)>::into_variadic_operation(
            count_after,
        );
        assert_eq!(
            op(vec![sym("a"), val(1), val(2)]).unwrap(),
            Value::list_from_iter([sym("a"), val(2)])
        );
        assert!(matches!(
            op(vec![]).unwrap_err(),
            Error::ArityError { expected: 1, got: 0, .. }
        ));
    }
}
