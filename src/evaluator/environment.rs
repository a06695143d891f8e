use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::Error;
use crate::assoc::{AssocTree, Slot};
use crate::ast::Value;
use crate::builtinops::Arity;
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};

struct Frame {
    bindings: RefCell<AssocTree>,
    parent: Option<Environment>,
}

/// Chain of scope frames, innermost first.
///
/// Cloning an `Environment` is cheap and shares the frames: a closure that
/// captures its defining environment sees every later `define` or `set!` made
/// through any other handle to the same frames.
#[derive(Clone)]
pub struct Environment {
    frame: Rc<Frame>,
}

impl Environment {
    /// A single empty frame with no parent
    pub fn new() -> Self {
        Environment {
            frame: Rc::new(Frame {
                bindings: RefCell::new(AssocTree::new()),
                parent: None,
            }),
        }
    }

    /// Return a new environment whose innermost frame is `bindings` and whose
    /// parent is `self`. The receiver is left untouched.
    pub fn push(&self, bindings: AssocTree) -> Environment {
        Environment {
            frame: Rc::new(Frame {
                bindings: RefCell::new(bindings),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Find the slot bound to `name`, searching innermost frame first
    pub fn lookup(&self, name: &str) -> Option<Slot> {
        let mut env = Some(self);
        while let Some(e) = env {
            if let Some(slot) = e.frame.bindings.borrow().find(name) {
                return Some(slot);
            }
            env = e.frame.parent.as_ref();
        }
        None
    }

    /// Current value bound to `name`
    pub fn get(&self, name: &str) -> Option<Value> {
        self.lookup(name).map(|slot| slot.borrow().clone())
    }

    /// Bind `name` in the innermost frame, overwriting an existing binding of
    /// the same name in that frame.
    pub fn define(&self, name: impl Into<Rc<str>>, value: Value) -> Slot {
        self.frame.bindings.borrow_mut().insert(name.into(), value)
    }

    /// Overwrite the nearest existing binding of `name`, returning the new value
    pub fn set(&self, name: &str, value: Value) -> Result<Value, Error> {
        let slot = self
            .lookup(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))?;
        *slot.borrow_mut() = value.clone();
        Ok(value)
    }

    /// Number of frames in the chain, including the global one
    pub fn depth(&self) -> usize {
        let mut count = 0;
        let mut env = Some(self);
        while let Some(e) = env {
            count += 1;
            env = e.frame.parent.as_ref();
        }
        count
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }

    /// Register a custom builtin function working directly on the evaluated
    /// argument slice.
    ///
    /// # Example
    /// ```
    /// use miniskim::evaluator::create_global_env;
    /// use miniskim::ast::Value;
    /// use miniskim::Error;
    ///
    /// fn argc(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::Number(args.len() as f64))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("argc", argc);
    /// // Now (argc 1 2 3) evaluates to 3
    /// ```
    pub fn register_builtin_function(&self, name: &str, func: fn(&[Value]) -> Result<Value, Error>) {
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| func(&args));
        self.define(name, builtin_value(name, wrapped));
    }

    /// Register a strongly-typed Rust function as a builtin with automatic
    /// argument extraction and result conversion.
    ///
    /// Supported parameter types are `f64` and `Value`. Supported return
    /// types are anything `Into<Value>` (numbers, `bool`, `Value`) or a
    /// `Result<R, Error>` of one. Arity is enforced from the signature.
    ///
    /// ```rust,ignore
    /// fn hypot(a: f64, b: f64) -> f64 { (a * a + b * b).sqrt() }
    /// env.register_builtin_operation::<_, (f64, f64)>("hypot", hypot);
    /// ```
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args> + 'static,
    {
        self.define(name, builtin_value(name, func.into_operation()));
    }

    /// Register a builtin ending in a rest parameter
    /// ([`crate::evaluator::intooperation::ValueIter`] or
    /// [`crate::evaluator::intooperation::NumIter`]). The total argument count
    /// is validated against `arity` before the function runs.
    pub fn register_variadic_builtin_operation<F, Args>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args> + 'static,
    {
        let inner = func.into_variadic_operation();
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
            arity.validate(args.len())?;
            inner(args)
        });
        self.define(name, builtin_value(name, wrapped));
    }

    /// All visible bindings sorted by name. Inner frames shadow outer ones.
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut seen = AssocTree::new();
        let mut env = Some(self);
        while let Some(e) = env {
            for (name, slot) in e.frame.bindings.borrow().iter() {
                if seen.find(name).is_none() {
                    seen.insert(Rc::from(name), slot.borrow().clone());
                }
            }
            env = e.frame.parent.as_ref();
        }
        seen.iter()
            .map(|(name, slot)| (name.to_owned(), slot.borrow().clone()))
            .collect()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("frames", &self.depth())
            .field("local", &self.frame.bindings.borrow().len())
            .finish()
    }
}

pub(crate) fn builtin_value(name: &str, func: Arc<OperationFn>) -> Value {
    Value::BuiltinFunction {
        id: Rc::from(name),
        func,
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_walks_parent_chain() {
        let global = Environment::new();
        global.define("x", val(1));
        global.define("y", val(2));

        let local = global.push(AssocTree::from_bindings([(Rc::from("x"), val(10))]));
        assert_eq!(local.get("x"), Some(val(10)));
        assert_eq!(local.get("y"), Some(val(2)));
        assert_eq!(global.get("x"), Some(val(1)));
        assert_eq!(local.get("z"), None);
        assert_eq!(local.depth(), 2);
    }

    #[test]
    fn test_define_is_visible_through_clones() {
        let env = Environment::new();
        let captured = env.clone();
        env.define("later", sym("bound"));
        assert_eq!(captured.get("later"), Some(sym("bound")));
        assert!(captured.ptr_eq(&env));
    }

    #[test]
    fn test_set_updates_nearest_binding() {
        let global = Environment::new();
        global.define("n", val(0));
        let local = global.push(AssocTree::new());

        local.set("n", val(5)).unwrap();
        assert_eq!(global.get("n"), Some(val(5)));

        let err = local.set("missing", val(1)).unwrap_err();
        assert_eq!(err, Error::UnboundVariable("missing".into()));
    }

    #[test]
    fn test_get_all_bindings_shadows_and_sorts() {
        let global = Environment::new();
        global.define("b", val(1));
        global.define("a", val(2));
        let local = global.push(AssocTree::from_bindings([(Rc::from("b"), val(3))]));

        assert_eq!(
            local.get_all_bindings(),
            vec![("a".to_owned(), val(2)), ("b".to_owned(), val(3))]
        );
    }

    #[test]
    fn test_register_builtin_operation_typed() {
        fn hypot(a: f64, b: f64) -> f64 {
            (a * a + b * b).sqrt()
        }
        let env = Environment::new();
        env.register_builtin_operation::<_, (f64, f64)>("hypot", hypot);
        match env.get("hypot").unwrap() {
            Value::BuiltinFunction { id, func } => {
                assert_eq!(&*id, "hypot");
                assert_eq!(func(vec![val(3), val(4)]).unwrap(), val(5));
            }
            other => panic!("expected builtin, got {other:?}"),
        }
    }
}
