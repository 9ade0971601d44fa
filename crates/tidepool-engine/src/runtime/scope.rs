//! Lexical scopes for variable binding.

use super::object::ObjectRef;
use super::value::Value;
use crate::Error;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A variable binding.
#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// A lexical scope.
///
/// The outermost scope is backed by the global object: `var` declarations
/// and assignments to undeclared names there become global properties.
#[derive(Debug)]
pub struct Scope {
    bindings: RefCell<FxHashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
    global_object: Option<ObjectRef>,
    this: Option<Value>,
    is_function: bool,
}

impl Scope {
    /// Creates the global scope.
    pub fn global(global_object: ObjectRef) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: None,
            this: Some(Value::Object(global_object.clone())),
            global_object: Some(global_object),
            is_function: true,
        })
    }

    /// Creates a function scope. Arrow functions pass `None` for `this` and
    /// see the value of the enclosing function.
    pub fn function(parent: Rc<Scope>, this: Option<Value>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: Some(parent),
            global_object: None,
            this,
            is_function: true,
        })
    }

    /// Creates a block scope.
    pub fn block(parent: Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: Some(parent),
            global_object: None,
            this: None,
            is_function: false,
        })
    }

    /// Declares and initializes a binding in this scope.
    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        if let Some(global) = &self.global_object {
            if mutable {
                global.set(name, value);
                return;
            }
        }
        self.bindings
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// Declares a `var` in the nearest function scope, leaving an existing
    /// binding of the same name untouched.
    pub fn declare_var(&self, name: &str) {
        let mut scope = self;
        while !scope.is_function {
            match &scope.parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }

        if let Some(global) = &scope.global_object {
            if !global.has_own(name) {
                global.set(name, Value::Undefined);
            }
            return;
        }

        scope
            .bindings
            .borrow_mut()
            .entry(name.to_string())
            .or_insert(Binding {
                value: Value::Undefined,
                mutable: true,
            });
    }

    /// Looks a name up through the scope chain.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.bindings.borrow().get(name) {
                return Some(binding.value.clone());
            }
            if let Some(global) = &scope.global_object {
                if global.has(name) {
                    return Some(global.get(name));
                }
            }
            scope = scope.parent.as_deref()?;
        }
    }

    /// Assigns to an existing binding. Assignment to an undeclared name
    /// creates a global property.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), Error> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.bindings.borrow_mut().get_mut(name) {
                if !binding.mutable {
                    return Err(Error::TypeError(
                        "Assignment to constant variable.".to_string(),
                    ));
                }
                binding.value = value;
                return Ok(());
            }
            if let Some(global) = &scope.global_object {
                global.set(name, value);
                return Ok(());
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => return Ok(()),
            }
        }
    }

    /// Returns the `this` value of the nearest non-arrow function.
    pub fn this_value(&self) -> Value {
        let mut scope = self;
        loop {
            if let Some(this) = &scope.this {
                return this.clone();
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => return Value::Undefined,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::object::{Object, ObjectKind};

    fn global_scope() -> (ObjectRef, Rc<Scope>) {
        let global = ObjectRef::new(Object::new(ObjectKind::Ordinary, None));
        let scope = Scope::global(global.clone());
        (global, scope)
    }

    #[test]
    fn test_global_var_becomes_property() {
        let (global, scope) = global_scope();
        scope.declare_var("answer");
        assert!(global.has_own("answer"));
        scope.assign("answer", Value::Number(42.0)).unwrap();
        assert_eq!(global.get("answer"), Value::Number(42.0));
    }

    #[test]
    fn test_var_hoists_past_blocks() {
        let (_, global) = global_scope();
        let function = Scope::function(global, Some(Value::Undefined));
        let block = Scope::block(function.clone());
        block.declare_var("x");
        assert_eq!(function.lookup("x"), Some(Value::Undefined));
    }

    #[test]
    fn test_const_assignment_fails() {
        let (_, global) = global_scope();
        let block = Scope::block(global);
        block.declare("k", Value::Number(1.0), false);
        assert!(matches!(
            block.assign("k", Value::Number(2.0)),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn test_shadowing_and_undeclared_assignment() {
        let (global, scope) = global_scope();
        let function = Scope::function(scope, None);
        function.declare("x", Value::from("inner"), true);
        assert_eq!(function.lookup("x"), Some(Value::from("inner")));
        function.assign("leaked", Value::Boolean(true)).unwrap();
        assert_eq!(global.get("leaked"), Value::Boolean(true));
        assert_eq!(function.lookup("nope"), None);
    }

    #[test]
    fn test_arrow_scopes_inherit_this() {
        let (global, scope) = global_scope();
        let arrow = Scope::function(scope, None);
        assert_eq!(arrow.this_value(), Value::Object(global));
    }
}
