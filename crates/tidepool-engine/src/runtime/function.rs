//! Function representation.

use super::scope::Scope;
use super::value::Value;
use crate::Engine;
use crate::ast::FunctionBody;
use std::fmt;
use std::rc::Rc;

/// A native (Rust) function.
///
/// Receives the engine, the `this` value and the arguments. Callbacks may
/// call back into the engine.
pub type NativeFunction = Rc<dyn Fn(&Engine, Value, &[Value]) -> crate::Result<Value>>;

/// A callable object's payload.
#[derive(Debug, Clone)]
pub struct Function {
    /// The function name (empty for anonymous functions)
    pub name: Rc<str>,
    /// What runs when the function is called
    pub callable: Callable,
}

/// A callable value - either a script closure or a native function.
#[derive(Clone)]
pub enum Callable {
    /// A script function together with the scope it closes over
    Script {
        /// Parsed parameters and body
        body: Rc<FunctionBody>,
        /// The defining scope
        scope: Rc<Scope>,
    },
    /// A native Rust function
    Native(NativeFunction),
}

impl Function {
    /// Returns the number of declared parameters.
    pub fn arity(&self) -> usize {
        match &self.callable {
            Callable::Script { body, .. } => body.params.len(),
            Callable::Native(_) => 0,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Script { body, .. } => write!(f, "Script({:?})", body.name),
            Callable::Native(_) => write!(f, "Native"),
        }
    }
}
