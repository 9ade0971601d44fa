//! Runtime data structures: values, objects, functions and scopes.

pub mod function;
pub mod object;
pub mod scope;
pub mod stack;
pub mod value;

pub use function::{Callable, Function, NativeFunction};
pub use object::{Object, ObjectKind, ObjectRef};
pub use scope::Scope;
pub use stack::{DEFAULT_STACK_BUDGET, StackLimit};
pub use value::{Value, number_to_string, string_to_number};
