// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tidepool-engine
//!
//! A small, synchronous script interpreter used as the sandbox host for
//! tidepool's CommonJS module system.
//!
//! ## Overview
//!
//! The engine evaluates a practical subset of the language: functions and
//! closures, objects with prototypes, arrays, exceptions and the handful of
//! global builtins that module code and the bundled shims rely on. Host
//! code talks to it through a narrow surface:
//!
//! - [`Engine::evaluate`] runs source text at global scope
//! - [`Engine::call`] invokes a callable value
//! - [`Engine::new_object`], [`Engine::new_array`] and
//!   [`Engine::new_function`] create sandbox values
//! - [`ObjectRef`] reads and writes properties
//!
//! ## Quick Start
//!
//! ```rust
//! use tidepool_engine::{Engine, Value};
//!
//! let engine = Engine::new();
//! let result = engine.evaluate("var add = (a, b) => a + b; add(40, 2)", "demo.js")?;
//! assert_eq!(result, Value::Number(42.0));
//! # Ok::<(), tidepool_engine::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod builtins;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod runtime;

// Re-exports for convenience
pub use runtime::object::ObjectRef;
pub use runtime::stack::DEFAULT_STACK_BUDGET;
pub use runtime::value::Value;

use runtime::object::{Object, ObjectKind};
use runtime::scope::Scope;
use runtime::stack::StackGuard;
use runtime::{Callable, Function};
use std::cell::Cell;
use std::rc::Rc;

/// The default bound on nested calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Objects the interpreter needs direct access to.
#[derive(Debug)]
pub(crate) struct Intrinsics {
    pub global: ObjectRef,
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    pub error_prototype: ObjectRef,
    pub type_error_prototype: ObjectRef,
    pub range_error_prototype: ObjectRef,
    pub reference_error_prototype: ObjectRef,
    pub syntax_error_prototype: ObjectRef,
}

/// A script engine instance.
///
/// Owns the global object and all intrinsic prototypes. Engines are not
/// shared between threads; every method takes `&self` so that native
/// callbacks can re-enter the engine while a call is in progress.
pub struct Engine {
    intrinsics: Intrinsics,
    global_scope: Rc<Scope>,
    depth: Cell<usize>,
    max_call_depth: Cell<usize>,
    stack: StackGuard,
}

impl Engine {
    /// Creates a new engine with the global builtins installed.
    pub fn new() -> Self {
        let plain = |prototype: Option<&ObjectRef>| {
            ObjectRef::new(Object::new(ObjectKind::Ordinary, prototype.cloned()))
        };

        let object_prototype = plain(None);
        let error_prototype = plain(Some(&object_prototype));
        let intrinsics = Intrinsics {
            global: plain(Some(&object_prototype)),
            function_prototype: plain(Some(&object_prototype)),
            array_prototype: plain(Some(&object_prototype)),
            string_prototype: plain(Some(&object_prototype)),
            number_prototype: plain(Some(&object_prototype)),
            boolean_prototype: plain(Some(&object_prototype)),
            type_error_prototype: plain(Some(&error_prototype)),
            range_error_prototype: plain(Some(&error_prototype)),
            reference_error_prototype: plain(Some(&error_prototype)),
            syntax_error_prototype: plain(Some(&error_prototype)),
            error_prototype,
            object_prototype,
        };

        let engine = Self {
            global_scope: Scope::global(intrinsics.global.clone()),
            intrinsics,
            depth: Cell::new(0),
            max_call_depth: Cell::new(DEFAULT_MAX_CALL_DEPTH),
            stack: StackGuard::new(DEFAULT_STACK_BUDGET),
        };
        builtins::install(&engine);
        engine
    }

    /// Parses and runs `source` at global scope, returning the value of the
    /// last expression statement.
    ///
    /// `name` identifies the source in syntax error messages.
    pub fn evaluate(&self, source: &str, name: &str) -> Result<Value> {
        self.stack.enter(|| {
            let program = parser::Parser::with_stack_limit(source, self.stack.limit())
                .parse_program()
                .map_err(|err| match err {
                    Error::SyntaxError(msg) => Error::SyntaxError(format!("{}: {}", name, msg)),
                    other => other,
                })?;
            self.run_program(&program, &self.global_scope)
        })
    }

    /// Returns the global object.
    pub fn global(&self) -> ObjectRef {
        self.intrinsics.global.clone()
    }

    /// Creates a new plain object.
    pub fn new_object(&self) -> ObjectRef {
        ObjectRef::new(Object::new(
            ObjectKind::Ordinary,
            Some(self.intrinsics.object_prototype.clone()),
        ))
    }

    /// Creates a new array holding `elements`.
    pub fn new_array(&self, elements: Vec<Value>) -> ObjectRef {
        ObjectRef::new(Object::new(
            ObjectKind::Array(elements),
            Some(self.intrinsics.array_prototype.clone()),
        ))
    }

    /// Creates a callable object backed by a Rust closure.
    pub fn new_function<F>(&self, name: &str, f: F) -> ObjectRef
    where
        F: Fn(&Engine, Value, &[Value]) -> Result<Value> + 'static,
    {
        let function = Function {
            name: Rc::from(name),
            callable: Callable::Native(Rc::new(f)),
        };
        let object = ObjectRef::new(Object::new(
            ObjectKind::Function(function),
            Some(self.intrinsics.function_prototype.clone()),
        ));
        object.define_hidden("name", Value::from(name));
        object
    }

    /// Creates a script error object such as `TypeError` with `message`.
    pub fn new_error(&self, kind: ErrorKind, message: &str) -> ObjectRef {
        let prototype = match kind {
            ErrorKind::Error => &self.intrinsics.error_prototype,
            ErrorKind::TypeError => &self.intrinsics.type_error_prototype,
            ErrorKind::RangeError => &self.intrinsics.range_error_prototype,
            ErrorKind::ReferenceError => &self.intrinsics.reference_error_prototype,
            ErrorKind::SyntaxError => &self.intrinsics.syntax_error_prototype,
        };
        builtins::error::make_error(prototype, message)
    }

    /// Sets the maximum depth of nested calls before a `RangeError` is
    /// raised.
    pub fn set_max_call_depth(&self, depth: usize) {
        self.max_call_depth.set(depth);
    }

    /// Sets how many bytes of native stack parsing and evaluation may use,
    /// counted from the outermost `evaluate` or `call`. Past it, nesting
    /// fails with a `RangeError` (or a `SyntaxError` while parsing) instead
    /// of overflowing the thread's stack.
    ///
    /// The default, [`DEFAULT_STACK_BUDGET`], suits a 2 MiB thread.
    pub fn set_stack_budget(&self, bytes: usize) {
        self.stack.set_budget(bytes);
    }

    pub(crate) fn check_stack(&self) -> Result<()> {
        if self.stack.exceeded() {
            return Err(stack_exhausted());
        }
        Ok(())
    }

    pub(crate) fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// The builtin error constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// `Error`
    Error,
    /// `TypeError`
    TypeError,
    /// `RangeError`
    RangeError,
    /// `ReferenceError`
    ReferenceError,
    /// `SyntaxError`
    SyntaxError,
}

/// Errors that can occur during script execution.
#[derive(Debug)]
pub enum Error {
    /// Syntax error during parsing
    SyntaxError(String),
    /// Type error during execution
    TypeError(String),
    /// Reference error (undefined variable)
    ReferenceError(String),
    /// Range error (call depth, invalid lengths)
    RangeError(String),
    /// A value raised by a script `throw` statement
    Thrown(Value),
    /// An error raised by host code inside a native callback
    Host(Box<dyn std::error::Error>),
}

impl Error {
    /// Wraps a host error so it can travel through script frames.
    pub fn host<E: std::error::Error + 'static>(err: E) -> Self {
        Error::Host(Box::new(err))
    }
}

pub(crate) fn stack_exhausted() -> Error {
    Error::RangeError("Maximum call stack size exceeded".to_string())
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SyntaxError(msg) => write!(f, "SyntaxError: {}", msg),
            Error::TypeError(msg) => write!(f, "TypeError: {}", msg),
            Error::ReferenceError(msg) => write!(f, "ReferenceError: {}", msg),
            Error::RangeError(msg) => write!(f, "RangeError: {}", msg),
            Error::Thrown(Value::Object(object)) => {
                // Error objects render as "Name: message"
                match object.get("message") {
                    Value::String(message) => {
                        let name = match object.get("name") {
                            Value::String(name) => name,
                            _ => Rc::from("Error"),
                        };
                        write!(f, "{}: {}", name, message)
                    }
                    _ => write!(f, "Uncaught {}", object),
                }
            }
            Error::Thrown(Value::String(s)) => write!(f, "Uncaught '{}'", s),
            Error::Thrown(value) => write!(f, "Uncaught {}", value),
            Error::Host(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Host(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_returns_last_expression() {
        let engine = Engine::new();
        let result = engine.evaluate("var x = 20; x * 2 + 2", "test.js").unwrap();
        assert_eq!(result, Value::Number(42.0));
    }

    #[test]
    fn test_syntax_error_names_the_source() {
        let engine = Engine::new();
        let err = engine.evaluate("var = 1;", "broken.js").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("SyntaxError: broken.js: line 1:"), "{}", message);
    }

    #[test]
    fn test_native_function_reenters_engine() {
        let engine = Engine::new();
        let twice = engine.new_function("twice", |engine, _this, args| {
            let callback = args.first().cloned().unwrap_or_default();
            let first = engine.call(&callback, Value::Undefined, &[])?;
            let second = engine.call(&callback, Value::Undefined, &[])?;
            Ok(Value::Number(first.to_number() + second.to_number()))
        });
        engine.global().set("twice", Value::Object(twice));
        let result = engine.evaluate("var n = 0; twice(() => ++n)", "t.js").unwrap();
        assert_eq!(result, Value::Number(3.0));
    }

    #[derive(Debug)]
    struct HostFailure;

    impl std::fmt::Display for HostFailure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "host failure")
        }
    }

    impl std::error::Error for HostFailure {}

    #[test]
    fn test_host_errors_pass_through_script_frames() {
        let engine = Engine::new();
        let fail = engine.new_function("fail", |_, _, _| Err(Error::host(HostFailure)));
        engine.global().set("fail", Value::Object(fail));
        let err = engine
            .evaluate("function outer() { return fail(); } outer();", "t.js")
            .unwrap_err();
        match err {
            Error::Host(inner) => assert!(inner.downcast_ref::<HostFailure>().is_some()),
            other => panic!("expected host error, got {:?}", other),
        }
    }

    #[test]
    fn test_host_errors_are_catchable() {
        let engine = Engine::new();
        let fail = engine.new_function("fail", |_, _, _| Err(Error::host(HostFailure)));
        engine.global().set("fail", Value::Object(fail));
        let result = engine
            .evaluate("var m; try { fail(); } catch (e) { m = e.message; } m", "t.js")
            .unwrap();
        assert_eq!(result, Value::from("host failure"));
    }

    #[test]
    fn test_thrown_error_display() {
        let engine = Engine::new();
        let err = engine
            .evaluate("throw new TypeError('bad thing');", "t.js")
            .unwrap_err();
        assert_eq!(err.to_string(), "TypeError: bad thing");
    }
}
