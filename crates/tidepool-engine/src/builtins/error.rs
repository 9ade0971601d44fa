//! Error built-in constructors.
//!
//! `Error` plus the `TypeError`, `RangeError`, `ReferenceError` and
//! `SyntaxError` variants. Each instance carries `message` and a `stack`
//! string; `name` lives on the prototype.

use super::{arg, define_constructor, define_method};
use crate::runtime::object::{Object, ObjectKind, ObjectRef};
use crate::runtime::value::Value;
use crate::{Engine, ErrorKind, Result};

pub(crate) fn install(engine: &Engine) {
    let intrinsics = engine.intrinsics();
    let base = intrinsics.error_prototype.clone();
    base.define_hidden("name", Value::from("Error"));
    base.define_hidden("message", Value::from(""));
    define_method(engine, &base, "toString", to_string);

    let constructor = define_constructor(engine, "Error", error_constructor, &base);
    define_method(engine, &constructor, "captureStackTrace", capture_stack_trace);

    let variants: [(&str, &ObjectRef, super::Builtin); 4] = [
        ("TypeError", &intrinsics.type_error_prototype, |e, _, a| {
            construct(e, ErrorKind::TypeError, a)
        }),
        ("RangeError", &intrinsics.range_error_prototype, |e, _, a| {
            construct(e, ErrorKind::RangeError, a)
        }),
        ("ReferenceError", &intrinsics.reference_error_prototype, |e, _, a| {
            construct(e, ErrorKind::ReferenceError, a)
        }),
        ("SyntaxError", &intrinsics.syntax_error_prototype, |e, _, a| {
            construct(e, ErrorKind::SyntaxError, a)
        }),
    ];
    for (name, prototype, f) in variants {
        prototype.define_hidden("name", Value::from(name));
        define_constructor(engine, name, f, prototype);
    }
}

/// Creates an error object with the given prototype and message.
pub fn make_error(prototype: &ObjectRef, message: &str) -> ObjectRef {
    let error = ObjectRef::new(Object::new(ObjectKind::Ordinary, Some(prototype.clone())));
    error.define_hidden("message", Value::from(message));
    let name = prototype.get("name");
    error.define_hidden("stack", Value::from(format!("{}: {}", name, message)));
    error
}

fn construct(engine: &Engine, kind: ErrorKind, args: &[Value]) -> Result<Value> {
    let message = match arg(args, 0) {
        Value::Undefined => "".into(),
        other => engine.to_js_string(&other)?,
    };
    Ok(Value::Object(engine.new_error(kind, &message)))
}

/// Error(message) - creates an error whether or not called with `new`.
pub fn error_constructor(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    construct(engine, ErrorKind::Error, args)
}

/// Error.prototype.toString() - "name: message", or just the name when the
/// message is empty.
pub fn to_string(engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let name = match engine.get_property(&this, "name")? {
        Value::Undefined => "Error".into(),
        other => engine.to_js_string(&other)?,
    };
    let message = match engine.get_property(&this, "message")? {
        Value::Undefined => "".into(),
        other => engine.to_js_string(&other)?,
    };
    Ok(Value::from(match (name.is_empty(), message.is_empty()) {
        (_, true) => name.to_string(),
        (true, false) => message.to_string(),
        (false, false) => format!("{}: {}", name, message),
    }))
}

/// Error.captureStackTrace(target) - sets `target.stack` from its name and
/// message.
pub fn capture_stack_trace(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    if let Value::Object(target) = arg(args, 0) {
        let rendered = to_string(engine, Value::Object(target.clone()), &[])?;
        target.define_hidden("stack", rendered);
    }
    Ok(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use crate::{Engine, Value};

    fn eval(src: &str) -> Value {
        Engine::new().evaluate(src, "test.js").expect("should evaluate")
    }

    #[test]
    fn test_error_properties() {
        assert_eq!(eval("new Error('boom').message"), Value::from("boom"));
        assert_eq!(eval("new RangeError('r').name"), Value::from("RangeError"));
        assert_eq!(eval("TypeError('t').stack"), Value::from("TypeError: t"));
    }

    #[test]
    fn test_error_hierarchy() {
        assert_eq!(eval("new TypeError('x') instanceof Error"), Value::Boolean(true));
        assert_eq!(eval("new Error('x') instanceof TypeError"), Value::Boolean(false));
    }

    #[test]
    fn test_error_to_string() {
        assert_eq!(eval("String(new Error('boom'))"), Value::from("Error: boom"));
        assert_eq!(eval("String(new SyntaxError())"), Value::from("SyntaxError"));
        assert_eq!(eval("Object.keys(new Error('hidden')).length"), Value::Number(0.0));
    }

    #[test]
    fn test_custom_error_subclass() {
        let src = "function NotFound(m) { this.message = m; }
                   NotFound.prototype = Object.create(Error.prototype);
                   NotFound.prototype.name = 'NotFound';
                   var e = new NotFound('gone');
                   (e instanceof Error) + ' ' + String(e)";
        assert_eq!(eval(src), Value::from("true NotFound: gone"));
    }
}
