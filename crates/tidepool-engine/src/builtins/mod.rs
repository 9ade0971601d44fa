//! Built-in global objects and constructors.
//!
//! Only the pieces module code and the bundled shims lean on are provided:
//! - Object, Function, Array, String, Number, Boolean
//! - Error and its TypeError/RangeError/ReferenceError/SyntaxError variants
//! - JSON and Math
//! - parseInt, parseFloat, isNaN

pub mod array;
pub mod error;
pub mod function;
pub mod json;
pub mod number;
pub mod object;
pub mod string;

use crate::runtime::object::ObjectRef;
use crate::runtime::value::Value;
use crate::{Engine, Result};

/// Signature shared by every builtin.
pub type Builtin = fn(&Engine, Value, &[Value]) -> Result<Value>;

/// Installs all builtins on the engine's global object.
pub(crate) fn install(engine: &Engine) {
    let global = engine.global();
    global.define_hidden("undefined", Value::Undefined);
    global.define_hidden("NaN", Value::Number(f64::NAN));
    global.define_hidden("Infinity", Value::Number(f64::INFINITY));

    object::install(engine);
    function::install(engine);
    array::install(engine);
    string::install(engine);
    number::install(engine);
    error::install(engine);
    json::install(engine);
}

/// Defines a non-enumerable native method on `target`.
pub(crate) fn define_method(engine: &Engine, target: &ObjectRef, name: &str, f: Builtin) {
    target.define_hidden(name, Value::Object(engine.new_function(name, f)));
}

/// Creates a constructor wired to `prototype` and exposes it as a global.
pub(crate) fn define_constructor(
    engine: &Engine,
    name: &str,
    f: Builtin,
    prototype: &ObjectRef,
) -> ObjectRef {
    let constructor = engine.new_function(name, f);
    constructor.define_hidden("prototype", Value::Object(prototype.clone()));
    prototype.define_hidden("constructor", Value::Object(constructor.clone()));
    engine
        .global()
        .define_hidden(name, Value::Object(constructor.clone()));
    constructor
}

/// Returns argument `index`, or undefined when it was not passed.
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Converts a relative index argument (negative counts from the end) into
/// an offset within `0..=len`.
pub(crate) fn relative_index(engine: &Engine, value: &Value, len: usize, default: usize) -> Result<usize> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = engine.to_js_number(value)?;
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    let len = len as f64;
    let index = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
    Ok(index as usize)
}
