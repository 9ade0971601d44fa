//! Array built-in object.
//!
//! Provides the Array constructor and prototype methods.

use super::{arg, define_constructor, define_method, relative_index};
use crate::runtime::object::{ObjectKind, ObjectRef};
use crate::runtime::value::Value;
use crate::{Engine, Error, Result};

pub(crate) fn install(engine: &Engine) {
    let prototype = engine.intrinsics().array_prototype.clone();
    let constructor = define_constructor(engine, "Array", array_constructor, &prototype);
    define_method(engine, &constructor, "isArray", is_array);

    define_method(engine, &prototype, "push", push);
    define_method(engine, &prototype, "pop", pop);
    define_method(engine, &prototype, "shift", shift);
    define_method(engine, &prototype, "unshift", unshift);
    define_method(engine, &prototype, "join", join);
    define_method(engine, &prototype, "toString", to_string);
    define_method(engine, &prototype, "slice", slice);
    define_method(engine, &prototype, "concat", concat);
    define_method(engine, &prototype, "indexOf", index_of);
    define_method(engine, &prototype, "forEach", for_each);
    define_method(engine, &prototype, "map", map);
    define_method(engine, &prototype, "filter", filter);
}

/// Returns `this` as an array, or a TypeError naming the method.
fn this_array(this: &Value, method: &str) -> Result<ObjectRef> {
    match this {
        Value::Object(object) if object.is_array() => Ok(object.clone()),
        _ => Err(Error::TypeError(format!(
            "Array.prototype.{} called on non-array",
            method
        ))),
    }
}

/// Runs `f` against the element vector of an array.
fn with_elements<T>(array: &ObjectRef, f: impl FnOnce(&mut Vec<Value>) -> T) -> T {
    let mut object = array.borrow_mut();
    match &mut object.kind {
        ObjectKind::Array(elements) => f(elements),
        _ => f(&mut Vec::new()),
    }
}

// ============================================================================
// Array Constructor
// ============================================================================

/// Array() constructor - creates a new array.
pub fn array_constructor(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    // Single numeric argument = array with that length
    if let [Value::Number(n)] = args {
        if *n < 0.0 || n.fract() != 0.0 || *n > u32::MAX as f64 {
            return Err(Error::RangeError("Invalid array length".to_string()));
        }
        let elements = vec![Value::Undefined; *n as usize];
        return Ok(Value::Object(engine.new_array(elements)));
    }
    Ok(Value::Object(engine.new_array(args.to_vec())))
}

/// Array.isArray(value)
pub fn is_array(_engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(
        arg(args, 0).as_object().is_some_and(ObjectRef::is_array),
    ))
}

// ============================================================================
// Array.prototype
// ============================================================================

/// Array.prototype.push(...items) - appends and returns the new length.
pub fn push(_engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "push")?;
    let len = with_elements(&array, |elements| {
        elements.extend_from_slice(args);
        elements.len()
    });
    Ok(Value::Number(len as f64))
}

/// Array.prototype.pop() - removes and returns the last element.
pub fn pop(_engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "pop")?;
    Ok(with_elements(&array, |elements| elements.pop()).unwrap_or_default())
}

/// Array.prototype.shift() - removes and returns the first element.
pub fn shift(_engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "shift")?;
    Ok(with_elements(&array, |elements| {
        if elements.is_empty() {
            Value::Undefined
        } else {
            elements.remove(0)
        }
    }))
}

/// Array.prototype.unshift(...items) - prepends and returns the new length.
pub fn unshift(_engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "unshift")?;
    let len = with_elements(&array, |elements| {
        elements.splice(0..0, args.iter().cloned());
        elements.len()
    });
    Ok(Value::Number(len as f64))
}

/// Array.prototype.join(separator)
pub fn join(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "join")?;
    let separator = match arg(args, 0) {
        Value::Undefined => ",".into(),
        other => engine.to_js_string(&other)?,
    };

    let mut out = String::new();
    for (i, element) in array.array_elements().unwrap_or_default().iter().enumerate() {
        if i > 0 {
            out.push_str(&separator);
        }
        if !element.is_nullish() {
            out.push_str(&engine.to_js_string(element)?);
        }
    }
    Ok(Value::from(out))
}

/// Array.prototype.toString() - same as join(",").
pub fn to_string(engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    join(engine, this, &[])
}

/// Array.prototype.slice(start, end)
pub fn slice(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "slice")?;
    let elements = array.array_elements().unwrap_or_default();
    let len = elements.len();
    let start = relative_index(engine, &arg(args, 0), len, 0)?;
    let end = relative_index(engine, &arg(args, 1), len, len)?;
    let sliced = if start < end {
        elements[start..end].to_vec()
    } else {
        Vec::new()
    };
    Ok(Value::Object(engine.new_array(sliced)))
}

/// Array.prototype.concat(...items)
pub fn concat(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "concat")?;
    let mut elements = array.array_elements().unwrap_or_default();
    for item in args {
        match item.as_object().and_then(ObjectRef::array_elements) {
            Some(items) => elements.extend(items),
            None => elements.push(item.clone()),
        }
    }
    Ok(Value::Object(engine.new_array(elements)))
}

/// Array.prototype.indexOf(search, fromIndex) - strict equality search.
pub fn index_of(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "indexOf")?;
    let elements = array.array_elements().unwrap_or_default();
    let search = arg(args, 0);
    let from = relative_index(engine, &arg(args, 1), elements.len(), 0)?;
    let found = elements
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, element)| **element == search)
        .map(|(i, _)| i as f64)
        .unwrap_or(-1.0);
    Ok(Value::Number(found))
}

/// Calls `callback(element, index, array)` for every element present when
/// iteration starts.
fn each(
    engine: &Engine,
    array: &ObjectRef,
    args: &[Value],
    method: &str,
    mut f: impl FnMut(Value, Value) -> Result<()>,
) -> Result<()> {
    let callback = arg(args, 0);
    if !callback.is_function() {
        return Err(Error::TypeError(format!(
            "{} is not a function (Array.prototype.{})",
            callback, method
        )));
    }
    let this_arg = arg(args, 1);
    let elements = array.array_elements().unwrap_or_default();
    for (i, element) in elements.into_iter().enumerate() {
        let result = engine.call(
            &callback,
            this_arg.clone(),
            &[element.clone(), Value::Number(i as f64), Value::Object(array.clone())],
        )?;
        f(element, result)?;
    }
    Ok(())
}

/// Array.prototype.forEach(callback, thisArg)
pub fn for_each(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "forEach")?;
    each(engine, &array, args, "forEach", |_, _| Ok(()))?;
    Ok(Value::Undefined)
}

/// Array.prototype.map(callback, thisArg)
pub fn map(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "map")?;
    let mut mapped = Vec::new();
    each(engine, &array, args, "map", |_, result| {
        mapped.push(result);
        Ok(())
    })?;
    Ok(Value::Object(engine.new_array(mapped)))
}

/// Array.prototype.filter(callback, thisArg)
pub fn filter(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let array = this_array(&this, "filter")?;
    let mut kept = Vec::new();
    each(engine, &array, args, "filter", |element, result| {
        if result.to_boolean() {
            kept.push(element);
        }
        Ok(())
    })?;
    Ok(Value::Object(engine.new_array(kept)))
}

#[cfg(test)]
mod tests {
    use crate::{Engine, Value};

    fn eval(src: &str) -> Value {
        Engine::new().evaluate(src, "test.js").expect("should evaluate")
    }

    #[test]
    fn test_push_pop() {
        assert_eq!(eval("var a = [1]; a.push(2, 3)"), Value::Number(3.0));
        assert_eq!(eval("var a = [1, 2]; a.pop() + a.length"), Value::Number(3.0));
        assert_eq!(eval("[].pop()"), Value::Undefined);
    }

    #[test]
    fn test_join_skips_nullish() {
        assert_eq!(eval("[1, null, 'x', undefined].join('-')"), Value::from("1--x-"));
        assert_eq!(eval("String([1, [2, 3]])"), Value::from("1,2,3"));
    }

    #[test]
    fn test_slice_with_negative_indices() {
        assert_eq!(eval("[1, 2, 3, 4].slice(1, -1).join()"), Value::from("2,3"));
        assert_eq!(eval("[1, 2, 3].slice(-2).join()"), Value::from("2,3"));
        assert_eq!(eval("[1, 2, 3].slice(2, 1).length"), Value::Number(0.0));
    }

    #[test]
    fn test_index_of_uses_strict_equality() {
        assert_eq!(eval("[1, '1', 2].indexOf('1')"), Value::Number(1.0));
        assert_eq!(eval("[1, 2].indexOf(3)"), Value::Number(-1.0));
    }

    #[test]
    fn test_is_array() {
        assert_eq!(eval("Array.isArray([])"), Value::Boolean(true));
        assert_eq!(eval("Array.isArray({ length: 0 })"), Value::Boolean(false));
    }

    #[test]
    fn test_higher_order_methods() {
        assert_eq!(
            eval("[1, 2, 3, 4].filter(x => x % 2 === 0).map(x => x * 10).join()"),
            Value::from("20,40")
        );
        assert_eq!(eval("var s = 0; [1, 2, 3].forEach(function (x) { s += x; }); s"), Value::Number(6.0));
    }

    #[test]
    fn test_array_constructor() {
        assert_eq!(eval("new Array(3).length"), Value::Number(3.0));
        assert_eq!(eval("Array(1, 2).join()"), Value::from("1,2"));
    }
}
