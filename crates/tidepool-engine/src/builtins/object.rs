//! Object built-in constructor and prototype methods.

use super::{arg, define_constructor, define_method};
use crate::runtime::object::{Object, ObjectKind, ObjectRef};
use crate::runtime::value::Value;
use crate::{Engine, Error, Result};

pub(crate) fn install(engine: &Engine) {
    let prototype = engine.intrinsics().object_prototype.clone();
    let constructor = define_constructor(engine, "Object", object_constructor, &prototype);

    define_method(engine, &constructor, "keys", object_keys);
    define_method(engine, &constructor, "assign", object_assign);
    define_method(engine, &constructor, "create", object_create);
    define_method(engine, &constructor, "getPrototypeOf", get_prototype_of);
    define_method(engine, &constructor, "defineProperty", define_property);

    define_method(engine, &prototype, "hasOwnProperty", has_own_property);
    define_method(engine, &prototype, "toString", to_string);
}

/// Object() constructor - returns objects unchanged, otherwise creates an
/// empty object.
pub fn object_constructor(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    match arg(args, 0) {
        value @ Value::Object(_) => Ok(value),
        _ => Ok(Value::Object(engine.new_object())),
    }
}

/// Object.keys() - returns array of own enumerable property names.
pub fn object_keys(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let keys = match arg(args, 0) {
        Value::Object(object) => object.keys(),
        Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        Value::Undefined | Value::Null => {
            return Err(Error::TypeError(
                "Cannot convert undefined or null to object".to_string(),
            ));
        }
        _ => Vec::new(),
    };
    let keys = keys.into_iter().map(Value::from).collect();
    Ok(Value::Object(engine.new_array(keys)))
}

/// Object.assign() - copies own enumerable properties onto the target.
pub fn object_assign(_engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let Value::Object(target) = arg(args, 0) else {
        return Err(Error::TypeError(
            "Cannot convert undefined or null to object".to_string(),
        ));
    };
    for source in args.iter().skip(1) {
        if let Value::Object(source) = source {
            for key in source.keys() {
                let value = source.get(&key);
                target.set(key, value);
            }
        }
    }
    Ok(Value::Object(target))
}

/// Object.create() - creates an object with the given prototype.
pub fn object_create(_engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let prototype = match arg(args, 0) {
        Value::Object(prototype) => Some(prototype),
        Value::Null => None,
        other => {
            return Err(Error::TypeError(format!(
                "Object prototype may only be an Object or null: {}",
                other
            )));
        }
    };
    let object = ObjectRef::new(Object::new(ObjectKind::Ordinary, prototype));
    if let Value::Object(properties) = arg(args, 1) {
        for key in properties.keys() {
            apply_descriptor(&object, &key, &properties.get(&key))?;
        }
    }
    Ok(Value::Object(object))
}

/// Object.getPrototypeOf() - returns the prototype of an object.
pub fn get_prototype_of(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let prototype = match arg(args, 0) {
        Value::Object(object) => object.prototype(),
        Value::String(_) => Some(engine.intrinsics().string_prototype.clone()),
        Value::Number(_) => Some(engine.intrinsics().number_prototype.clone()),
        Value::Boolean(_) => Some(engine.intrinsics().boolean_prototype.clone()),
        Value::Undefined | Value::Null => {
            return Err(Error::TypeError(
                "Cannot convert undefined or null to object".to_string(),
            ));
        }
    };
    Ok(prototype.map(Value::Object).unwrap_or(Value::Null))
}

/// Object.defineProperty() - defines a data property.
///
/// Accessor descriptors are evaluated once, at definition time.
pub fn define_property(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let Value::Object(target) = arg(args, 0) else {
        return Err(Error::TypeError(
            "Object.defineProperty called on non-object".to_string(),
        ));
    };
    let key = engine.to_js_string(&arg(args, 1))?;
    let descriptor = arg(args, 2);

    if let Value::Object(desc) = &descriptor {
        let getter = desc.get("get");
        if getter.is_function() && !desc.has("value") {
            let value = engine.call(&getter, Value::Object(target.clone()), &[])?;
            let enumerable = desc.get("enumerable").to_boolean();
            define(&target, &key, value, enumerable);
            return Ok(Value::Object(target));
        }
    }
    apply_descriptor(&target, &key, &descriptor)?;
    Ok(Value::Object(target))
}

fn apply_descriptor(target: &ObjectRef, key: &str, descriptor: &Value) -> Result<()> {
    let Value::Object(desc) = descriptor else {
        return Err(Error::TypeError(format!(
            "Property description must be an object: {}",
            descriptor
        )));
    };
    let enumerable = desc.get("enumerable").to_boolean();
    define(target, key, desc.get("value"), enumerable);
    Ok(())
}

fn define(target: &ObjectRef, key: &str, value: Value, enumerable: bool) {
    if enumerable {
        target.set(key, value);
    } else {
        target.define_hidden(key, value);
    }
}

// ============================================================================
// Object.prototype
// ============================================================================

/// Object.prototype.hasOwnProperty(key)
pub fn has_own_property(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let key = engine.to_js_string(&arg(args, 0))?;
    Ok(Value::Boolean(match this {
        Value::Object(object) => object.has_own(&key),
        Value::String(s) => {
            &*key == "length" || key.parse::<usize>().is_ok_and(|i| i < s.chars().count())
        }
        _ => false,
    }))
}

/// Object.prototype.toString() - returns "[object Type]".
pub fn to_string(_engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let tag = match &this {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Boolean(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Object(object) if object.is_array() => "Array",
        Value::Object(object) if object.is_function() => "Function",
        Value::Object(_) => "Object",
    };
    Ok(Value::from(format!("[object {}]", tag)))
}

#[cfg(test)]
mod tests {
    use crate::{Engine, Value};

    fn eval(src: &str) -> Value {
        Engine::new().evaluate(src, "test.js").expect("should evaluate")
    }

    #[test]
    fn test_object_keys() {
        assert_eq!(eval("Object.keys({ a: 1, b: 2 }).join(',')"), Value::from("a,b"));
        assert_eq!(eval("Object.keys(['x', 'y']).length"), Value::Number(2.0));
    }

    #[test]
    fn test_has_own_property() {
        assert_eq!(eval("({ a: 1 }).hasOwnProperty('a')"), Value::Boolean(true));
        assert_eq!(eval("({ a: 1 }).hasOwnProperty('toString')"), Value::Boolean(false));
    }

    #[test]
    fn test_create_and_get_prototype_of() {
        let src = "var base = { hello: 'world' }; var o = Object.create(base);
                   Object.getPrototypeOf(o) === base && o.hello";
        assert_eq!(eval(src), Value::from("world"));
    }

    #[test]
    fn test_define_property_hides_by_default() {
        let src = "var e = {}; Object.defineProperty(e, '__esModule', { value: true });
                   Object.keys(e).length + ':' + e.__esModule";
        assert_eq!(eval(src), Value::from("0:true"));
    }

    #[test]
    fn test_define_property_getter_is_read_once() {
        let src = "var src = { x: 7 }; var e = {};
                   Object.defineProperty(e, 'x', { enumerable: true, get: function () { return src.x; } });
                   e.x";
        assert_eq!(eval(src), Value::Number(7.0));
    }

    #[test]
    fn test_object_to_string() {
        assert_eq!(eval("String({})"), Value::from("[object Object]"));
        assert_eq!(eval("'' + {}"), Value::from("[object Object]"));
    }
}
