//! Function.prototype methods.

use super::{arg, define_method};
use crate::runtime::value::Value;
use crate::{Engine, Error, Result};

pub(crate) fn install(engine: &Engine) {
    let prototype = engine.intrinsics().function_prototype.clone();
    define_method(engine, &prototype, "call", call);
    define_method(engine, &prototype, "apply", apply);
    define_method(engine, &prototype, "bind", bind);
    define_method(engine, &prototype, "toString", to_string);
}

/// Function.prototype.call(thisArg, ...args)
pub fn call(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let rest = args.get(1..).unwrap_or(&[]);
    engine.call(&this, arg(args, 0), rest)
}

/// Function.prototype.apply(thisArg, argsArray)
pub fn apply(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let call_args = match arg(args, 1) {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Object(object) => match object.array_elements() {
            Some(elements) => elements,
            None => {
                // Array-like objects
                let len = engine.to_js_number(&object.get("length"))?;
                let len = if len.is_nan() { 0 } else { len as usize };
                (0..len).map(|i| object.get(&i.to_string())).collect()
            }
        },
        _ => {
            return Err(Error::TypeError(
                "CreateListFromArrayLike called on non-object".to_string(),
            ));
        }
    };
    engine.call(&this, arg(args, 0), &call_args)
}

/// Function.prototype.bind(thisArg, ...args)
pub fn bind(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    if !this.is_function() {
        return Err(Error::TypeError("Bind must be called on a function".to_string()));
    }
    let bound_this = arg(args, 0);
    let bound_args: Vec<Value> = args.iter().skip(1).cloned().collect();
    let name = match this.as_object().and_then(|o| o.function_name()) {
        Some(name) => format!("bound {}", name),
        None => "bound ".to_string(),
    };

    let target = this;
    let bound = engine.new_function(&name, move |engine, _this, args| {
        let mut all = bound_args.clone();
        all.extend_from_slice(args);
        engine.call(&target, bound_this.clone(), &all)
    });
    Ok(Value::Object(bound))
}

/// Function.prototype.toString()
pub fn to_string(_engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    match this.as_object().and_then(|o| o.function_name()) {
        Some(name) => Ok(Value::from(format!("function {}() {{ [native code] }}", name))),
        None => Err(Error::TypeError(
            "Function.prototype.toString requires that 'this' be a Function".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use crate::{Engine, Value};

    fn eval(src: &str) -> Value {
        Engine::new().evaluate(src, "test.js").expect("should evaluate")
    }

    #[test]
    fn test_call_and_apply() {
        let src = "function add(b, c) { return this.a + b + c; }
                   add.call({ a: 1 }, 2, 3) + add.apply({ a: 10 }, [20, 30])";
        assert_eq!(eval(src), Value::Number(66.0));
    }

    #[test]
    fn test_bind_prepends_arguments() {
        let src = "function greet(greeting, name) { return greeting + ', ' + name + this.p; }
                   var hi = greet.bind({ p: '!' }, 'hi'); hi('bob')";
        assert_eq!(eval(src), Value::from("hi, bob!"));
    }
}
