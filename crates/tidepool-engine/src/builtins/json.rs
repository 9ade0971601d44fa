//! The JSON object.

use super::{arg, define_method};
use crate::runtime::object::ObjectRef;
use crate::runtime::value::{Value, number_to_string};
use crate::{Engine, Error, Result};

pub(crate) fn install(engine: &Engine) {
    let json = engine.new_object();
    define_method(engine, &json, "stringify", stringify);
    define_method(engine, &json, "parse", parse);
    engine.global().define_hidden("JSON", Value::Object(json));
}

/// Converts parsed JSON into sandbox values. Object keys keep document
/// order.
pub fn from_json(engine: &Engine, json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => {
            let elements = items.iter().map(|item| from_json(engine, item)).collect();
            Value::Object(engine.new_array(elements))
        }
        serde_json::Value::Object(map) => {
            let object = engine.new_object();
            for (key, value) in map {
                object.set(key.as_str(), from_json(engine, value));
            }
            Value::Object(object)
        }
    }
}

/// JSON.parse(text)
pub fn parse(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let text = engine.to_js_string(&arg(args, 0))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| Error::SyntaxError(format!("Unexpected token in JSON: {}", e)))?;
    Ok(from_json(engine, &json))
}

/// JSON.stringify(value, replacer, space)
///
/// Replacer functions are not supported; the argument is ignored.
pub fn stringify(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let indent = match arg(args, 2) {
        Value::Number(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };

    let mut writer = JsonWriter {
        engine,
        indent,
        stack: Vec::new(),
        out: String::new(),
    };
    if writer.write(&arg(args, 0), "")? {
        Ok(Value::from(writer.out))
    } else {
        Ok(Value::Undefined)
    }
}

struct JsonWriter<'a> {
    engine: &'a Engine,
    indent: String,
    stack: Vec<ObjectRef>,
    out: String,
}

impl JsonWriter<'_> {
    /// Writes `value`, returning false when it has no JSON representation
    /// (undefined and functions).
    fn write(&mut self, value: &Value, current: &str) -> Result<bool> {
        let value = match value {
            Value::Object(object) => {
                let to_json = object.get("toJSON");
                if to_json.is_function() {
                    self.engine.call(&to_json, value.clone(), &[])?
                } else {
                    value.clone()
                }
            }
            other => other.clone(),
        };

        match &value {
            Value::Undefined => return Ok(false),
            Value::Null => self.out.push_str("null"),
            Value::Boolean(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) if n.is_finite() => self.out.push_str(&number_to_string(*n)),
            Value::Number(_) => self.out.push_str("null"),
            Value::String(s) => quote(s, &mut self.out),
            Value::Object(object) if object.is_function() => return Ok(false),
            Value::Object(object) => {
                if self.stack.iter().any(|o| o.ptr_eq(object)) {
                    return Err(Error::TypeError(
                        "Converting circular structure to JSON".to_string(),
                    ));
                }
                self.stack.push(object.clone());
                let result = match object.array_elements() {
                    Some(elements) => self.write_array(&elements, current),
                    None => self.write_object(object, current),
                };
                self.stack.pop();
                result?;
            }
        }
        Ok(true)
    }

    fn write_array(&mut self, elements: &[Value], current: &str) -> Result<()> {
        if elements.is_empty() {
            self.out.push_str("[]");
            return Ok(());
        }
        let inner = format!("{}{}", current, self.indent);
        self.out.push('[');
        for (i, element) in elements.iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.newline(&inner);
            if !self.write(element, &inner)? {
                self.out.push_str("null");
            }
        }
        self.newline(current);
        self.out.push(']');
        Ok(())
    }

    fn write_object(&mut self, object: &ObjectRef, current: &str) -> Result<()> {
        let inner = format!("{}{}", current, self.indent);
        self.out.push('{');
        let mut wrote_any = false;
        for key in object.keys() {
            let value = object.get(&key);
            let mark = self.out.len();
            if wrote_any {
                self.out.push(',');
            }
            self.newline(&inner);
            quote(&key, &mut self.out);
            self.out.push(':');
            if !self.indent.is_empty() {
                self.out.push(' ');
            }
            if self.write(&value, &inner)? {
                wrote_any = true;
            } else {
                // Members without a JSON form are skipped entirely
                self.out.truncate(mark);
            }
        }
        if wrote_any {
            self.newline(current);
        }
        self.out.push('}');
        Ok(())
    }

    fn newline(&mut self, indent: &str) {
        if !self.indent.is_empty() {
            self.out.push('\n');
            self.out.push_str(indent);
        }
    }
}

/// Appends `s` as a JSON string literal.
fn quote(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use crate::{Engine, Error, Value};

    fn eval(src: &str) -> Value {
        Engine::new().evaluate(src, "test.js").expect("should evaluate")
    }

    #[test]
    fn test_stringify_compact() {
        assert_eq!(
            eval("JSON.stringify({ a: [1, 'two', null], b: { c: true }, skip: undefined, f: function () {} })"),
            Value::from(r#"{"a":[1,"two",null],"b":{"c":true}}"#)
        );
        assert_eq!(eval("JSON.stringify([undefined, NaN])"), Value::from("[null,null]"));
        assert_eq!(eval("JSON.stringify('a\"b\\n')"), Value::from(r#""a\"b\n""#));
        assert_eq!(eval("JSON.stringify(undefined)"), Value::Undefined);
    }

    #[test]
    fn test_stringify_indented() {
        assert_eq!(
            eval("JSON.stringify({ a: 1, b: [2] }, null, 2)"),
            Value::from("{\n  \"a\": 1,\n  \"b\": [\n    2\n  ]\n}")
        );
        assert_eq!(eval("JSON.stringify({}, null, 2)"), Value::from("{}"));
    }

    #[test]
    fn test_stringify_rejects_cycles() {
        let err = Engine::new()
            .evaluate("var o = {}; o.self = o; JSON.stringify(o)", "t.js")
            .unwrap_err();
        assert!(matches!(err, Error::TypeError(_)));
    }

    #[test]
    fn test_parse_preserves_key_order() {
        assert_eq!(
            eval("Object.keys(JSON.parse('{\"z\": 1, \"a\": {\"n\": [1, 2]}}')).join()"),
            Value::from("z,a")
        );
        assert_eq!(eval("JSON.parse('[1, 2.5]')[1]"), Value::Number(2.5));
    }

    #[test]
    fn test_parse_error_is_syntax_error() {
        let err = Engine::new().evaluate("JSON.parse('{bad')", "t.js").unwrap_err();
        assert!(matches!(err, Error::SyntaxError(_)));
    }
}
