//! String built-in object.
//!
//! Strings are indexed by character, so `length` and every offset count
//! Unicode scalar values.

use super::{arg, define_constructor, define_method, relative_index};
use crate::runtime::value::Value;
use crate::{Engine, Result};
use std::rc::Rc;

pub(crate) fn install(engine: &Engine) {
    let prototype = engine.intrinsics().string_prototype.clone();
    define_constructor(engine, "String", string_constructor, &prototype);

    define_method(engine, &prototype, "toString", to_string);
    define_method(engine, &prototype, "valueOf", to_string);
    define_method(engine, &prototype, "charAt", char_at);
    define_method(engine, &prototype, "charCodeAt", char_code_at);
    define_method(engine, &prototype, "indexOf", index_of);
    define_method(engine, &prototype, "lastIndexOf", last_index_of);
    define_method(engine, &prototype, "slice", slice);
    define_method(engine, &prototype, "substring", substring);
    define_method(engine, &prototype, "split", split);
    define_method(engine, &prototype, "trim", trim);
    define_method(engine, &prototype, "toUpperCase", to_upper_case);
    define_method(engine, &prototype, "toLowerCase", to_lower_case);
    define_method(engine, &prototype, "startsWith", starts_with);
    define_method(engine, &prototype, "endsWith", ends_with);
    define_method(engine, &prototype, "repeat", repeat);
}

fn this_string(engine: &Engine, this: &Value) -> Result<Rc<str>> {
    engine.to_js_string(this)
}

fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}

/// Converts a character offset into a byte offset.
fn byte_offset(s: &str, char_index: usize) -> usize {
    s.char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Converts a byte offset into a character offset.
fn char_offset(s: &str, byte_index: usize) -> usize {
    s[..byte_index].chars().count()
}

// ============================================================================
// String Constructor
// ============================================================================

/// String() constructor - converts value to string.
pub fn string_constructor(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(value) => Ok(Value::String(engine.to_js_string(value)?)),
        None => Ok(Value::from("")),
    }
}

// ============================================================================
// String.prototype
// ============================================================================

/// String.prototype.toString() - Returns the string value.
pub fn to_string(engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::String(this_string(engine, &this)?))
}

/// String.prototype.charAt(pos) - Returns character at position.
pub fn char_at(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let s = this_string(engine, &this)?;
    let pos = engine.to_js_number(&arg(args, 0))?;
    let pos = if pos.is_nan() { 0.0 } else { pos };
    if pos < 0.0 {
        return Ok(Value::from(""));
    }
    Ok(s.chars()
        .nth(pos as usize)
        .map(|c| Value::from(c.to_string()))
        .unwrap_or_else(|| Value::from("")))
}

/// String.prototype.charCodeAt(pos) - Returns the code point at position.
pub fn char_code_at(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let s = this_string(engine, &this)?;
    let pos = engine.to_js_number(&arg(args, 0))?;
    let pos = if pos.is_nan() { 0.0 } else { pos };
    if pos < 0.0 {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(
        s.chars()
            .nth(pos as usize)
            .map(|c| c as u32 as f64)
            .unwrap_or(f64::NAN),
    ))
}

/// String.prototype.indexOf(searchString, position) - Finds first occurrence.
pub fn index_of(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let s = this_string(engine, &this)?;
    let search = engine.to_js_string(&arg(args, 0))?;
    let from = relative_index(engine, &arg(args, 1), s.chars().count(), 0)?;
    let start = byte_offset(&s, from);
    let found = s[start..]
        .find(&*search)
        .map(|i| char_offset(&s, start + i) as f64)
        .unwrap_or(-1.0);
    Ok(Value::Number(found))
}

/// String.prototype.lastIndexOf(searchString) - Finds last occurrence.
pub fn last_index_of(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let s = this_string(engine, &this)?;
    let search = engine.to_js_string(&arg(args, 0))?;
    let found = s
        .rfind(&*search)
        .map(|i| char_offset(&s, i) as f64)
        .unwrap_or(-1.0);
    Ok(Value::Number(found))
}

/// String.prototype.slice(start, end) - Extracts a section.
pub fn slice(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let s = chars(&this_string(engine, &this)?);
    let start = relative_index(engine, &arg(args, 0), s.len(), 0)?;
    let end = relative_index(engine, &arg(args, 1), s.len(), s.len())?;
    if start >= end {
        return Ok(Value::from(""));
    }
    Ok(Value::from(s[start..end].iter().collect::<String>()))
}

/// String.prototype.substring(start, end) - Returns substring; negative
/// offsets clamp to zero and the bounds may be given in either order.
pub fn substring(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let s = chars(&this_string(engine, &this)?);
    let clamp = |value: &Value, default: usize| -> Result<usize> {
        if value.is_undefined() {
            return Ok(default);
        }
        let n = engine.to_js_number(value)?;
        let n = if n.is_nan() { 0.0 } else { n };
        Ok(n.clamp(0.0, s.len() as f64) as usize)
    };
    let a = clamp(&arg(args, 0), 0)?;
    let b = clamp(&arg(args, 1), s.len())?;
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    Ok(Value::from(s[start..end].iter().collect::<String>()))
}

/// String.prototype.split(separator, limit) - Splits string into array.
pub fn split(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let s = this_string(engine, &this)?;
    let limit = match arg(args, 1) {
        Value::Undefined => usize::MAX,
        other => engine.to_js_number(&other)?.max(0.0) as usize,
    };

    let parts: Vec<Value> = match arg(args, 0) {
        Value::Undefined => vec![Value::String(s.clone())],
        separator => {
            let separator = engine.to_js_string(&separator)?;
            if separator.is_empty() {
                s.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                s.split(&*separator).map(Value::from).collect()
            }
        }
    };
    let parts = parts.into_iter().take(limit).collect();
    Ok(Value::Object(engine.new_array(parts)))
}

/// String.prototype.trim() - Removes leading and trailing whitespace.
pub fn trim(engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(this_string(engine, &this)?.trim()))
}

/// String.prototype.toUpperCase()
pub fn to_upper_case(engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(this_string(engine, &this)?.to_uppercase()))
}

/// String.prototype.toLowerCase()
pub fn to_lower_case(engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(this_string(engine, &this)?.to_lowercase()))
}

/// String.prototype.startsWith(searchString)
pub fn starts_with(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let s = this_string(engine, &this)?;
    let search = engine.to_js_string(&arg(args, 0))?;
    Ok(Value::Boolean(s.starts_with(&*search)))
}

/// String.prototype.endsWith(searchString)
pub fn ends_with(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let s = this_string(engine, &this)?;
    let search = engine.to_js_string(&arg(args, 0))?;
    Ok(Value::Boolean(s.ends_with(&*search)))
}

/// String.prototype.repeat(count)
pub fn repeat(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let s = this_string(engine, &this)?;
    let count = engine.to_js_number(&arg(args, 0))?;
    if count < 0.0 || count.is_infinite() {
        return Err(crate::Error::RangeError(format!("Invalid count value: {}", count)));
    }
    let count = if count.is_nan() { 0 } else { count as usize };
    Ok(Value::from(s.repeat(count)))
}

#[cfg(test)]
mod tests {
    use crate::{Engine, Value};

    fn eval(src: &str) -> Value {
        Engine::new().evaluate(src, "test.js").expect("should evaluate")
    }

    #[test]
    fn test_length_and_index() {
        assert_eq!(eval("'héllo'.length"), Value::Number(5.0));
        assert_eq!(eval("'abc'[1]"), Value::from("b"));
        assert_eq!(eval("'abc'.charAt(5)"), Value::from(""));
    }

    #[test]
    fn test_index_of_counts_characters() {
        assert_eq!(eval("'héllo'.indexOf('l')"), Value::Number(2.0));
        assert_eq!(eval("'a/b/c'.lastIndexOf('/')"), Value::Number(3.0));
        assert_eq!(eval("'abc'.indexOf('z')"), Value::Number(-1.0));
        assert_eq!(eval("'abcabc'.indexOf('a', 1)"), Value::Number(3.0));
    }

    #[test]
    fn test_slice_and_substring() {
        assert_eq!(eval("'module.js'.slice(-3)"), Value::from(".js"));
        assert_eq!(eval("'module.js'.slice(0, -3)"), Value::from("module"));
        assert_eq!(eval("'hello'.substring(3, 1)"), Value::from("el"));
    }

    #[test]
    fn test_split() {
        assert_eq!(eval("'a,b,,c'.split(',').length"), Value::Number(4.0));
        assert_eq!(eval("'abc'.split('').join('|')"), Value::from("a|b|c"));
        assert_eq!(eval("'a b c'.split(' ', 2).join()"), Value::from("a,b"));
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(eval("'  Mixed  '.trim().toUpperCase()"), Value::from("MIXED"));
        assert_eq!(eval("'ABC'.toLowerCase()"), Value::from("abc"));
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(eval("String(42)"), Value::from("42"));
        assert_eq!(eval("String(null)"), Value::from("null"));
        assert_eq!(eval("'ab'.repeat(3)"), Value::from("ababab"));
    }
}
