//! Number, Boolean and Math built-ins, plus the numeric global functions.

use super::{arg, define_constructor, define_method};
use crate::runtime::value::{Value, number_to_string};
use crate::{Engine, Error, Result};

pub(crate) fn install(engine: &Engine) {
    let global = engine.global();

    let prototype = engine.intrinsics().number_prototype.clone();
    define_constructor(engine, "Number", number_constructor, &prototype);
    define_method(engine, &prototype, "toString", to_string);
    define_method(engine, &prototype, "toFixed", to_fixed);
    define_method(engine, &prototype, "valueOf", value_of);

    let prototype = engine.intrinsics().boolean_prototype.clone();
    define_constructor(engine, "Boolean", boolean_constructor, &prototype);
    define_method(engine, &prototype, "toString", boolean_to_string);

    define_method(engine, &global, "parseInt", parse_int);
    define_method(engine, &global, "parseFloat", parse_float);
    define_method(engine, &global, "isNaN", is_nan);

    let math = engine.new_object();
    define_method(engine, &math, "floor", |e, _, a| unary_math(e, a, f64::floor));
    define_method(engine, &math, "ceil", |e, _, a| unary_math(e, a, f64::ceil));
    define_method(engine, &math, "round", |e, _, a| unary_math(e, a, |n| (n + 0.5).floor()));
    define_method(engine, &math, "abs", |e, _, a| unary_math(e, a, f64::abs));
    define_method(engine, &math, "sqrt", |e, _, a| unary_math(e, a, f64::sqrt));
    define_method(engine, &math, "max", math_max);
    define_method(engine, &math, "min", math_min);
    define_method(engine, &math, "pow", math_pow);
    global.define_hidden("Math", Value::Object(math));
}

// ============================================================================
// Number
// ============================================================================

/// Number() constructor - converts value to number.
pub fn number_constructor(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(value) => Ok(Value::Number(engine.to_js_number(value)?)),
        None => Ok(Value::Number(0.0)),
    }
}

fn this_number(this: &Value, method: &str) -> Result<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        _ => Err(Error::TypeError(format!(
            "Number.prototype.{} requires that 'this' be a Number",
            method
        ))),
    }
}

/// Number.prototype.toString(radix)
pub fn to_string(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let n = this_number(&this, "toString")?;
    let radix = match arg(args, 0) {
        Value::Undefined => 10,
        other => engine.to_js_number(&other)? as u32,
    };
    if !(2..=36).contains(&radix) {
        return Err(Error::RangeError(
            "toString() radix must be between 2 and 36".to_string(),
        ));
    }
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
        return Ok(Value::from(number_to_string(n)));
    }

    // Integral values in other radixes
    let mut digits = Vec::new();
    let mut rest = n.abs() as u64;
    loop {
        digits.push(std::char::from_digit((rest % radix as u64) as u32, radix).unwrap_or('0'));
        rest /= radix as u64;
        if rest == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    Ok(Value::from(digits.iter().rev().collect::<String>()))
}

/// Number.prototype.toFixed(digits)
pub fn to_fixed(engine: &Engine, this: Value, args: &[Value]) -> Result<Value> {
    let n = this_number(&this, "toFixed")?;
    let digits = engine.to_js_number(&arg(args, 0))?;
    let digits = if digits.is_nan() { 0.0 } else { digits };
    if !(0.0..=100.0).contains(&digits) {
        return Err(Error::RangeError(
            "toFixed() digits argument must be between 0 and 100".to_string(),
        ));
    }
    if !n.is_finite() {
        return Ok(Value::from(number_to_string(n)));
    }
    Ok(Value::from(format!("{:.*}", digits as usize, n)))
}

/// Number.prototype.valueOf()
pub fn value_of(_engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(this_number(&this, "valueOf")?))
}

// ============================================================================
// Boolean
// ============================================================================

/// Boolean() constructor - converts value to boolean.
pub fn boolean_constructor(_engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(arg(args, 0).to_boolean()))
}

/// Boolean.prototype.toString()
pub fn boolean_to_string(_engine: &Engine, this: Value, _args: &[Value]) -> Result<Value> {
    match this {
        Value::Boolean(b) => Ok(Value::from(b.to_string())),
        _ => Err(Error::TypeError(
            "Boolean.prototype.toString requires that 'this' be a Boolean".to_string(),
        )),
    }
}

// ============================================================================
// Global functions
// ============================================================================

/// parseInt(string, radix)
pub fn parse_int(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let input = engine.to_js_string(&arg(args, 0))?;
    let mut s = input.trim_start();

    let negative = s.starts_with('-');
    if negative || s.starts_with('+') {
        s = &s[1..];
    }

    let mut radix = match arg(args, 1) {
        Value::Undefined => 0,
        other => engine.to_js_number(&other)? as u32,
    };
    if radix != 0 && !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    if (radix == 0 || radix == 16) && (s.starts_with("0x") || s.starts_with("0X")) {
        s = &s[2..];
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }

    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    let value = digits.chars().fold(0.0, |acc, c| {
        acc * radix as f64 + c.to_digit(radix).unwrap_or(0) as f64
    });
    Ok(Value::Number(if negative { -value } else { value }))
}

/// parseFloat(string)
pub fn parse_float(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let input = engine.to_js_string(&arg(args, 0))?;
    let s = input.trim_start();

    let unsigned = s.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") {
        let sign = if s.starts_with('-') { -1.0 } else { 1.0 };
        return Ok(Value::Number(sign * f64::INFINITY));
    }

    // Longest prefix that parses as a decimal literal
    let candidate: String = s
        .char_indices()
        .take_while(|(i, c)| {
            c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E') || (matches!(c, '+' | '-') && (*i == 0 || matches!(s.as_bytes()[i - 1], b'e' | b'E')))
        })
        .map(|(_, c)| c)
        .collect();
    let value = (1..=candidate.len())
        .rev()
        .find_map(|end| candidate[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN);
    Ok(Value::Number(value))
}

/// isNaN(value)
pub fn is_nan(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(engine.to_js_number(&arg(args, 0))?.is_nan()))
}

// ============================================================================
// Math
// ============================================================================

fn unary_math(engine: &Engine, args: &[Value], f: fn(f64) -> f64) -> Result<Value> {
    Ok(Value::Number(f(engine.to_js_number(&arg(args, 0))?)))
}

fn numbers(engine: &Engine, args: &[Value]) -> Result<Vec<f64>> {
    args.iter().map(|a| engine.to_js_number(a)).collect()
}

/// Math.max(...values)
pub fn math_max(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let values = numbers(engine, args)?;
    if values.iter().any(|n| n.is_nan()) {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(values.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}

/// Math.min(...values)
pub fn math_min(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let values = numbers(engine, args)?;
    if values.iter().any(|n| n.is_nan()) {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(values.into_iter().fold(f64::INFINITY, f64::min)))
}

/// Math.pow(base, exponent)
pub fn math_pow(engine: &Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let base = engine.to_js_number(&arg(args, 0))?;
    let exponent = engine.to_js_number(&arg(args, 1))?;
    Ok(Value::Number(base.powf(exponent)))
}

#[cfg(test)]
mod tests {
    use crate::{Engine, Value};

    fn eval(src: &str) -> Value {
        Engine::new().evaluate(src, "test.js").expect("should evaluate")
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(eval("parseInt('42px')"), Value::Number(42.0));
        assert_eq!(eval("parseInt('  -17')"), Value::Number(-17.0));
        assert_eq!(eval("parseInt('0x1f')"), Value::Number(31.0));
        assert_eq!(eval("parseInt('101', 2)"), Value::Number(5.0));
        assert_eq!(eval("isNaN(parseInt('abc'))"), Value::Boolean(true));
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(eval("parseFloat('3.25abc')"), Value::Number(3.25));
        assert_eq!(eval("parseFloat('1e3')"), Value::Number(1000.0));
        assert_eq!(eval("parseFloat('-Infinity')"), Value::Number(f64::NEG_INFINITY));
        assert_eq!(eval("isNaN(parseFloat('.'))"), Value::Boolean(true));
    }

    #[test]
    fn test_number_conversion() {
        assert_eq!(eval("Number('12')"), Value::Number(12.0));
        assert_eq!(eval("Number('')"), Value::Number(0.0));
        assert_eq!(eval("isNaN(Number('x'))"), Value::Boolean(true));
        assert_eq!(eval("(255).toString(16)"), Value::from("ff"));
        assert_eq!(eval("(1.005).toFixed(1)"), Value::from("1.0"));
    }

    #[test]
    fn test_math() {
        assert_eq!(eval("Math.max(1, 5, 3)"), Value::Number(5.0));
        assert_eq!(eval("Math.min()"), Value::Number(f64::INFINITY));
        assert_eq!(eval("Math.floor(-1.5)"), Value::Number(-2.0));
        assert_eq!(eval("Math.round(2.5)"), Value::Number(3.0));
    }
}
