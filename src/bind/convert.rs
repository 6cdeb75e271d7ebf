//! Purpose: Lenient scalar conversions from parsed values to member types.
//! Exports: `to_i128`, `to_f64`, `to_bool`, `to_text`, `value_to_var`.
//! Role: The general-purpose conversion fallback at the end of the change-type chain.
//! Invariants: Null converts to the zero of numeric targets; containers never convert to scalars.
//! Invariants: Fractional sources truncate toward zero for integer targets.

use crate::error::{Error, ErrorKind};
use crate::value::Value;
use crate::var::Var;

pub(crate) fn to_i128(value: &Value) -> Result<i128, Error> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(flag) => Ok(*flag as i128),
        Value::I32(number) => Ok(*number as i128),
        Value::I64(number) => Ok(*number as i128),
        Value::Decimal(number) => Ok(number.truncated()),
        Value::F64(number) => {
            if number.is_finite() {
                Ok(number.trunc() as i128)
            } else {
                Err(mismatch(value, "integer"))
            }
        }
        Value::Str(text) => {
            let trimmed = text.trim();
            if let Ok(wide) = trimmed.parse::<i128>() {
                return Ok(wide);
            }
            if let Ok(float) = trimmed.parse::<f64>()
                && float.is_finite()
            {
                return Ok(float.trunc() as i128);
            }
            Err(mismatch(value, "integer"))
        }
        Value::Array(_) | Value::Object(_) => Err(mismatch(value, "integer")),
    }
}

pub(crate) fn to_f64(value: &Value) -> Result<f64, Error> {
    match value {
        Value::Null => Ok(0.0),
        Value::Bool(flag) => Ok(*flag as u8 as f64),
        Value::I32(number) => Ok(*number as f64),
        Value::I64(number) => Ok(*number as f64),
        Value::Decimal(number) => Ok(number.to_f64()),
        Value::F64(number) => Ok(*number),
        Value::Str(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| mismatch(value, "float")),
        Value::Array(_) | Value::Object(_) => Err(mismatch(value, "float")),
    }
}

pub(crate) fn to_bool(value: &Value) -> Result<bool, Error> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(flag) => Ok(*flag),
        Value::I32(number) => Ok(*number != 0),
        Value::I64(number) => Ok(*number != 0),
        Value::Decimal(number) => Ok(!number.is_zero()),
        Value::F64(number) => Ok(*number != 0.0),
        Value::Str(text) => {
            let trimmed = text.trim();
            if trimmed.eq_ignore_ascii_case("true") {
                Ok(true)
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(false)
            } else {
                Err(mismatch(value, "bool"))
            }
        }
        Value::Array(_) | Value::Object(_) => Err(mismatch(value, "bool")),
    }
}

pub(crate) fn to_text(value: &Value) -> Result<String, Error> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::I32(number) => Ok(number.to_string()),
        Value::I64(number) => Ok(number.to_string()),
        Value::Decimal(number) => Ok(number.to_string()),
        Value::F64(number) => Ok(number.to_string()),
        Value::Str(text) => Ok(text.clone()),
        Value::Array(_) | Value::Object(_) => Err(mismatch(value, "string")),
    }
}

/// Identity pass-through of a parsed value into the writer's dynamic form.
pub(crate) fn value_to_var(value: &Value) -> Var {
    match value {
        Value::Null => Var::Null,
        Value::Bool(flag) => Var::Bool(*flag),
        Value::I32(number) => Var::I32(*number),
        Value::I64(number) => Var::I64(*number),
        Value::Decimal(number) => Var::Decimal(*number),
        Value::F64(number) => Var::F64(*number),
        Value::Str(text) => Var::Str(text.clone()),
        Value::Array(items) => Var::List(items.iter().map(value_to_var).collect()),
        Value::Object(map) => Var::Map(
            map.iter()
                .map(|(key, value)| (key.to_string(), value_to_var(value)))
                .collect(),
        ),
    }
}

fn mismatch(value: &Value, target: &str) -> Error {
    Error::new(ErrorKind::Conversion)
        .with_message(format!("cannot convert {} to {target}", value.kind_name()))
}
