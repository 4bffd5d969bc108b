//! Scalar coercion from raw request strings and checks on decoded JSON.

use brisk_model::{Bits, FieldType};
use serde_json::{Number, Value};

use crate::violation::Violation;

fn parse_error(raw: &str, ty: &FieldType) -> Violation {
    Violation::Parse {
        expected: ty.type_name(),
        input: raw.to_owned(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_int(raw: &str, bits: Bits) -> Option<i64> {
    match bits {
        Bits::B8 => raw.parse::<i8>().ok().map(i64::from),
        Bits::B16 => raw.parse::<i16>().ok().map(i64::from),
        Bits::B32 => raw.parse::<i32>().ok().map(i64::from),
        Bits::B64 => raw.parse::<i64>().ok(),
    }
}

fn parse_uint(raw: &str, bits: Bits) -> Option<u64> {
    match bits {
        Bits::B8 => raw.parse::<u8>().ok().map(u64::from),
        Bits::B16 => raw.parse::<u16>().ok().map(u64::from),
        Bits::B32 => raw.parse::<u32>().ok().map(u64::from),
        Bits::B64 => raw.parse::<u64>().ok(),
    }
}

fn parse_float(raw: &str, bits: Bits) -> Option<Number> {
    let narrow_ok = match bits {
        Bits::B32 => raw.parse::<f32>().is_ok_and(f32::is_finite),
        _ => true,
    };
    let wide = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if narrow_ok { Number::from_f64(wide) } else { None }
}

/// Convert one raw string to a JSON scalar of type `ty`, using the parser for
/// the declared width.
///
/// `ty` may be wrapped in `Optional`; strings and `Any` are taken verbatim.
pub fn parse_scalar(raw: &str, ty: &FieldType) -> Result<Value, Violation> {
    let target = ty.deref_optional();
    let value = match target {
        FieldType::Bool => parse_bool(raw).map(Value::Bool),
        FieldType::Int(bits) => parse_int(raw, *bits).map(Value::from),
        FieldType::Uint(bits) => parse_uint(raw, *bits).map(Value::from),
        FieldType::Float(bits) => parse_float(raw, *bits).map(Value::Number),
        FieldType::String | FieldType::Any => Some(Value::String(raw.to_owned())),
        _ => None,
    };
    value.ok_or_else(|| parse_error(raw, target))
}

/// Convert raw location values for `ty`.
///
/// A slice target splits every raw value on commas and yields an array;
/// otherwise the first raw value is converted.
pub fn parse_location(raw: &[&str], ty: &FieldType) -> Result<Value, Violation> {
    match ty.deref_optional() {
        FieldType::Slice(elem) => raw
            .iter()
            .flat_map(|value| value.split(','))
            .map(|item| parse_scalar(item.trim(), elem))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => parse_scalar(raw.first().copied().unwrap_or_default(), ty),
    }
}

/// Check that a decoded JSON scalar fits the declared type.
pub fn check_json_scalar(value: &Value, ty: &FieldType) -> Result<(), Violation> {
    let ok = match (ty.deref_optional(), value) {
        (FieldType::Bool, Value::Bool(_)) | (FieldType::String, Value::String(_)) => true,
        (FieldType::Int(bits), Value::Number(n)) => n
            .as_i64()
            .is_some_and(|v| parse_int(&v.to_string(), *bits).is_some()),
        (FieldType::Uint(bits), Value::Number(n)) => n
            .as_u64()
            .is_some_and(|v| parse_uint(&v.to_string(), *bits).is_some()),
        (FieldType::Float(_), Value::Number(_)) | (FieldType::Any, _) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(parse_error(&value.to_string(), ty.deref_optional()))
    }
}

/// The zero value of a declared type, or `None` if the type has no JSON zero
/// (optionals, structs, files, bytes).
#[must_use]
pub fn zero_value(ty: &FieldType) -> Option<Value> {
    match ty {
        FieldType::Bool => Some(Value::Bool(false)),
        FieldType::Int(_) | FieldType::Uint(_) => Some(Value::from(0)),
        FieldType::Float(_) => Some(Value::from(0.0)),
        FieldType::String => Some(Value::String(String::new())),
        FieldType::Slice(_) => Some(Value::Array(Vec::new())),
        FieldType::Map(_) => Some(Value::Object(serde_json::Map::new())),
        FieldType::Any => Some(Value::Null),
        _ => None,
    }
}

/// Whether a decoded value equals its type's zero value.
#[must_use]
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
