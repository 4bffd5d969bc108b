//! The validator.
//!
//! Numeric checks run in the order lt, lte, gt, gte, multiple-of, enum.
//! String and collection checks run in the order min/max length, pattern,
//! enum, unique. Scalar rules on a slice apply to each element. The first
//! failure wins.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::Value;

use crate::constraint::{ConstraintSet, NumericBound};
use crate::convert::{check_json_scalar, is_zero};
use crate::decimal::Decimal;
use crate::descriptor::BodyNode;
use crate::violation::{ValidationError, Violation};

type Result<T = ()> = std::result::Result<T, ValidationError>;

fn fail(field: &str, violation: Violation) -> Result {
    Err(ValidationError::new(field, violation))
}

/// Check a length (bytes of a string, items of a collection) against
/// `min`/`max`.
pub fn validate_length(field: &str, len: usize, constraints: &ConstraintSet) -> Result {
    if let Some(min) = constraints.min_len {
        if len < min {
            return fail(field, Violation::MinLength(min));
        }
    }
    if let Some(max) = constraints.max_len {
        if len > max {
            return fail(field, Violation::MaxLength(max));
        }
    }
    Ok(())
}

fn is_multiple(number: &serde_json::Number, step: &NumericBound) -> bool {
    match number.to_string().parse::<Decimal>() {
        Ok(value) => value.is_multiple_of(step.value).unwrap_or(false),
        Err(_) => number.as_f64().is_some_and(|v| {
            let quotient = v / step.value.to_f64();
            (quotient - quotient.round()).abs() < 1e-9
        }),
    }
}

fn validate_number(field: &str, number: &serde_json::Number, c: &ConstraintSet) -> Result {
    if let Some(bound) = &c.lt {
        if bound.compare(number) != Some(Ordering::Less) {
            return fail(field, Violation::Lt(bound.text.clone()));
        }
    }
    if let Some(bound) = &c.lte {
        if !matches!(bound.compare(number), Some(Ordering::Less | Ordering::Equal)) {
            return fail(field, Violation::Lte(bound.text.clone()));
        }
    }
    if let Some(bound) = &c.gt {
        if bound.compare(number) != Some(Ordering::Greater) {
            return fail(field, Violation::Gt(bound.text.clone()));
        }
    }
    if let Some(bound) = &c.gte {
        if !matches!(bound.compare(number), Some(Ordering::Greater | Ordering::Equal)) {
            return fail(field, Violation::Gte(bound.text.clone()));
        }
    }
    if let Some(step) = &c.multiple_of {
        if !is_multiple(number, step) {
            return fail(field, Violation::MultipleOf(step.text.clone()));
        }
    }
    Ok(())
}

fn validate_enum(field: &str, value: &Value, c: &ConstraintSet) -> Result {
    match &c.enumeration {
        Some(allowed) if !allowed.contains(value) => {
            fail(field, Violation::Enum(allowed.text.clone()))
        }
        _ => Ok(()),
    }
}

/// Apply the scalar rules (bounds, multiple-of, pattern, enum) to one value.
pub fn validate_scalar(field: &str, value: &Value, c: &ConstraintSet) -> Result {
    match value {
        Value::Number(number) => validate_number(field, number, c)?,
        Value::String(s) => {
            if let Some(pattern) = &c.pattern {
                if !pattern.is_match(s) {
                    return fail(field, Violation::Pattern(pattern.as_str().to_owned()));
                }
            }
        }
        _ => {}
    }
    validate_enum(field, value, c)
}

/// Apply every declared constraint to a decoded value.
pub fn validate_value(field: &str, value: &Value, c: &ConstraintSet) -> Result {
    if !c.has_checks() {
        return Ok(());
    }
    match value {
        Value::Null => Ok(()),
        Value::String(s) => {
            validate_length(field, s.len(), c)?;
            validate_scalar(field, value, c)
        }
        Value::Array(items) => {
            validate_length(field, items.len(), c)?;
            for item in items {
                validate_scalar(field, item, c)?;
            }
            if c.unique && has_duplicates(items) {
                return fail(field, Violation::Unique);
            }
            Ok(())
        }
        Value::Object(map) => validate_length(field, map.len(), c),
        Value::Bool(_) | Value::Number(_) => validate_scalar(field, value, c),
    }
}

fn has_duplicates(items: &[Value]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    !items.iter().all(|item| seen.insert(canonical(item)))
}

fn canonical(value: &Value) -> String {
    match value {
        Value::Number(n) => n
            .to_string()
            .parse::<Decimal>()
            .map_or_else(|_| n.to_string(), |d| normalize(&d.to_string())),
        other => other.to_string(),
    }
}

fn normalize(decimal: &str) -> String {
    if decimal.contains('.') {
        decimal
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_owned()
    } else {
        decimal.to_owned()
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}.{key}")
    }
}

fn type_error(field: &str, expected: &str, value: &Value) -> Result {
    fail(
        field,
        Violation::Parse {
            expected: expected.to_owned(),
            input: value.to_string(),
        },
    )
}

/// Walk a decoded body: check every leaf's type, every struct field's
/// required flag, and every struct field's own constraints.
///
/// Field names in errors are dotted wire names rooted at `path`.
pub fn validate_body(path: &str, value: &Value, node: &BodyNode) -> Result {
    match node {
        BodyNode::Optional(inner) => {
            if value.is_null() {
                Ok(())
            } else {
                validate_body(path, value, inner)
            }
        }
        BodyNode::Scalar(ty) => {
            check_json_scalar(value, ty).map_err(|v| ValidationError::new(path, v))
        }
        BodyNode::Any | BodyNode::Bytes => Ok(()),
        BodyNode::Slice(elem) => {
            let Value::Array(items) = value else {
                return type_error(path, "array", value);
            };
            for (idx, item) in items.iter().enumerate() {
                validate_body(&format!("{path}[{idx}]"), item, elem)?;
            }
            Ok(())
        }
        BodyNode::Map(elem) => {
            let Value::Object(map) = value else {
                return type_error(path, "object", value);
            };
            for (key, item) in map {
                validate_body(&join(path, key), item, elem)?;
            }
            Ok(())
        }
        BodyNode::Struct(fields) => {
            let Value::Object(map) = value else {
                return type_error(path, "object", value);
            };
            for field in fields {
                let name = join(path, &field.wire);
                match map.get(&field.name) {
                    None | Some(Value::Null) => {
                        if field.constraints.required {
                            return fail(&name, Violation::Required);
                        }
                    }
                    Some(item) => {
                        if field.constraints.required && is_zero(item) {
                            return fail(&name, Violation::Required);
                        }
                        validate_body(&name, item, &field.node)?;
                        validate_value(&name, item, &field.constraints)?;
                    }
                }
            }
            Ok(())
        }
    }
}
