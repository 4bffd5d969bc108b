//! Constraint tags compiled once per field.
//!
//! Recognized tags: `regexp`, `enum`, `default`, `example`, `deprecated`,
//! `lt`, `lte`, `gt`, `gte`, `multiple`, `max`, `min`, `unique`, `desc`.
//! Each is checked against the field type here, at registration, so a
//! numeric bound on a string (or a broken regex) never reaches request time.

use std::cmp::Ordering;

use brisk_model::{FieldType, Tags};
use regex::Regex;
use serde_json::Value;

use crate::convert::parse_scalar;
use crate::decimal::Decimal;
use crate::error::{RegistrationError, Result};

/// A numeric bound as written plus its exact value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericBound {
    /// Tag text, used in messages.
    pub text: String,
    /// Parsed value.
    pub value: Decimal,
}

impl NumericBound {
    /// Compare a JSON number against this bound. Falls back to `f64` when the
    /// number cannot be represented exactly.
    #[must_use]
    pub fn compare(&self, number: &serde_json::Number) -> Option<Ordering> {
        match number.to_string().parse::<Decimal>() {
            Ok(value) => value.compare(self.value),
            Err(_) => number.as_f64()?.partial_cmp(&self.value.to_f64()),
        }
    }
}

/// Allowed values, already converted to the field's scalar type.
#[derive(Debug, Clone, PartialEq)]
pub struct Enumeration {
    /// Tag text, used in messages.
    pub text: String,
    /// Allowed values.
    pub values: Vec<Value>,
}

impl Enumeration {
    /// Whether `value` is one of the allowed values. Numbers compare by value.
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.values.iter().any(|allowed| match (allowed, value) {
            (Value::Number(a), Value::Number(b)) => {
                let bound = NumericBound {
                    text: String::new(),
                    value: match a.to_string().parse() {
                        Ok(d) => d,
                        Err(_) => return a == b,
                    },
                };
                bound.compare(b) == Some(Ordering::Equal)
            }
            _ => allowed == value,
        })
    }
}

/// All constraints declared on one field.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    /// Absent or zero values are rejected.
    pub required: bool,
    /// `regexp`, compiled.
    pub pattern: Option<Regex>,
    /// `enum`.
    pub enumeration: Option<Enumeration>,
    /// `lt`.
    pub lt: Option<NumericBound>,
    /// `lte`.
    pub lte: Option<NumericBound>,
    /// `gt`.
    pub gt: Option<NumericBound>,
    /// `gte`.
    pub gte: Option<NumericBound>,
    /// `multiple`, never zero.
    pub multiple_of: Option<NumericBound>,
    /// `min` length or item count.
    pub min_len: Option<usize>,
    /// `max` length or item count.
    pub max_len: Option<usize>,
    /// `unique`.
    pub unique: bool,
    /// `default`, the raw text substituted when the location is empty.
    pub default: Option<String>,
    /// `example`, documentation only.
    pub example: Option<String>,
    /// `deprecated`, documentation only.
    pub deprecated: bool,
    /// `desc`, documentation only.
    pub description: Option<String>,
}

fn mismatch(field: &str, constraint: &str, ty: &FieldType) -> RegistrationError {
    RegistrationError::ConstraintMismatch {
        field: field.to_owned(),
        constraint: constraint.to_owned(),
        ty: ty.type_name(),
    }
}

fn invalid(field: &str, constraint: &str, value: &str, reason: impl ToString) -> RegistrationError {
    RegistrationError::InvalidConstraint {
        field: field.to_owned(),
        constraint: constraint.to_owned(),
        value: value.to_owned(),
        reason: reason.to_string(),
    }
}

fn parse_flag(field: &str, constraint: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "" | "true" => Ok(true),
        "false" => Ok(false),
        other => Err(invalid(field, constraint, other, "expected true or false")),
    }
}

impl ConstraintSet {
    /// Compile the constraint tags of `field` for its declared type.
    ///
    /// Scalar rules (`lt`..`multiple`, `regexp`, `enum`) on a slice apply to
    /// each element; length rules apply to the value itself.
    pub fn compile(field: &str, ty: &FieldType, tags: &Tags, required: bool) -> Result<Self> {
        let target = ty.deref_optional();
        let elem = match target {
            FieldType::Slice(elem) => elem.deref_optional(),
            other => other,
        };
        let mut set = Self {
            required,
            ..Self::default()
        };

        for (key, value) in tags.iter() {
            match key {
                "lt" | "lte" | "gt" | "gte" | "multiple" => {
                    if !elem.is_numeric() {
                        return Err(mismatch(field, key, ty));
                    }
                    let bound = NumericBound {
                        text: value.trim().to_owned(),
                        value: value.parse().map_err(|e| invalid(field, key, value, e))?,
                    };
                    let slot = match key {
                        "lt" => &mut set.lt,
                        "lte" => &mut set.lte,
                        "gt" => &mut set.gt,
                        "gte" => &mut set.gte,
                        _ => {
                            if bound.value.is_zero() {
                                return Err(invalid(field, key, value, "must not be zero"));
                            }
                            &mut set.multiple_of
                        }
                    };
                    *slot = Some(bound);
                }
                "min" | "max" => {
                    if !target.has_length() {
                        return Err(mismatch(field, key, ty));
                    }
                    let n = value
                        .trim()
                        .parse::<usize>()
                        .map_err(|e| invalid(field, key, value, e))?;
                    if key == "min" {
                        set.min_len = Some(n);
                    } else {
                        set.max_len = Some(n);
                    }
                }
                "regexp" => {
                    if !matches!(elem, FieldType::String) {
                        return Err(mismatch(field, key, ty));
                    }
                    set.pattern = Some(Regex::new(value).map_err(|e| invalid(field, key, value, e))?);
                }
                "enum" => {
                    if !elem.is_scalar() {
                        return Err(mismatch(field, key, ty));
                    }
                    let values = value
                        .split(',')
                        .map(|item| parse_scalar(item.trim(), elem))
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(|v| invalid(field, key, value, format!("{v:?}")))?;
                    set.enumeration = Some(Enumeration {
                        text: value.to_owned(),
                        values,
                    });
                }
                "unique" => {
                    if !matches!(target, FieldType::Slice(_)) {
                        return Err(mismatch(field, key, ty));
                    }
                    set.unique = parse_flag(field, key, value)?;
                }
                "default" => {
                    if !elem.is_scalar() {
                        return Err(mismatch(field, key, ty));
                    }
                    for item in value.split(',') {
                        parse_scalar(item.trim(), elem)
                            .map_err(|v| invalid(field, key, value, format!("{v:?}")))?;
                    }
                    set.default = Some(value.to_owned());
                }
                "example" => set.example = Some(value.to_owned()),
                "deprecated" => set.deprecated = parse_flag(field, key, value)?,
                "desc" => set.description = Some(value.to_owned()),
                _ => {}
            }
        }

        Ok(set)
    }

    /// Whether any request-time check is declared besides `required`.
    #[must_use]
    pub fn has_checks(&self) -> bool {
        self.pattern.is_some()
            || self.enumeration.is_some()
            || self.lt.is_some()
            || self.lte.is_some()
            || self.gt.is_some()
            || self.gte.is_some()
            || self.multiple_of.is_some()
            || self.min_len.is_some()
            || self.max_len.is_some()
            || self.unique
    }
}
