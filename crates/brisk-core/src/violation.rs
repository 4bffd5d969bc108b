//! Request-time validation failures.

use std::fmt;

use http::StatusCode;

use crate::locale::{English, Localizer};

/// What went wrong with one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Required value absent or zero.
    Required,
    /// Raw value could not be converted to the declared type.
    Parse {
        /// Expected type name.
        expected: String,
        /// Raw input.
        input: String,
    },
    /// Not strictly less than the bound.
    Lt(String),
    /// Greater than the bound.
    Lte(String),
    /// Not strictly greater than the bound.
    Gt(String),
    /// Less than the bound.
    Gte(String),
    /// Not a multiple of the step.
    MultipleOf(String),
    /// Shorter than the minimum length or item count.
    MinLength(usize),
    /// Longer than the maximum length or item count.
    MaxLength(usize),
    /// Does not match the pattern.
    Pattern(String),
    /// Not one of the allowed values (as written in the tag).
    Enum(String),
    /// Collection contains duplicates.
    Unique,
    /// Request content type has no codec for this body.
    UnsupportedMediaType(String),
    /// Body could not be decoded.
    MalformedBody(String),
}

impl Violation {
    /// Stable key used to look up message templates.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Parse { .. } => "parse",
            Self::Lt(_) => "lt",
            Self::Lte(_) => "lte",
            Self::Gt(_) => "gt",
            Self::Gte(_) => "gte",
            Self::MultipleOf(_) => "multiple",
            Self::MinLength(_) => "min",
            Self::MaxLength(_) => "max",
            Self::Pattern(_) => "regexp",
            Self::Enum(_) => "enum",
            Self::Unique => "unique",
            Self::UnsupportedMediaType(_) => "media",
            Self::MalformedBody(_) => "malformed",
        }
    }

    /// The `{value}` placeholder: the bound, limit or expectation involved.
    #[must_use]
    pub fn value(&self) -> String {
        match self {
            Self::Required | Self::Unique => String::new(),
            Self::Parse { expected, .. } => expected.clone(),
            Self::Lt(v)
            | Self::Lte(v)
            | Self::Gt(v)
            | Self::Gte(v)
            | Self::MultipleOf(v)
            | Self::Pattern(v)
            | Self::Enum(v)
            | Self::UnsupportedMediaType(v)
            | Self::MalformedBody(v) => v.clone(),
            Self::MinLength(n) | Self::MaxLength(n) => n.to_string(),
        }
    }

    /// The `{input}` placeholder: the raw value that failed, when known.
    #[must_use]
    pub fn input(&self) -> &str {
        match self {
            Self::Parse { input, .. } => input,
            _ => "",
        }
    }
}

/// A violation attached to the field that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Location key or dotted body path of the offending field.
    pub field: String,
    /// What went wrong.
    pub violation: Violation,
}

impl ValidationError {
    /// Create an error for `field`.
    #[must_use]
    pub fn new(field: impl Into<String>, violation: Violation) -> Self {
        Self {
            field: field.into(),
            violation,
        }
    }

    /// Shorthand for a required-field error.
    #[must_use]
    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, Violation::Required)
    }

    /// Response status: 415 for media type mismatches, otherwise `validation`.
    #[must_use]
    pub fn status(&self, validation: StatusCode) -> StatusCode {
        match self.violation {
            Violation::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => validation,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&English.render(None, self))
    }
}

impl std::error::Error for ValidationError {}
