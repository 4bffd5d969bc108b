//! Exact decimal numbers for bound and multiple-of checks.
//!
//! Numbers are kept as `mantissa * 10^-scale`, parsed straight from their
//! textual form, so `1.3` is not a multiple of `0.5` and `1.5` is, without
//! any floating-point drift.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const MAX_SCALE: u32 = 30;

/// A finite decimal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

/// Failure to read a decimal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decimal {0:?}")]
pub struct DecimalError(String);

impl Decimal {
    /// Whether the value is zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.mantissa == 0
    }

    /// Lossy conversion, used when exact comparison overflows.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    fn rescaled(self, scale: u32) -> Option<i128> {
        let factor = 10i128.checked_pow(scale.checked_sub(self.scale)?)?;
        self.mantissa.checked_mul(factor)
    }

    fn aligned(self, other: Self) -> Option<(i128, i128)> {
        let scale = self.scale.max(other.scale);
        Some((self.rescaled(scale)?, other.rescaled(scale)?))
    }

    /// Exact comparison; `None` if aligning the scales overflows.
    #[must_use]
    pub fn compare(self, other: Self) -> Option<Ordering> {
        self.aligned(other).map(|(a, b)| a.cmp(&b))
    }

    /// Whether `self` is an integer multiple of `step`.
    ///
    /// `None` when `step` is zero or the scales cannot be aligned.
    #[must_use]
    pub fn is_multiple_of(self, step: Self) -> Option<bool> {
        if step.is_zero() {
            return None;
        }
        let (value, step) = self.aligned(step)?;
        Some(value % step == 0)
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || DecimalError(s.to_owned());
        let text = s.trim();
        let (number, exponent) = match text.find(['e', 'E']) {
            Some(pos) => (
                &text[..pos],
                text[pos + 1..].parse::<i32>().map_err(|_| err())?,
            ),
            None => (text, 0),
        };
        let (negative, digits) = match number.as_bytes().first() {
            Some(b'-') => (true, &number[1..]),
            Some(b'+') => (false, &number[1..]),
            _ => (false, number),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }

        let mut mantissa: i128 = 0;
        for ch in int_part.chars().chain(frac_part.chars()) {
            let digit = ch.to_digit(10).ok_or_else(err)?;
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(digit)))
                .ok_or_else(err)?;
        }
        if negative {
            mantissa = -mantissa;
        }

        let frac_len = i32::try_from(frac_part.len()).map_err(|_| err())?;
        let scale = frac_len - exponent;
        if scale < 0 {
            let factor = 10i128.checked_pow(scale.unsigned_abs()).ok_or_else(err)?;
            mantissa = mantissa.checked_mul(factor).ok_or_else(err)?;
            return Ok(Self { mantissa, scale: 0 });
        }
        let scale = scale.unsigned_abs();
        if scale > MAX_SCALE {
            return Err(err());
        }
        Ok(Self { mantissa, scale })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        let sign = if self.mantissa < 0 { "-" } else { "" };
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}
