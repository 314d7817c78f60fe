//! Expansion of a single parameter specification into its values.
//!
//! A specification is one of:
//! - a scalar token (`0.1`, `7`, `square`) giving one value,
//! - a `;`-separated list of tokens (`1;2;5`),
//! - a slice `start:stop` or `start:step:stop` with inclusive bounds.
//!
//! List entries may themselves be slices, so `1:3;10` yields `1, 2, 3, 10`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::core::TeazerError;

/// Upper bound on the number of values a single slice may produce.
const MAX_SLICE_LEN: usize = 1_000_000;

/// Decimal places kept when a slice produces fractional values.
///
/// `0.1 + 2 * 0.1` is not exactly `0.3`; rounding keeps directory names and
/// command lines free of representation noise.
const SLICE_DECIMALS: i32 = 12;

/// One concrete parameter value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integral number
    Int(i64),
    /// Non-integral number
    Float(f64),
    /// Anything that is not a number
    Text(String),
}

impl ParamValue {
    /// Parse a scalar token, preferring integers over floats over text.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if let Ok(i) = token.parse::<i64>() {
            return Self::Int(i);
        }
        if token.bytes().any(|b| b.is_ascii_digit())
            && let Ok(f) = token.parse::<f64>()
        {
            return Self::Float(f);
        }
        Self::Text(token.to_string())
    }

    /// Numeric view of the value, if it has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

// Numbers order numerically across Int/Float and before text; `2` and
// `2.0` are the same value.
impl Ord for ParamValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => match (self, other) {
                (Self::Text(a), Self::Text(b)) => a.cmp(b),
                _ => Ordering::Equal,
            },
        }
    }
}

impl PartialOrd for ParamValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ParamValue {}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// Whether a raw specification expands to more than one value without
/// actually expanding it.
#[must_use]
pub fn is_ranged(raw: &str) -> bool {
    raw.contains(';') || raw.contains(':')
}

/// Expand the raw specification of parameter `key` into its ordered values.
///
/// # Errors
///
/// Returns [`TeazerError::MalformedRange`] for an empty specification, an
/// empty list entry, a slice with non-numeric bounds or a zero step, or a
/// slice that produces no values.
pub fn expand_range(key: &str, raw: &str) -> Result<Vec<ParamValue>, TeazerError> {
    let malformed = |reason: &str| TeazerError::MalformedRange {
        key: key.to_string(),
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(malformed("empty value"));
    }

    // A trailing separator ("1;2;") is tolerated.
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);

    let mut values = Vec::new();
    for token in body.split(';') {
        let token = token.trim();
        if token.is_empty() {
            return Err(malformed("empty list entry"));
        }
        if token.contains(':') {
            values.extend(expand_slice(token).map_err(|reason| malformed(&reason))?);
        } else {
            values.push(ParamValue::parse(token));
        }
    }

    Ok(values)
}

fn expand_slice(token: &str) -> Result<Vec<ParamValue>, String> {
    let parts: Vec<&str> = token.split(':').map(str::trim).collect();
    let bound = |s: &str| -> Result<f64, String> {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| format!("non-numeric bound '{s}'"))
    };

    let (start, step, stop) = match parts.as_slice() {
        [start, stop] => (bound(start)?, 1.0, bound(stop)?),
        [start, step, stop] => (bound(start)?, bound(step)?, bound(stop)?),
        _ => return Err("slice must be start:stop or start:step:stop".to_string()),
    };

    if step == 0.0 {
        return Err("step must not be zero".to_string());
    }

    let span = (stop - start) / step;
    if span < -1e-9 {
        return Err("slice produces no values".to_string());
    }
    let count = (span + 1e-9).floor() as usize + 1;
    if count > MAX_SLICE_LEN {
        return Err(format!("slice produces more than {MAX_SLICE_LEN} values"));
    }

    let integral = start.fract() == 0.0 && step.fract() == 0.0;
    let scale = 10f64.powi(SLICE_DECIMALS);

    Ok((0..count)
        .map(|i| {
            let x = start + i as f64 * step;
            if integral {
                ParamValue::Int(x as i64)
            } else {
                let rounded = (x * scale).round() / scale;
                if rounded.fract() == 0.0 {
                    ParamValue::Int(rounded as i64)
                } else {
                    ParamValue::Float(rounded)
                }
            }
        })
        .collect())
}
