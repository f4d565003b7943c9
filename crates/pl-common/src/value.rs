//! Row value model.
//!
//! Rows arrive from the surrounding dataset engine as ordered sequences of
//! [`Value`]s. A missing value is [`Value::Null`]; the encoder decides whether
//! it becomes an empty field or a configured default.

use crate::error::{Error, Result};
use crate::schema::ColumnType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row of a partition.
pub type Row = Vec<Value>;

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    /// Pre-formatted `YYYY-MM-DD` text.
    Date(String),
    /// Pre-formatted `YYYY-MM-DD hh:mm:ss[.fff]` text.
    DateTime(String),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
        }
    }

    /// Convert a JSON value into a [`Value`] for a column of category `ty`.
    ///
    /// Decimal columns accept both JSON numbers and JSON strings so callers can
    /// carry more precision than an `f64` holds.
    pub fn from_json(json: &serde_json::Value, ty: ColumnType) -> Result<Value> {
        use serde_json::Value as Json;
        Ok(match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) if ty == ColumnType::Decimal => {
                Value::Decimal(Decimal::parse(&n.to_string())?)
            }
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) if ty == ColumnType::Decimal => Value::Decimal(Decimal::parse(s)?),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => {
                let element_ty = match ty {
                    ColumnType::ArrayOfString => ColumnType::String,
                    _ => ColumnType::Other,
                };
                Value::Array(
                    items
                        .iter()
                        .map(|item| Value::from_json(item, element_ty))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            Json::Object(_) => Value::String(json.to_string()),
        })
    }
}

/// Default text representation, used for columns rendered verbatim.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) if x.is_nan() => f.write_str("nan"),
            Value::Float(x) => write!(f, "{}", x),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) | Value::Date(s) | Value::DateTime(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Exact decimal number.
///
/// Stored as an unscaled digit string plus a scale, so `10.50` keeps its
/// trailing zero. Rendering never uses exponent notation or grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Decimal {
    negative: bool,
    /// Unscaled magnitude, no leading zeros (`"0"` for zero).
    digits: String,
    scale: i64,
}

/// Largest accepted exponent magnitude in exponent notation.
pub const MAX_DECIMAL_EXPONENT: i64 = 1000;

impl Decimal {
    /// Parse plain (`-12.340`) or exponent (`1.234E+1`) notation.
    ///
    /// Exponents beyond [`MAX_DECIMAL_EXPONENT`] are rejected, which keeps the
    /// rendered text proportional to the input.
    pub fn parse(text: &str) -> Result<Decimal> {
        let invalid = || Error::InvalidDecimal(text.to_string());
        let s = text.trim();
        let (negative, s) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (mantissa, exponent) = match s.find(['e', 'E']) {
            Some(pos) => {
                let exp: i64 = s[pos + 1..].parse().map_err(|_| invalid())?;
                if !(-MAX_DECIMAL_EXPONENT..=MAX_DECIMAL_EXPONENT).contains(&exp) {
                    return Err(invalid());
                }
                (&s[..pos], exp)
            }
            None => (s, 0),
        };
        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let raw: String = format!("{}{}", int_part, frac_part);
        let trimmed = raw.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        let scale = i64::try_from(frac_part.len())
            .ok()
            .and_then(|len| len.checked_sub(exponent))
            .ok_or_else(invalid)?;
        Ok(Decimal {
            negative: negative && digits != "0",
            digits: digits.to_string(),
            scale,
        })
    }

    /// Number of digits after the decimal point (may be negative).
    pub fn scale(&self) -> i64 {
        self.scale
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        if self.scale <= 0 {
            f.write_str(&self.digits)?;
            if self.digits != "0" {
                for _ in 0..(-self.scale) {
                    f.write_str("0")?;
                }
            }
            return Ok(());
        }
        let scale = self.scale as usize;
        let padded = if self.digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - self.digits.len()), self.digits)
        } else {
            self.digits.clone()
        };
        let split = padded.len() - scale;
        write!(f, "{}.{}", &padded[..split], &padded[split..])
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Decimal::parse(s)
    }
}

impl TryFrom<String> for Decimal {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Decimal::parse(&s)
    }
}

impl From<Decimal> for String {
    fn from(d: Decimal) -> Self {
        d.to_string()
    }
}

impl From<i64> for Decimal {
    fn from(i: i64) -> Self {
        Decimal {
            negative: i < 0,
            digits: i.unsigned_abs().to_string(),
            scale: 0,
        }
    }
}
