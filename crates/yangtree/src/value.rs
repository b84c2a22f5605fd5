//! Leaf value types and conversion.
//!
//! Scalar values are stored as [`serde_json::Value`]. Strings coming from
//! paths are converted with [`LeafType::parse`], decoded JSON with
//! [`LeafType::from_json`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Built-in type of a leaf or leaf-list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafType {
    #[default]
    String,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    /// Fixed-point decimal with the given number of fraction digits.
    Decimal64(u8),
    Enumeration(Vec<String>),
    Empty,
}

impl LeafType {
    pub fn name(&self) -> &'static str {
        match self {
            LeafType::String => "string",
            LeafType::Boolean => "boolean",
            LeafType::Int8 => "int8",
            LeafType::Int16 => "int16",
            LeafType::Int32 => "int32",
            LeafType::Int64 => "int64",
            LeafType::Uint8 => "uint8",
            LeafType::Uint16 => "uint16",
            LeafType::Uint32 => "uint32",
            LeafType::Uint64 => "uint64",
            LeafType::Decimal64(_) => "decimal64",
            LeafType::Enumeration(_) => "enumeration",
            LeafType::Empty => "empty",
        }
    }

    fn signed_range(&self) -> Option<(i64, i64)> {
        match self {
            LeafType::Int8 => Some((i8::MIN.into(), i8::MAX.into())),
            LeafType::Int16 => Some((i16::MIN.into(), i16::MAX.into())),
            LeafType::Int32 => Some((i32::MIN.into(), i32::MAX.into())),
            LeafType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    fn unsigned_max(&self) -> Option<u64> {
        match self {
            LeafType::Uint8 => Some(u8::MAX.into()),
            LeafType::Uint16 => Some(u16::MAX.into()),
            LeafType::Uint32 => Some(u32::MAX.into()),
            LeafType::Uint64 => Some(u64::MAX),
            _ => None,
        }
    }

    /// Convert a raw string (path value, edit argument) to a typed value.
    pub fn parse(&self, raw: &str) -> Result<Value> {
        let invalid = || Error::InvalidValue(format!("'{raw}' is not a valid {}", self.name()));

        if let Some((min, max)) = self.signed_range() {
            let n: i64 = raw.trim().parse().map_err(|_| invalid())?;
            if n < min || n > max {
                return Err(invalid());
            }
            return Ok(Value::from(n));
        }
        if let Some(max) = self.unsigned_max() {
            let n: u64 = raw.trim().parse().map_err(|_| invalid())?;
            if n > max {
                return Err(invalid());
            }
            return Ok(Value::from(n));
        }

        match self {
            LeafType::String => Ok(Value::String(raw.to_string())),
            LeafType::Boolean => match raw.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            LeafType::Decimal64(digits) => {
                let text = raw.trim();
                if text.contains(['e', 'E']) {
                    return Err(invalid());
                }
                let fraction = text.split_once('.').map(|(_, f)| f.len()).unwrap_or(0);
                if fraction > usize::from(*digits) {
                    return Err(invalid());
                }
                let n: f64 = text.parse().map_err(|_| invalid())?;
                Number::from_f64(n).map(Value::Number).ok_or_else(invalid)
            }
            LeafType::Enumeration(names) => {
                if names.iter().any(|n| n == raw) {
                    Ok(Value::String(raw.to_string()))
                } else {
                    Err(invalid())
                }
            }
            LeafType::Empty => {
                if raw.is_empty() || raw == "[null]" {
                    Ok(Value::Null)
                } else {
                    Err(invalid())
                }
            }
            _ => Err(invalid()),
        }
    }

    /// Convert a decoded JSON scalar to a typed value. Numbers may also be
    /// given as strings, the way 64-bit values are usually encoded.
    pub fn from_json(&self, value: &Value) -> Result<Value> {
        match (self, value) {
            (LeafType::Empty, Value::Null) => Ok(Value::Null),
            (LeafType::Empty, Value::Array(items)) if items.len() == 1 && items[0].is_null() => {
                Ok(Value::Null)
            }
            (LeafType::Boolean, Value::Bool(b)) => Ok(Value::Bool(*b)),
            (LeafType::String | LeafType::Enumeration(_), Value::String(s)) => self.parse(s),
            (_, Value::Number(n)) if !matches!(self, LeafType::String) => self.parse(&n.to_string()),
            (LeafType::String, Value::Number(_) | Value::Bool(_)) => {
                Ok(Value::String(canonical(value)))
            }
            (_, Value::String(s)) => self.parse(s),
            _ => Err(Error::InvalidValue(format!(
                "{value} is not a valid {}",
                self.name()
            ))),
        }
    }

    /// JSON encoding of a stored value.
    pub fn to_json(&self, value: &Value) -> Value {
        match self {
            LeafType::Empty => Value::Array(vec![Value::Null]),
            _ => value.clone(),
        }
    }
}

/// Canonical string form of a stored value, used in identity predicates.
pub fn canonical(value: &Value) -> String {
    yangtree_path::value_to_string(value)
}

/// Value equality that compares numbers by magnitude, so `1.50` read as a
/// decimal equals `1.5`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if !x.is_f64() && !y.is_f64() => {
            x.as_i64() == y.as_i64() && x.as_u64() == y.as_u64()
        }
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_ranges() {
        assert_eq!(LeafType::Uint8.parse("255").unwrap(), json!(255));
        assert!(LeafType::Uint8.parse("256").is_err());
        assert!(LeafType::Uint8.parse("-1").is_err());
        assert_eq!(LeafType::Int8.parse(" -128 ").unwrap(), json!(-128));
        assert_eq!(LeafType::Int32.parse("05").unwrap(), json!(5));
        assert!(LeafType::Int64.parse("x").is_err());
    }

    #[test]
    fn test_decimal_and_enum() {
        let dec = LeafType::Decimal64(2);
        assert!(values_equal(&dec.parse("1.50").unwrap(), &dec.parse("1.5").unwrap()));
        assert!(dec.parse("1.505").is_err());
        assert!(dec.parse("1.5e-9").is_err());
        assert!(dec.parse("1E5").is_err());
        assert_eq!(canonical(&dec.parse("1.50").unwrap()), "1.5");

        let color = LeafType::Enumeration(vec!["red".into(), "blue".into()]);
        assert_eq!(color.parse("red").unwrap(), json!("red"));
        assert!(color.parse("green").is_err());
    }

    #[test]
    fn test_wide_integers_compare_exactly() {
        let a = LeafType::Uint64.parse("9007199254740992").unwrap();
        let b = LeafType::Uint64.parse("9007199254740993").unwrap();
        assert!(!values_equal(&a, &b));
        assert!(values_equal(&b, &json!(9007199254740993u64)));
        assert!(!values_equal(&json!(i64::MIN), &json!(i64::MIN + 1)));
        assert!(values_equal(&json!(2), &json!(2.0)));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(LeafType::Uint64.from_json(&json!("42")).unwrap(), json!(42));
        assert_eq!(LeafType::Empty.from_json(&json!([null])).unwrap(), Value::Null);
        assert_eq!(LeafType::String.from_json(&json!(7)).unwrap(), json!("7"));
        assert!(LeafType::Boolean.from_json(&json!(1)).is_err());
        assert_eq!(LeafType::Empty.to_json(&Value::Null), json!([null]));
    }
}
