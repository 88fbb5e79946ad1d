use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::time::{format_date, format_date_time, parse_date, parse_date_time};

/// Storage-level type of a scalar field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Text,
    Boolean,
    /// 32-bit integer. Strongly typed identifiers use this width.
    Int32,
    Int64,
    Float,
    Date,
    DateTime,
    Uuid,
    /// Closed set of named variants, ordered by declaration.
    Enum { variants: Vec<String> },
}

impl ScalarKind {
    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    /// Convert a client literal to a value of this kind.
    ///
    /// The literal is taken verbatim: numbers use `.` decimals, dates are
    /// `YYYY-MM-DD`, enum variants match ignoring ASCII case.
    pub fn parse_literal(&self, raw: &str) -> Result<ScalarValue> {
        let trimmed = raw.trim();
        match self {
            Self::Text => Ok(ScalarValue::Text(raw.to_string())),
            Self::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Ok(ScalarValue::Boolean(true)),
                "false" => Ok(ScalarValue::Boolean(false)),
                _ => Err(CoreError::invalid_literal(self, raw, "expected true or false")),
            },
            Self::Int32 => trimmed
                .parse::<i32>()
                .map(ScalarValue::Int32)
                .map_err(|e| CoreError::invalid_literal(self, raw, e.to_string())),
            Self::Int64 => trimmed
                .parse::<i64>()
                .map(ScalarValue::Int64)
                .map_err(|e| CoreError::invalid_literal(self, raw, e.to_string())),
            Self::Float => {
                let value = trimmed
                    .parse::<f64>()
                    .map_err(|e| CoreError::invalid_literal(self, raw, e.to_string()))?;
                if value.is_finite() {
                    Ok(ScalarValue::Float(value))
                } else {
                    Err(CoreError::invalid_literal(self, raw, "value is not finite"))
                }
            }
            Self::Date => parse_date(trimmed).map(ScalarValue::Date),
            Self::DateTime => parse_date_time(trimmed).map(ScalarValue::DateTime),
            Self::Uuid => Uuid::parse_str(trimmed)
                .map(ScalarValue::Uuid)
                .map_err(|e| CoreError::invalid_literal(self, raw, e.to_string())),
            Self::Enum { variants } => variants
                .iter()
                .find(|variant| variant.eq_ignore_ascii_case(trimmed))
                .map(|variant| ScalarValue::Enum(variant.clone()))
                .ok_or_else(|| CoreError::unknown_variant(raw, variants)),
        }
    }

    /// Convert a JSON value to this kind.
    ///
    /// Applies the direct conversions a client may rely on: numbers that fit
    /// are narrowed to `int32`, strings are parsed as literals, and anything
    /// else is a type mismatch.
    pub fn from_json(&self, value: &Value) -> Result<ScalarValue> {
        match (self, value) {
            (_, Value::Null) => Ok(ScalarValue::Null),
            (Self::Text, Value::String(s)) => Ok(ScalarValue::Text(s.clone())),
            (Self::Text, Value::Number(n)) => Ok(ScalarValue::Text(n.to_string())),
            (Self::Text, Value::Bool(b)) => Ok(ScalarValue::Text(b.to_string())),
            (Self::Boolean, Value::Bool(b)) => Ok(ScalarValue::Boolean(*b)),
            (Self::Int32, Value::Number(n)) => {
                let wide = integral(self, n)?;
                i32::try_from(wide)
                    .map(ScalarValue::Int32)
                    .map_err(|_| CoreError::out_of_range(self, wide))
            }
            (Self::Int64, Value::Number(n)) => integral(self, n).map(ScalarValue::Int64),
            (Self::Float, Value::Number(n)) => n
                .as_f64()
                .map(ScalarValue::Float)
                .ok_or_else(|| CoreError::type_mismatch(self, "number")),
            (_, Value::String(s)) => self.parse_literal(s),
            (kind, other) => Err(CoreError::type_mismatch(kind, json_type_name(other))),
        }
    }

    /// Compare two values of this kind. Enum variants order by declaration.
    pub fn compare(&self, left: &ScalarValue, right: &ScalarValue) -> Option<Ordering> {
        if let Self::Enum { variants } = self
            && let (ScalarValue::Enum(a), ScalarValue::Enum(b)) = (left, right)
        {
            let position = |name: &str| variants.iter().position(|v| v == name);
            return match (position(a), position(b)) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => Some(a.cmp(b)),
            };
        }
        left.partial_compare(right)
    }

    /// Total order used for sorting: nulls first, incomparable values tie.
    pub fn sort_order(&self, left: &ScalarValue, right: &ScalarValue) -> Ordering {
        match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(left, right).unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Boolean => write!(f, "boolean"),
            Self::Int32 => write!(f, "int32"),
            Self::Int64 => write!(f, "int64"),
            Self::Float => write!(f, "float"),
            Self::Date => write!(f, "date"),
            Self::DateTime => write!(f, "date_time"),
            Self::Uuid => write!(f, "uuid"),
            Self::Enum { .. } => write!(f, "enum"),
        }
    }
}

fn integral(kind: &ScalarKind, n: &serde_json::Number) -> Result<i64> {
    if let Some(value) = n.as_i64() {
        return Ok(value);
    }
    if n.is_u64() {
        return Err(CoreError::out_of_range(kind, n));
    }
    match n.as_f64() {
        // i64::MAX as f64 rounds up to 2^63, which no longer fits.
        Some(value) if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 => {
            Ok(value as i64)
        }
        Some(value) if value.fract() == 0.0 => Err(CoreError::out_of_range(kind, n)),
        _ => Err(CoreError::type_mismatch(kind, "fractional number")),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A typed scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Text(String),
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float(f64),
    Date(Date),
    DateTime(OffsetDateTime),
    Uuid(Uuid),
    Enum(String),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Boolean(_) => "boolean",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float(_) => "float",
            Self::Date(_) => "date",
            Self::DateTime(_) => "date_time",
            Self::Uuid(_) => "uuid",
            Self::Enum(_) => "enum",
        }
    }

    /// JSON form as stored in a record.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Text(s) | Self::Enum(s) => Value::String(s.clone()),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Int32(v) => Value::from(*v),
            Self::Int64(v) => Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Date(d) => Value::String(format_date(*d)),
            Self::DateTime(dt) => Value::String(format_date_time(*dt)),
            Self::Uuid(u) => Value::String(u.to_string()),
        }
    }

    fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Text(a), Self::Text(b)) | (Self::Enum(a), Self::Enum(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Float(a), other) => other.as_i64().and_then(|b| a.partial_cmp(&(b as f64))),
            (this, Self::Float(b)) => this.as_i64().and_then(|a| (a as f64).partial_cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Text(s) | Self::Enum(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Date(d) => write!(f, "{}", format_date(*d)),
            Self::DateTime(dt) => write!(f, "{}", format_date_time(*dt)),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;

    fn status() -> ScalarKind {
        ScalarKind::enumeration(["Pending", "Shipped", "Cancelled"])
    }

    #[test]
    fn test_parse_numeric_literals() {
        assert_eq!(ScalarKind::Int32.parse_literal("42").unwrap(), ScalarValue::Int32(42));
        assert_eq!(ScalarKind::Int64.parse_literal(" -7 ").unwrap(), ScalarValue::Int64(-7));
        assert_eq!(ScalarKind::Float.parse_literal("2.5").unwrap(), ScalarValue::Float(2.5));
        assert!(ScalarKind::Int32.parse_literal("4.2").is_err());
        assert!(ScalarKind::Float.parse_literal("2,5").is_err());
        assert!(ScalarKind::Float.parse_literal("NaN").is_err());
    }

    #[test]
    fn test_parse_enum_ignores_case() {
        assert_eq!(
            status().parse_literal("shipped").unwrap(),
            ScalarValue::Enum("Shipped".into())
        );
        match status().parse_literal("Lost") {
            Err(CoreError::UnknownVariant { raw, .. }) => assert_eq!(raw, "Lost"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_date_literal() {
        assert_eq!(
            ScalarKind::Date.parse_literal("2024-02-29").unwrap(),
            ScalarValue::Date(date!(2024 - 02 - 29))
        );
        assert!(ScalarKind::Date.parse_literal("29/02/2024").is_err());
    }

    #[test]
    fn test_from_json_narrows_identifier() {
        assert_eq!(
            ScalarKind::Int32.from_json(&json!(17_i64)).unwrap(),
            ScalarValue::Int32(17)
        );
        match ScalarKind::Int32.from_json(&json!(5_000_000_000_i64)) {
            Err(CoreError::OutOfRange { .. }) => {}
            other => panic!("unexpected: {other:?}"),
        }
        assert!(ScalarKind::Int32.from_json(&json!(1.5)).is_err());
    }

    #[test]
    fn test_from_json_whole_float_beyond_int64() {
        assert_eq!(
            ScalarKind::Int64.from_json(&json!(4096.0)).unwrap(),
            ScalarValue::Int64(4096)
        );
        match ScalarKind::Int64.from_json(&json!(9_223_372_036_854_775_808.0_f64)) {
            Err(CoreError::OutOfRange { .. }) => {}
            other => panic!("unexpected: {other:?}"),
        }
        match ScalarKind::Int64.from_json(&json!(-1.0e19)) {
            Err(CoreError::OutOfRange { .. }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_from_json_parses_strings_and_rejects_objects() {
        assert_eq!(
            ScalarKind::Int64.from_json(&json!("12")).unwrap(),
            ScalarValue::Int64(12)
        );
        assert_eq!(ScalarKind::Boolean.from_json(&Value::Null).unwrap(), ScalarValue::Null);
        match ScalarKind::Text.from_json(&json!({"a": 1})) {
            Err(CoreError::TypeMismatch { found, .. }) => assert_eq!(found, "object"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_compare_mixed_integer_widths() {
        let kind = ScalarKind::Int64;
        assert_eq!(
            kind.compare(&ScalarValue::Int32(3), &ScalarValue::Int64(3)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            kind.compare(&ScalarValue::Int64(2), &ScalarValue::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(kind.compare(&ScalarValue::Int64(2), &ScalarValue::Text("2".into())), None);
    }

    #[test]
    fn test_enum_orders_by_declaration() {
        let kind = status();
        assert_eq!(
            kind.compare(
                &ScalarValue::Enum("Shipped".into()),
                &ScalarValue::Enum("Cancelled".into())
            ),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_sort_order_puts_nulls_first() {
        let kind = ScalarKind::Text;
        assert_eq!(
            kind.sort_order(&ScalarValue::Null, &ScalarValue::Text("a".into())),
            Ordering::Less
        );
        assert_eq!(
            kind.sort_order(&ScalarValue::Text("b".into()), &ScalarValue::Text("a".into())),
            Ordering::Greater
        );
    }

    #[test]
    fn test_to_json_uses_literal_forms() {
        assert_eq!(ScalarValue::Date(date!(2024 - 01 - 02)).to_json(), json!("2024-01-02"));
        assert_eq!(ScalarValue::Int32(4).to_json(), json!(4));
        assert_eq!(ScalarValue::Int64(4).to_string(), ScalarValue::Int32(4).to_string());
    }
}
