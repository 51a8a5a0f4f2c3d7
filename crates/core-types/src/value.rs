use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoercionError;

/// The closed set of application-level value types a model attribute may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Null,
    Bool,
    Float,
    Int,
    Text,
    Date,
    Time,
    Timestamp,
    Duration,
    Array,
}

impl ValueType {
    pub const ALL: [ValueType; 10] = [
        ValueType::Null,
        ValueType::Bool,
        ValueType::Float,
        ValueType::Int,
        ValueType::Text,
        ValueType::Date,
        ValueType::Time,
        ValueType::Timestamp,
        ValueType::Duration,
        ValueType::Array,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Float => "float",
            ValueType::Int => "int",
            ValueType::Text => "text",
            ValueType::Date => "date",
            ValueType::Time => "time",
            ValueType::Timestamp => "timestamp",
            ValueType::Duration => "duration",
            ValueType::Array => "array",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ValueType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| s.to_string())
    }
}

/// A single attribute value.
///
/// `Null` doubles as the absence marker: an attribute declared without a
/// default, or a filter column that should not restrict a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Duration(TimeDelta),
    Array(Vec<Value>),
}

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Text(_) => ValueType::Text,
            Value::Date(_) => ValueType::Date,
            Value::Time(_) => ValueType::Time,
            Value::Timestamp(_) => ValueType::Timestamp,
            Value::Duration(_) => ValueType::Duration,
            Value::Array(_) => ValueType::Array,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value counts as "present" for identifiers and query filters.
    ///
    /// Null, `false`, zero, the empty string, the zero duration and the empty
    /// array are all treated as absent.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Duration(d) => !d.is_zero(),
            Value::Array(items) => !items.is_empty(),
            Value::Date(_) | Value::Time(_) | Value::Timestamp(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts the value to `target` without losing information.
    ///
    /// Conversions that would truncate, round or reinterpret the value fail.
    pub fn coerce_to(self, target: ValueType) -> Result<Value, CoercionError> {
        if self.value_type() == target {
            return Ok(self);
        }
        let fail = |value: &Value| CoercionError {
            value: value.to_string(),
            from: value.value_type(),
            to: target,
        };

        let coerced = match (&self, target) {
            (Value::Text(s), ValueType::Int) => s.trim().parse::<i64>().ok().map(Value::Int),
            (Value::Text(s), ValueType::Float) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
            (Value::Text(s), ValueType::Bool) => parse_bool(s).map(Value::Bool),
            (Value::Text(s), ValueType::Date) => {
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok().map(Value::Date)
            }
            (Value::Text(s), ValueType::Time) => TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(s.trim(), fmt).ok())
                .map(Value::Time),
            (Value::Text(s), ValueType::Timestamp) => TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
                .map(Value::Timestamp),
            (Value::Int(i), ValueType::Float) => {
                let f = *i as f64;
                (f as i64 == *i && f.abs() < 9.007_199_254_740_992e15).then_some(Value::Float(f))
            }
            (Value::Float(f), ValueType::Int) => (f.is_finite()
                && f.fract() == 0.0
                && *f >= i64::MIN as f64
                && *f < i64::MAX as f64)
                .then(|| Value::Int(*f as i64)),
            (Value::Bool(b), ValueType::Int) => Some(Value::Int(i64::from(*b))),
            (Value::Int(0), ValueType::Bool) => Some(Value::Bool(false)),
            (Value::Int(1), ValueType::Bool) => Some(Value::Bool(true)),
            (Value::Date(d), ValueType::Timestamp) => {
                Some(Value::Timestamp(d.and_time(NaiveTime::MIN)))
            }
            (
                Value::Int(_)
                | Value::Float(_)
                | Value::Bool(_)
                | Value::Date(_)
                | Value::Time(_)
                | Value::Timestamp(_),
                ValueType::Text,
            ) => Some(Value::Text(self.to_string())),
            _ => None,
        };

        coerced.ok_or_else(|| fail(&self))
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Duration(d) => write!(f, "{d}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<TimeDelta> for Value {
    fn from(v: TimeDelta) -> Self {
        Value::Duration(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_text_coerces_to_int() {
        let v = Value::from("2016").coerce_to(ValueType::Int).unwrap();
        assert_eq!(v, Value::Int(2016));
        assert_eq!(v.value_type(), ValueType::Int);
    }

    #[test]
    fn non_numeric_text_does_not_coerce_to_int() {
        let err = Value::from("twenty").coerce_to(ValueType::Int).unwrap_err();
        assert_eq!(err.from, ValueType::Text);
        assert_eq!(err.to, ValueType::Int);
        assert_eq!(err.value, "twenty");
    }

    #[test]
    fn fractional_float_is_not_truncated() {
        assert!(Value::Float(2.5).coerce_to(ValueType::Int).is_err());
        assert_eq!(Value::Float(3.0).coerce_to(ValueType::Int).unwrap(), Value::Int(3));
    }

    #[test]
    fn null_never_coerces() {
        for target in ValueType::ALL.into_iter().filter(|t| *t != ValueType::Null) {
            assert!(Value::Null.coerce_to(target).is_err(), "{target}");
        }
    }

    #[test]
    fn text_parses_dates_and_timestamps() {
        assert_eq!(
            Value::from("2016-11-11").coerce_to(ValueType::Date).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2016, 11, 11).unwrap())
        );
        let ts = Value::from("2016-11-11T20:15:00")
            .coerce_to(ValueType::Timestamp)
            .unwrap();
        assert_eq!(ts.value_type(), ValueType::Timestamp);
        assert!(Value::from("11/11/2016").coerce_to(ValueType::Date).is_err());
    }

    #[test]
    fn scalars_render_to_text() {
        assert_eq!(Value::Int(7).coerce_to(ValueType::Text).unwrap(), Value::from("7"));
        assert_eq!(Value::Bool(true).coerce_to(ValueType::Text).unwrap(), Value::from("true"));
        assert!(Value::Array(vec![]).coerce_to(ValueType::Text).is_err());
    }

    #[test]
    fn bool_and_int_convert_only_for_zero_and_one() {
        assert_eq!(Value::Int(1).coerce_to(ValueType::Bool).unwrap(), Value::Bool(true));
        assert!(Value::Int(2).coerce_to(ValueType::Bool).is_err());
        assert_eq!(Value::from(" No ").coerce_to(ValueType::Bool).unwrap(), Value::Bool(false));
    }

    #[test]
    fn truthiness_matches_filter_semantics() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("Arrival").is_truthy());
        assert!(Value::Int(2016).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn value_type_parses_case_insensitively() {
        assert_eq!("Timestamp".parse::<ValueType>().unwrap(), ValueType::Timestamp);
        assert!("long".parse::<ValueType>().is_err());
    }
}
