//! Attribute values and features.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;
use crate::schema::ValueType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Date(NaiveDate),
    Geometry(Geometry),
}

impl Value {
    /// Runtime type of this value; `None` for null.
    pub fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => ValueType::Boolean,
            Value::Int(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::Str(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Geometry(_) => ValueType::Geometry,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_geometry(&self) -> Option<&Geometry> {
        match self {
            Value::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Convert towards `target`, used to contextualize literals against the
    /// type of the attribute they are compared with. A value that cannot be
    /// converted is returned unchanged.
    pub fn coerce(&self, target: ValueType) -> Value {
        let converted = match (self, target) {
            (Value::Null, _) => None,
            (Value::Str(s), ValueType::Integer) => s.trim().parse().ok().map(Value::Int),
            (Value::Str(s), ValueType::Double) => s.trim().parse().ok().map(Value::Double),
            (Value::Str(s), ValueType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (Value::Str(s), ValueType::Date) => {
                // Accept a bare date or a date-time whose first ten chars are a date.
                let head = s.trim().get(..10).unwrap_or(s.trim());
                NaiveDate::parse_from_str(head, "%Y-%m-%d").ok().map(Value::Date)
            }
            (Value::Int(i), ValueType::Double) => Some(Value::Double(*i as f64)),
            // Only whole doubles inside [-2^63, 2^63); `as` would saturate.
            (Value::Double(d), ValueType::Integer)
                if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d < i64::MAX as f64 =>
            {
                Some(Value::Int(*d as i64))
            }
            (Value::Int(_), ValueType::String)
            | (Value::Double(_), ValueType::String)
            | (Value::Bool(_), ValueType::String)
            | (Value::Date(_), ValueType::String) => Some(Value::Str(self.to_string())),
            _ => None,
        };
        converted.unwrap_or_else(|| self.clone())
    }

    /// Ordering between comparable values; numbers compare across int and
    /// double. `None` for nulls and incomparable pairs.
    pub fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Geometry(a), Value::Geometry(b)) => (a == b).then_some(Ordering::Equal),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

/// Plain string form: the text inline SQL quotes and the evaluator matches
/// LIKE patterns against. Null renders as `NULL`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Geometry(g) => write!(f, "{g}"),
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
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Geometry> for Value {
    fn from(v: Geometry) -> Self {
        Value::Geometry(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        FeatureId::new(s)
    }
}

/// One record. `values` is positional against the schema of the reader
/// that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub values: Vec<Value>,
}

impl Feature {
    pub fn new(id: impl Into<FeatureId>, values: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            values,
        }
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<String> for FeatureId {
    fn from(s: String) -> Self {
        FeatureId(s)
    }
}
