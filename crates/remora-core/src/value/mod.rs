//! Runtime values exchanged with the backend.
//!
//! `Value` is the single currency for constants in the query pipeline, for
//! row cells coming back from a provider, and for tracked model state.

mod coerce;
mod compare;


use crate::types::{Decimal, Guid, Timestamp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::BTreeMap, fmt};

// re-exports
pub use coerce::CoercionError;

///
/// Row
/// One provider row: wire column (or projection alias) to value.
///

pub type Row = BTreeMap<String, Value>;

///
/// ValueType
///
/// Wire data-value type of a column or parameter.
/// The serialized name is the backend's `DataValueType` label.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ValueType {
    Guid,
    Text,
    Integer,
    Decimal,
    Boolean,
    DateTime,
}

impl ValueType {
    pub const ALL: [Self; 6] = [
        Self::Guid,
        Self::Text,
        Self::Integer,
        Self::Decimal,
        Self::Boolean,
        Self::DateTime,
    ];

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }

    /// Common type two numeric types widen to.
    #[must_use]
    pub const fn numeric_join(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::Integer, Self::Integer) => Some(Self::Integer),
            (Self::Integer | Self::Decimal, Self::Integer | Self::Decimal) => Some(Self::Decimal),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Guid => "Guid",
            Self::Text => "Text",
            Self::Integer => "Integer",
            Self::Decimal => "Decimal",
            Self::Boolean => "Boolean",
            Self::DateTime => "DateTime",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

///
/// Value
///
/// Null is a real value here (a nullable column holding nothing), not a
/// missing cell; a missing cell is simply absent from the row map.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Guid(Guid),
    DateTime(Timestamp),
}

impl Value {
    /// Wire type of the value; `None` for `Null`, which fits every type.
    #[must_use]
    pub const fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(ValueType::Boolean),
            Self::Integer(_) => Some(ValueType::Integer),
            Self::Decimal(_) => Some(ValueType::Decimal),
            Self::Text(_) => Some(ValueType::Text),
            Self::Guid(_) => Some(ValueType::Guid),
            Self::DateTime(_) => Some(ValueType::DateTime),
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_guid(&self) -> Option<Guid> {
        match self {
            Self::Guid(g) => Some(*g),
            _ => None,
        }
    }

    /// Build a loosely typed value from JSON; callers coerce it to the
    /// column type afterwards.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(d) = n.as_f64().and_then(Decimal::from_f64) {
                    Self::Decimal(d)
                } else {
                    Self::Text(n.to_string())
                }
            }
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Render into the JSON form used by the wire format.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Decimal(d) => serde_json::Value::String(d.to_string()),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Guid(g) => serde_json::Value::String(g.to_string()),
            Self::DateTime(ts) => serde_json::Value::String(ts.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Guid(g) => write!(f, "{g}"),
            Self::DateTime(ts) => write!(f, "{ts}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Decimal(d) => d.serialize(serializer),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Guid(g) => g.serialize(serializer),
            Self::DateTime(ts) => serializer.collect_str(ts),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json(&json))
    }
}

// ----------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<Guid> for Value {
    fn from(v: Guid) -> Self {
        Self::Guid(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
