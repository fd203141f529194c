use crate::{traits::FieldValue, value::Value, value::ValueType};
use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error as ThisError;
use uuid::Uuid;

///
/// GuidError
///

#[derive(Debug, ThisError)]
#[error("invalid guid '{input}'")]
pub struct GuidError {
    pub input: String,
}

///
/// Guid
///
/// Unique identifier used for primary keys and lookup references.
/// Keys for new models are generated locally (random v4).
///

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deref,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    pub const NIL: Self = Self(Uuid::nil());

    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn from_u128(v: u128) -> Self {
        Self(Uuid::from_u128(v))
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl FromStr for Guid {
    type Err = GuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self).map_err(|_| GuidError {
            input: s.to_string(),
        })
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FieldValue for Guid {
    const VALUE_TYPE: ValueType = ValueType::Guid;

    fn to_value(&self) -> Value {
        Value::Guid(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Guid(v) => Some(*v),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}
