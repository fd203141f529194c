use crate::{traits::FieldValue, value::Value, value::ValueType};
use derive_more::{Add, AddAssign, Display, FromStr, Sub, SubAssign, Sum};
use rust_decimal::{
    Decimal as WrappedDecimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

///
/// Decimal
///
/// Exact decimal number used for `Decimal` (money/float) columns.
/// Serialized as its canonical string so no precision is lost on the wire.
///

#[derive(
    Add,
    AddAssign,
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    Eq,
    FromStr,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Sub,
    SubAssign,
    Sum,
)]
pub struct Decimal(WrappedDecimal);

impl Decimal {
    pub const ZERO: Self = Self(WrappedDecimal::ZERO);

    /// Construct a decimal from mantissa and scale.
    #[must_use]
    pub fn new(num: i64, scale: u32) -> Self {
        Self(WrappedDecimal::new(num, scale))
    }

    /// Returns true if the decimal has no fractional component.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.0.fract().is_zero()
    }

    /// Lossless conversion to `i64`; `None` when fractional or out of range.
    #[must_use]
    pub fn to_i64_exact(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }

        self.0.to_i64()
    }

    /// Remove trailing zeros from the scale.
    #[must_use]
    pub fn normalize(&self) -> Self {
        Self(self.0.normalize())
    }

    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.0.scale()
    }

    #[must_use]
    pub const fn is_sign_negative(&self) -> bool {
        self.0.is_sign_negative()
    }

    /// Parse from a float rendering, e.g. values arriving as JSON numbers.
    #[must_use]
    pub fn from_f64(n: f64) -> Option<Self> {
        WrappedDecimal::from_f64(n).map(|d| Self(d.normalize()))
    }
}

impl From<WrappedDecimal> for Decimal {
    fn from(d: WrappedDecimal) -> Self {
        Self(d)
    }
}

macro_rules! impl_decimal_from_int {
    ( $( $type:ty ),* ) => {
        $(
            impl From<$type> for Decimal {
                fn from(n: $type) -> Self {
                    Self(WrappedDecimal::from(n))
                }
            }
        )*
    };
}

impl_decimal_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl FieldValue for Decimal {
    const VALUE_TYPE: ValueType = ValueType::Decimal;

    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Decimal(v) => Some(*v),
            Value::Integer(v) => Some(Self::from(*v)),
            _ => None,
        }
    }
}

impl Serialize for Decimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<WrappedDecimal>()
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

///
/// TESTS
///
