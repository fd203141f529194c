use crate::{
    types::{Decimal, Guid, Timestamp},
    value::{Value, ValueType},
};
use thiserror::Error as ThisError;

///
/// CoercionError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("cannot coerce {value} to {target}")]
pub struct CoercionError {
    pub value: Value,
    pub target: ValueType,
}

impl Value {
    /// Coerce a value into the given wire type.
    ///
    /// Numeric values widen (integer → decimal) and narrow only when exact;
    /// text parses into guid, timestamp, numeric and boolean targets. `Null`
    /// coerces to every type.
    pub fn coerce_to(&self, target: ValueType) -> Result<Self, CoercionError> {
        if self.is_null() || self.value_type() == Some(target) {
            return Ok(self.clone());
        }

        let coerced = match (self, target) {
            (Self::Integer(i), ValueType::Decimal) => Some(Self::Decimal(Decimal::from(*i))),
            (Self::Decimal(d), ValueType::Integer) => d.to_i64_exact().map(Self::Integer),
            (Self::Integer(i), ValueType::Boolean) => match i {
                0 => Some(Self::Boolean(false)),
                1 => Some(Self::Boolean(true)),
                _ => None,
            },
            (Self::Guid(g), ValueType::Text) => Some(Self::Text(g.to_string())),
            (Self::Text(s), _) => coerce_text(s, target),
            _ => None,
        };

        coerced.ok_or_else(|| CoercionError {
            value: self.clone(),
            target,
        })
    }
}

fn coerce_text(s: &str, target: ValueType) -> Option<Value> {
    match target {
        ValueType::Text => Some(Value::Text(s.to_string())),
        ValueType::Guid => s.parse::<Guid>().ok().map(Value::Guid),
        ValueType::DateTime => Timestamp::parse_flexible(s).ok().map(Value::DateTime),
        ValueType::Integer => s.trim().parse::<i64>().ok().map(Value::Integer),
        ValueType::Decimal => s.trim().parse::<Decimal>().ok().map(Value::Decimal),
        ValueType::Boolean => {
            let t = s.trim();
            if t.eq_ignore_ascii_case("true") {
                Some(Value::Boolean(true))
            } else if t.eq_ignore_ascii_case("false") {
                Some(Value::Boolean(false))
            } else {
                None
            }
        }
    }
}
