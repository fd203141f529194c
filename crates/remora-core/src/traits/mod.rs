use crate::{
    model::SchemaBuilder,
    value::{Value, ValueType},
};

// ============================================================================
// MODEL DECLARATION
// ============================================================================
//
// A model type is a marker: it names its remote schema and describes its
// properties once. Instances live inside a data context as tracked state.
//

///
/// Model
///
/// Declares one remote schema. `describe` is called exactly once, when the
/// type is registered into a `SchemaRegistry`.
///

pub trait Model: 'static {
    /// Remote root schema name (e.g. `"Order"`).
    const SCHEMA_NAME: &'static str;

    fn describe(schema: &mut SchemaBuilder);
}

// ============================================================================
// FIELD VALUES
// ============================================================================

///
/// FieldValue
///
/// Host scalar types that map onto exactly one wire value type.
///

pub trait FieldValue: Sized {
    const VALUE_TYPE: ValueType;

    fn to_value(&self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FieldValue for bool {
    const VALUE_TYPE: ValueType = ValueType::Boolean;

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldValue for i64 {
    const VALUE_TYPE: ValueType = ValueType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(*i),
            Value::Decimal(d) => d.to_i64_exact(),
            _ => None,
        }
    }
}

impl FieldValue for String {
    const VALUE_TYPE: ValueType = ValueType::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(ToString::to_string)
    }
}
