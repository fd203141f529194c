//! Provider boundary: the remote backend as seen by a data context.
//!
//! Transport, authentication and retries live behind `DataProvider`;
//! responses report failure through their `success` flags, never by
//! panicking.

use crate::{
    db::query::QueryPlan,
    types::Guid,
    value::{Row, Value},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, rc::Rc};

///
/// DataProvider
///

pub trait DataProvider {
    /// Execute a query plan and return its rows.
    fn get_items(&self, plan: &QueryPlan) -> ItemsResponse;

    /// Server-side defaults for a new row of `schema_name`.
    fn get_default_values(&self, schema_name: &str) -> DefaultValuesResponse;

    /// Apply a batch of mutations.
    fn batch_execute(&self, batch: &BatchRequest) -> BatchResponse;

    /// Run a named business process.
    fn execute_process(&self, request: &ProcessRequest) -> ProcessResponse;
}

impl<P: DataProvider + ?Sized> DataProvider for Rc<P> {
    fn get_items(&self, plan: &QueryPlan) -> ItemsResponse {
        (**self).get_items(plan)
    }

    fn get_default_values(&self, schema_name: &str) -> DefaultValuesResponse {
        (**self).get_default_values(schema_name)
    }

    fn batch_execute(&self, batch: &BatchRequest) -> BatchResponse {
        (**self).batch_execute(batch)
    }

    fn execute_process(&self, request: &ProcessRequest) -> ProcessResponse {
        (**self).execute_process(request)
    }
}

///
/// ItemsResponse
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ItemsResponse {
    pub success: bool,
    pub items: Vec<Row>,
    pub error_message: Option<String>,
}

impl ItemsResponse {
    #[must_use]
    pub const fn ok(items: Vec<Row>) -> Self {
        Self {
            success: true,
            items,
            error_message: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            error_message: Some(message.into()),
        }
    }
}

///
/// DefaultValuesResponse
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DefaultValuesResponse {
    pub success: bool,
    pub values: Row,
    pub error_message: Option<String>,
}

impl DefaultValuesResponse {
    #[must_use]
    pub const fn ok(values: Row) -> Self {
        Self {
            success: true,
            values,
            error_message: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            values: Row::new(),
            error_message: Some(message.into()),
        }
    }
}

///
/// MutationRequest
/// One batch item, tagged by `kind` on the wire.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum MutationRequest {
    Insert {
        schema_name: String,
        column_values: Row,
    },
    Update {
        schema_name: String,
        primary_key: Guid,
        column_values: Row,
    },
    Delete {
        schema_name: String,
        primary_key: Guid,
    },
}

impl MutationRequest {
    #[must_use]
    pub fn schema_name(&self) -> &str {
        match self {
            Self::Insert { schema_name, .. }
            | Self::Update { schema_name, .. }
            | Self::Delete { schema_name, .. } => schema_name,
        }
    }

    /// Column values carried by the request (empty for deletes).
    #[must_use]
    pub fn column_values(&self) -> Option<&Row> {
        match self {
            Self::Insert { column_values, .. } | Self::Update { column_values, .. } => {
                Some(column_values)
            }
            Self::Delete { .. } => None,
        }
    }
}

///
/// BatchRequest
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct BatchRequest {
    pub items: Vec<MutationRequest>,
}

///
/// ItemResult
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ItemResult {
    pub success: bool,
    pub error_message: Option<String>,
}

///
/// BatchResponse
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub error_message: Option<String>,
    pub results: Vec<ItemResult>,
}

impl BatchResponse {
    /// Successful batch with one successful result per item.
    #[must_use]
    pub fn ok(items: usize) -> Self {
        Self {
            success: true,
            error_message: None,
            results: vec![
                ItemResult {
                    success: true,
                    error_message: None,
                };
                items
            ],
        }
    }
}

///
/// ProcessRequest
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ProcessRequest {
    pub process_name: String,
    pub input_values: BTreeMap<String, Value>,
    pub result_parameters: Vec<String>,
}

impl ProcessRequest {
    #[must_use]
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input_values.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn result(mut self, name: impl Into<String>) -> Self {
        self.result_parameters.push(name.into());
        self
    }
}

///
/// ProcessResponse
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub output_values: BTreeMap<String, Value>,
    pub error_message: Option<String>,
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mutation_requests_serialize_with_kind_tag() {
        let key = Guid::from_u128(1);
        let mut values = Row::new();
        values.insert("IntValue".into(), Value::Integer(10));

        let insert = serde_json::to_value(MutationRequest::Insert {
            schema_name: "TestModel".into(),
            column_values: values,
        })
        .unwrap();
        assert_eq!(insert["kind"], json!("Insert"));
        assert_eq!(insert["column_values"]["IntValue"], json!(10));

        let delete = serde_json::to_value(MutationRequest::Delete {
            schema_name: "TestModel".into(),
            primary_key: key,
        })
        .unwrap();
        assert_eq!(delete["kind"], json!("Delete"));
        assert_eq!(delete["primary_key"], json!(key.to_string()));
    }

    #[test]
    fn mutation_requests_round_trip_through_json() {
        let request = MutationRequest::Update {
            schema_name: "TestModel".into(),
            primary_key: Guid::from_u128(9),
            column_values: Row::from([("StringValue".to_string(), Value::from("x"))]),
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: MutationRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(back, request);
    }
}
