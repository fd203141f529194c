//! Core runtime for remora: schema registration, expression compilation,
//! query plans and their wire form, and the change-tracking data context.

// public exports are one module level down
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod traits;
pub mod types;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Domain vocabulary for declaring models and writing queries.
/// Providers, wire types and metrics stay one module down.
///

pub mod prelude {
    pub use crate::{
        db::{
            DataContext, ModelRef, ModelState,
            query::{
                GroupResult, col, detail, list, val,
                expr::{Detail, Expr, Lookup, Prop},
            },
        },
        model::{SchemaBuilder, SchemaRegistry},
        traits::Model,
        types::{Decimal, Guid, Timestamp},
        value::Value,
    };
}
