//! Schema oracle: per-model property metadata.
//!
//! Schemas are declared through [`Model::describe`](crate::traits::Model),
//! validated once when a [`SchemaRegistry`] is built, and read-only after.

mod builder;
mod error;
mod registry;
mod schema;


pub use builder::SchemaBuilder;
pub use error::ValidationError;
pub use registry::{RegistryBuilder, SchemaRegistry};
pub use schema::{DetailProperty, LookupProperty, Member, ModelSchema, Property};
