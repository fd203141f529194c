//! Data access: query compilation, the unit of work, and the provider
//! boundary.

pub mod context;
pub mod provider;
pub mod query;

// re-exports
pub use context::{DataContext, ModelRef, ModelState, SaveReport};
pub use provider::DataProvider;
