//! ## Crate layout
//! - `core`: the runtime crate; everything below is re-exported from it.
//! - `db`: data context, fluent queries, query plans and the provider boundary.
//! - `model`: schema declaration and the registry.
//! - `obs`: metrics sink and per-thread counters.
//! - `types` / `value`: wire scalar types and the dynamic value.
//!
//! The `prelude` module covers declaring models and writing queries;
//! provider implementations reach into `db::provider` directly.

pub use remora_core as core;

pub use crate::core::{db, error, model, obs, traits, types, value};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// re-exports
pub use crate::core::error::{Error, ErrorClass, ErrorOrigin};

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::core::{
        db::{
            DataContext, ModelRef, ModelState, SaveReport,
            provider::DataProvider as _,
            query::{
                GroupResult, col, detail, list, val,
                expr::{Detail, Expr, Lookup, Prop},
            },
        },
        error::Error,
        model::{SchemaBuilder, SchemaRegistry},
        traits::Model,
        types::{Decimal, Guid, Timestamp},
        value::{Row, Value},
    };
}
