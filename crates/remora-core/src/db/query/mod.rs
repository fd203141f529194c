//! Query compilation: host expressions to query plans.
//!
//! Pipeline: `expr` (host tree) → `raw` (parse + normalize) → `build`
//! (AST) → `plan` (assembled query and its wire form). `fluent` drives the
//! pipeline from chained calls.

pub mod ast;
mod build;
mod compile;
mod error;
pub mod expr;
pub mod fluent;
pub mod plan;
pub(crate) mod raw;

// re-exports
pub use ast::{
    AggregationKind, ComparisonType, DatePart, DetailKind, ExpressionNode, FunctionKind, LogicalOp,
    Operand,
};
pub use compile::compile_filter;
pub(crate) use compile::Compiler;
pub use error::CompileError;
pub use expr::{DetailExpr, Expr, col, detail, list, val};
pub use fluent::{GroupedQuery, ProjectedQuery, Queryable, ScalarQuery};
pub use plan::{GroupResult, OrderDirection, OrderKey, PlanColumn, PlanShape, QueryPlan};
