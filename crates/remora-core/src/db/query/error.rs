use crate::{
    model::ValidationError,
    value::{CoercionError, ValueType},
};
use thiserror::Error as ThisError;

///
/// CompileError
///
/// An expression or chained operation that cannot be translated into a
/// query plan. Always raised before any provider call.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CompileError {
    #[error("schema '{schema}' has no property '{property}'")]
    UnknownProperty { schema: String, property: String },

    #[error("unknown method '{method}'")]
    UnknownMethod { method: String },

    #[error("method '{method}' expects {expected} argument(s), found {found}")]
    InvalidArguments {
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("ambiguous detail chain '{path}': {reason}")]
    AmbiguousDetailChain { path: String, reason: String },

    #[error("'{operator}' is not supported inside detail '{detail}'")]
    UnsupportedDetailOperator { detail: String, operator: String },

    #[error("expression is not a predicate: {expr}")]
    NotAPredicate { expr: String },

    #[error("expression cannot be projected: {expr}")]
    UnsupportedProjection { expr: String },

    #[error("unsupported expression: {expr}")]
    UnsupportedExpression { expr: String },

    #[error("cannot compare {left} with {right}")]
    TypeMismatch { left: ValueType, right: ValueType },

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("column '{column}' cannot be ordered against null")]
    NullOrdering { column: String },

    #[error("text matching requires a Text column, '{column}' is {value_type}")]
    TextMatchOnNonText {
        column: String,
        value_type: ValueType,
    },

    #[error("date part requires a DateTime column, '{column}' is {value_type}")]
    DatePartOnNonDateTime {
        column: String,
        value_type: ValueType,
    },

    #[error("aggregation requires a numeric column, '{column}' is {value_type}")]
    NonNumericAggregation {
        column: String,
        value_type: ValueType,
    },

    #[error("list membership requires a column argument")]
    ListContainsRequiresColumn,

    #[error("aggregation cannot follow skip/take")]
    AggregationAfterPaging,

    #[error("group by cannot follow skip/take")]
    GroupingAfterPaging,

    #[error("projection has no columns")]
    EmptyProjection,

    #[error("projection alias '{alias}' is used more than once")]
    DuplicateAlias { alias: String },

    #[error("group result references unknown key '{alias}'")]
    UnknownGroupKey { alias: String },

    #[error("group by requires at least one key")]
    EmptyGroupKeys,

    #[error("group by requires at least one result")]
    EmptyGroupResults,

    #[error("wire serialization failed: {message}")]
    Serialize { message: String },

    #[error(transparent)]
    Schema(#[from] ValidationError),
}
