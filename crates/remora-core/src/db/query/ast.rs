use crate::{
    db::query::plan::QueryPlan,
    value::{Value, ValueType},
};
use serde::{Deserialize, Serialize};

///
/// ComparisonType
///
/// Wire comparison operator. Every operator has exactly one inverse, so
/// negation never needs to keep a `Not` wrapper around a comparison.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ComparisonType {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    StartWith,
    NotStartWith,
    Contain,
    NotContain,
    EndWith,
    NotEndWith,
    IsNull,
    IsNotNull,
    Exists,
    NotExists,
    In,
    NotIn,
}

impl ComparisonType {
    pub const ALL: [Self; 18] = [
        Self::Equal,
        Self::NotEqual,
        Self::Less,
        Self::LessOrEqual,
        Self::Greater,
        Self::GreaterOrEqual,
        Self::StartWith,
        Self::NotStartWith,
        Self::Contain,
        Self::NotContain,
        Self::EndWith,
        Self::NotEndWith,
        Self::IsNull,
        Self::IsNotNull,
        Self::Exists,
        Self::NotExists,
        Self::In,
        Self::NotIn,
    ];

    /// Logical negation of the operator.
    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::Less => Self::GreaterOrEqual,
            Self::GreaterOrEqual => Self::Less,
            Self::Greater => Self::LessOrEqual,
            Self::LessOrEqual => Self::Greater,
            Self::StartWith => Self::NotStartWith,
            Self::NotStartWith => Self::StartWith,
            Self::Contain => Self::NotContain,
            Self::NotContain => Self::Contain,
            Self::EndWith => Self::NotEndWith,
            Self::NotEndWith => Self::EndWith,
            Self::IsNull => Self::IsNotNull,
            Self::IsNotNull => Self::IsNull,
            Self::Exists => Self::NotExists,
            Self::NotExists => Self::Exists,
            Self::In => Self::NotIn,
            Self::NotIn => Self::In,
        }
    }

    /// Operator to use when the operands swap sides.
    #[must_use]
    pub const fn mirror(self) -> Self {
        match self {
            Self::Less => Self::Greater,
            Self::Greater => Self::Less,
            Self::LessOrEqual => Self::GreaterOrEqual,
            Self::GreaterOrEqual => Self::LessOrEqual,
            other => other,
        }
    }

    /// Plain binary comparisons (the only ones orientation applies to).
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessOrEqual
                | Self::Greater
                | Self::GreaterOrEqual
        )
    }

    #[must_use]
    pub const fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::Less | Self::LessOrEqual | Self::Greater | Self::GreaterOrEqual
        )
    }

    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(
            self,
            Self::IsNull | Self::IsNotNull | Self::Exists | Self::NotExists
        )
    }

    #[must_use]
    pub const fn is_membership(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    #[must_use]
    pub const fn is_text_match(self) -> bool {
        matches!(
            self,
            Self::StartWith
                | Self::NotStartWith
                | Self::Contain
                | Self::NotContain
                | Self::EndWith
                | Self::NotEndWith
        )
    }
}

///
/// LogicalOp
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
}

///
/// DatePart
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
}

impl DatePart {
    /// Extract the part from a timestamp.
    #[must_use]
    pub fn extract(self, ts: crate::types::Timestamp) -> i64 {
        match self {
            Self::Year => ts.year(),
            Self::Month => ts.month(),
            Self::Day => ts.day(),
            Self::Hour => ts.hour(),
        }
    }
}

///
/// AggregationKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum AggregationKind {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregationKind {
    /// Result type of the aggregation over an argument of type `arg`.
    #[must_use]
    pub const fn result_type(self, arg: ValueType) -> ValueType {
        match self {
            Self::Count => ValueType::Integer,
            Self::Avg => ValueType::Decimal,
            Self::Sum | Self::Min | Self::Max => arg,
        }
    }

    #[must_use]
    pub const fn requires_numeric(self) -> bool {
        matches!(self, Self::Sum | Self::Avg)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Sum => "Sum",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Avg => "Avg",
        }
    }
}

///
/// FunctionKind
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FunctionKind {
    DatePart(DatePart),
    Aggregation(AggregationKind),
}

///
/// DetailKind
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DetailKind {
    Exists,
    NotExists,
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl DetailKind {
    #[must_use]
    pub const fn is_existence(self) -> bool {
        matches!(self, Self::Exists | Self::NotExists)
    }

    /// Aggregation behind a value-producing detail.
    #[must_use]
    pub const fn aggregation(self) -> Option<AggregationKind> {
        match self {
            Self::Exists | Self::NotExists => None,
            Self::Count => Some(AggregationKind::Count),
            Self::Sum => Some(AggregationKind::Sum),
            Self::Min => Some(AggregationKind::Min),
            Self::Max => Some(AggregationKind::Max),
            Self::Avg => Some(AggregationKind::Avg),
        }
    }
}

impl From<AggregationKind> for DetailKind {
    fn from(kind: AggregationKind) -> Self {
        match kind {
            AggregationKind::Count => Self::Count,
            AggregationKind::Sum => Self::Sum,
            AggregationKind::Min => Self::Min,
            AggregationKind::Max => Self::Max,
            AggregationKind::Avg => Self::Avg,
        }
    }
}

///
/// Operand
/// Right-hand side of a comparison.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    None,
    Single(Box<ExpressionNode>),
    Many(Vec<ExpressionNode>),
}

///
/// ExpressionNode
///
/// Final, typed filter/projection tree. Comparison operands share one
/// wire type; groups are never empty; membership tests always hold their
/// values in `Operand::Many`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExpressionNode {
    Constant {
        value_type: ValueType,
        value: Value,
    },
    Column {
        value_type: ValueType,
        path: String,
    },
    Function {
        function: FunctionKind,
        value_type: ValueType,
        argument: Box<ExpressionNode>,
    },
    Comparison {
        op: ComparisonType,
        left: Box<ExpressionNode>,
        right: Operand,
    },
    Group {
        op: LogicalOp,
        children: Vec<ExpressionNode>,
        negated: bool,
    },
    Detail {
        kind: DetailKind,
        /// Reverse-join prefix, e.g. `[OrderLine:Order:Id]`.
        link: String,
        plan: Box<QueryPlan>,
    },
}

impl ExpressionNode {
    #[must_use]
    pub fn column(path: impl Into<String>, value_type: ValueType) -> Self {
        Self::Column {
            value_type,
            path: path.into(),
        }
    }

    #[must_use]
    pub const fn constant(value_type: ValueType, value: Value) -> Self {
        Self::Constant { value_type, value }
    }

    #[must_use]
    pub fn aggregation(kind: AggregationKind, argument: Self) -> Self {
        let value_type = kind.result_type(argument.value_type());

        Self::Function {
            function: FunctionKind::Aggregation(kind),
            value_type,
            argument: Box::new(argument),
        }
    }

    /// Wire type produced by the node; predicates are Boolean.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Constant { value_type, .. }
            | Self::Column { value_type, .. }
            | Self::Function { value_type, .. } => *value_type,
            Self::Comparison { .. } | Self::Group { .. } => ValueType::Boolean,
            Self::Detail { kind, plan, .. } => match kind.aggregation() {
                None => ValueType::Boolean,
                Some(_) => plan
                    .columns
                    .first()
                    .map_or(ValueType::Integer, |c| c.expression.value_type()),
            },
        }
    }

    /// True for nodes that can stand in filter position.
    #[must_use]
    pub const fn is_predicate(&self) -> bool {
        match self {
            Self::Comparison { .. } | Self::Group { .. } => true,
            Self::Detail { kind, .. } => kind.is_existence(),
            _ => false,
        }
    }
}
