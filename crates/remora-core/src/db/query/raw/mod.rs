//! Raw nodes: the loosely typed intermediate form between host expressions
//! and the final AST.
//!
//! `parse` resolves member paths against the schema and evaluates closed
//! sub-expressions; `normalize` canonicalizes the result so the AST
//! builder only ever sees one shape per construct.

mod normalize;
mod parse;


use crate::{
    db::query::{
        ast::{ComparisonType, DatePart, DetailKind, LogicalOp},
        expr::CompareOp,
    },
    value::{Value, ValueType},
};
use std::fmt;

pub(crate) use normalize::{normalize_predicate, normalize_value};
pub(crate) use parse::ParseContext;

///
/// RawColumn
///
/// Resolved column reference. `value_type` is the type the node produces,
/// so a date-part column is `Integer` over an underlying `DateTime`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RawColumn {
    pub path: String,
    pub value_type: ValueType,
    pub date_part: Option<DatePart>,
}

impl RawColumn {
    pub fn new(path: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            path: path.into(),
            value_type,
            date_part: None,
        }
    }
}

///
/// RawDetail
/// Detail access resolved to its join and terminal aggregation.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RawDetail {
    pub kind: DetailKind,
    pub name: String,
    pub link: String,
    pub child_schema: String,
    pub child_key: String,
    pub filter: Option<Box<RawNode>>,
    pub argument: Option<RawColumn>,
}

impl RawDetail {
    pub fn value_type(&self) -> ValueType {
        match (self.kind.aggregation(), &self.argument) {
            (None, _) => ValueType::Boolean,
            (Some(agg), Some(arg)) => agg.result_type(arg.value_type),
            (Some(agg), None) => agg.result_type(ValueType::Integer),
        }
    }
}

///
/// RawNode
///
/// Partial-match and membership tests are comparisons with the matching
/// operator (`StartWith`, `In`, ...); existence tests are `Exists`
/// comparisons over a detail.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum RawNode {
    Constant(Value),
    List(Vec<Value>),
    Column(RawColumn),
    Detail(RawDetail),
    Compare {
        op: ComparisonType,
        left: Box<RawNode>,
        right: Option<Box<RawNode>>,
    },
    Logical {
        op: LogicalOp,
        left: Box<RawNode>,
        right: Box<RawNode>,
        negated: bool,
    },
    Not(Box<RawNode>),
}

impl RawNode {
    pub fn compare(op: ComparisonType, left: Self, right: Self) -> Self {
        Self::Compare {
            op,
            left: Box::new(left),
            right: Some(Box::new(right)),
        }
    }

    pub fn unary(op: ComparisonType, operand: Self) -> Self {
        Self::Compare {
            op,
            left: Box::new(operand),
            right: None,
        }
    }

    pub fn logical(op: LogicalOp, left: Self, right: Self) -> Self {
        Self::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
            negated: false,
        }
    }

    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Type produced by the node; `None` for lists and null constants.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Constant(v) => v.value_type(),
            Self::List(_) => None,
            Self::Column(c) => Some(c.value_type),
            Self::Detail(d) => Some(d.value_type()),
            Self::Compare { .. } | Self::Logical { .. } | Self::Not(_) => Some(ValueType::Boolean),
        }
    }

    pub const fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_) | Self::List(_))
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Constant(v) => v.as_bool(),
            _ => None,
        }
    }
}

impl fmt::Display for RawNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "{v}"),
            Self::List(values) => write!(f, "[{} values]", values.len()),
            Self::Column(c) => match c.date_part {
                Some(part) => write!(f, "{part:?}({})", c.path),
                None => f.write_str(&c.path),
            },
            Self::Detail(d) => write!(f, "{}.{:?}", d.name, d.kind),
            Self::Compare { op, left, right } => match right {
                Some(right) => write!(f, "({left} {op:?} {right})"),
                None => write!(f, "({left} {op:?})"),
            },
            Self::Logical {
                op,
                left,
                right,
                negated,
            } => {
                let bang = if *negated { "!" } else { "" };
                write!(f, "{bang}({left} {op:?} {right})")
            }
            Self::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

impl From<CompareOp> for ComparisonType {
    fn from(op: CompareOp) -> Self {
        match op {
            CompareOp::Eq => Self::Equal,
            CompareOp::Ne => Self::NotEqual,
            CompareOp::Lt => Self::Less,
            CompareOp::Lte => Self::LessOrEqual,
            CompareOp::Gt => Self::Greater,
            CompareOp::Gte => Self::GreaterOrEqual,
        }
    }
}
