//! Wire form of a query plan: the JSON contract of the remote backend.

use crate::{
    db::query::{
        ast::{
            AggregationKind, ComparisonType, DatePart, DetailKind, ExpressionNode, FunctionKind,
            LogicalOp, Operand,
        },
        error::CompileError,
        plan::{OrderDirection, QueryPlan},
    },
    value::ValueType,
};
use serde::{Serialize, Serializer, ser::SerializeMap};

///
/// NamedMap
/// Insertion-ordered map; serializes as a JSON object in push order.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NamedMap<V>(Vec<(String, V)>);

impl<V> NamedMap<V> {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, key: impl Into<String>, value: V) {
        self.0.push((key.into(), value));
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find_map(|(k, v)| (k == key).then_some(v))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.0.iter_mut().find_map(|(k, v)| (k == key).then_some(v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.iter().map(|(_, v)| v)
    }
}

impl<V: Serialize> Serialize for NamedMap<V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

///
/// ExpressionType
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum ExpressionType {
    SchemaColumn,
    Function,
    SubQuery,
    Parameter,
}

///
/// FunctionType
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum FunctionType {
    Aggregation,
    DatePart,
}

///
/// FilterType
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum FilterType {
    CompareFilter,
    IsNullFilter,
    InFilter,
    Exists,
    FilterGroup,
}

///
/// WireParameter
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireParameter {
    pub data_value_type: ValueType,
    pub value: serde_json::Value,
}

///
/// WireExpression
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireExpression {
    pub expression_type: ExpressionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_type: Option<FunctionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation_type: Option<AggregationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_part_type: Option<DatePart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_argument: Option<Box<WireExpression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<WireParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_filters: Option<Box<WireFilter>>,
}

impl WireExpression {
    const fn of(expression_type: ExpressionType) -> Self {
        Self {
            expression_type,
            column_path: None,
            function_type: None,
            aggregation_type: None,
            date_part_type: None,
            function_argument: None,
            parameter: None,
            sub_filters: None,
        }
    }

    fn schema_column(path: impl Into<String>) -> Self {
        Self {
            column_path: Some(path.into()),
            ..Self::of(ExpressionType::SchemaColumn)
        }
    }
}

///
/// WireColumn
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireColumn {
    #[serde(flatten)]
    pub expression: WireExpression,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_direction: Option<OrderDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_position: Option<u32>,
}

///
/// WireColumns
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireColumns {
    pub items: NamedMap<WireColumn>,
}

///
/// WireFilter
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireFilter {
    pub filter_type: FilterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_type: Option<ComparisonType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_expression: Option<WireExpression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_expression: Option<WireExpression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_expressions: Option<Vec<WireExpression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_operation: Option<LogicalOp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_negative: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_filters: Option<Box<WireFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<NamedMap<WireFilter>>,
}

impl WireFilter {
    const fn of(filter_type: FilterType) -> Self {
        Self {
            filter_type,
            comparison_type: None,
            left_expression: None,
            right_expression: None,
            right_expressions: None,
            logical_operation: None,
            is_negative: None,
            sub_filters: None,
            items: None,
        }
    }

    fn group(op: LogicalOp, negated: bool, items: NamedMap<Self>) -> Self {
        Self {
            logical_operation: Some(op),
            is_negative: Some(negated),
            items: Some(items),
            ..Self::of(FilterType::FilterGroup)
        }
    }
}

///
/// WireQuery
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireQuery {
    pub root_schema_name: String,
    pub row_count: i64,
    pub rows_offset: i64,
    pub is_pageable: bool,
    pub all_columns: bool,
    pub columns: WireColumns,
    pub filters: WireFilter,
}

// ----------------------------------------------------------------------
// Plan -> wire
// ----------------------------------------------------------------------

impl QueryPlan {
    /// Convert into the backend's query contract.
    pub fn to_wire(&self) -> Result<WireQuery, CompileError> {
        let row_count = self.take.map_or(-1, i64::from);
        let rows_offset = if self.group_keys.is_some() {
            -1
        } else {
            self.skip.map_or(0, i64::from)
        };

        Ok(WireQuery {
            root_schema_name: self.root_schema.clone(),
            row_count,
            rows_offset,
            is_pageable: self.is_pageable,
            all_columns: false,
            columns: WireColumns {
                items: wire_columns(self)?,
            },
            filters: root_filter(self.filter.as_ref())?,
        })
    }

    /// Wire form as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, CompileError> {
        serde_json::to_value(self.to_wire()?).map_err(|err| CompileError::Serialize {
            message: err.to_string(),
        })
    }
}

fn wire_columns(plan: &QueryPlan) -> Result<NamedMap<WireColumn>, CompileError> {
    let mut items = NamedMap::new();
    for column in &plan.columns {
        items.push(
            column.alias.clone(),
            WireColumn {
                expression: expression(&column.expression)?,
                order_direction: None,
                order_position: None,
            },
        );
    }

    // Order keys land on a matching projected column, or an order-only one.
    for (i, key) in plan.order_keys.iter().enumerate() {
        let position = u32::try_from(i + 1).unwrap_or(u32::MAX);
        let existing = plan
            .columns
            .iter()
            .find(|c| c.expression == key.expression)
            .and_then(|c| items.get_mut(&c.alias))
            .filter(|c| c.order_direction.is_none());

        if let Some(column) = existing {
            column.order_direction = Some(key.direction);
            column.order_position = Some(position);
        } else {
            items.push(
                order_alias(&items, position),
                WireColumn {
                    expression: expression(&key.expression)?,
                    order_direction: Some(key.direction),
                    order_position: Some(position),
                },
            );
        }
    }

    Ok(items)
}

// First `OrderBy{n}` alias not already taken by a projected column.
fn order_alias(items: &NamedMap<WireColumn>, position: u32) -> String {
    let base = format!("OrderBy{position}");
    let mut alias = base.clone();
    let mut suffix = 1;
    while items.get(&alias).is_some() {
        alias = format!("{base}_{suffix}");
        suffix += 1;
    }

    alias
}

fn root_filter(filter: Option<&ExpressionNode>) -> Result<WireFilter, CompileError> {
    match filter {
        None => Ok(WireFilter::group(LogicalOp::And, false, NamedMap::new())),
        Some(node @ ExpressionNode::Group { .. }) => wire_filter(node),
        Some(node) => {
            let mut items = NamedMap::new();
            items.push("0", wire_filter(node)?);
            Ok(WireFilter::group(LogicalOp::And, false, items))
        }
    }
}

fn wire_filter(node: &ExpressionNode) -> Result<WireFilter, CompileError> {
    match node {
        ExpressionNode::Group {
            op,
            children,
            negated,
        } => {
            let mut items = NamedMap::new();
            for (i, child) in children.iter().enumerate() {
                items.push(i.to_string(), wire_filter(child)?);
            }
            Ok(WireFilter::group(*op, *negated, items))
        }

        ExpressionNode::Comparison { op, left, right } => {
            let left = Some(expression(left)?);
            let (right_expression, right_expressions) = match right {
                Operand::None => (None, None),
                Operand::Single(node) => (Some(expression(node)?), None),
                Operand::Many(nodes) => (
                    None,
                    Some(nodes.iter().map(expression).collect::<Result<Vec<_>, _>>()?),
                ),
            };
            let (filter_type, comparison_type) = match op {
                ComparisonType::In => (FilterType::InFilter, ComparisonType::Equal),
                ComparisonType::NotIn => (FilterType::InFilter, ComparisonType::NotEqual),
                ComparisonType::IsNull | ComparisonType::IsNotNull => (FilterType::IsNullFilter, *op),
                _ => (FilterType::CompareFilter, *op),
            };

            Ok(WireFilter {
                comparison_type: Some(comparison_type),
                left_expression: left,
                right_expression,
                right_expressions,
                ..WireFilter::of(filter_type)
            })
        }

        ExpressionNode::Detail { kind, link, plan } if kind.is_existence() => {
            let key = plan
                .columns
                .first()
                .and_then(|c| match &c.expression {
                    ExpressionNode::Column { path, .. } => Some(path.as_str()),
                    _ => None,
                })
                .unwrap_or("Id");
            let comparison_type = if *kind == DetailKind::Exists {
                ComparisonType::Exists
            } else {
                ComparisonType::NotExists
            };

            Ok(WireFilter {
                comparison_type: Some(comparison_type),
                left_expression: Some(WireExpression::schema_column(format!("{link}.{key}"))),
                sub_filters: Some(Box::new(root_filter(plan.filter.as_ref())?)),
                ..WireFilter::of(FilterType::Exists)
            })
        }

        other => Err(CompileError::NotAPredicate {
            expr: format!("{other:?}"),
        }),
    }
}

fn expression(node: &ExpressionNode) -> Result<WireExpression, CompileError> {
    match node {
        ExpressionNode::Constant { value_type, value } => Ok(WireExpression {
            parameter: Some(WireParameter {
                data_value_type: *value_type,
                value: value.to_json(),
            }),
            ..WireExpression::of(ExpressionType::Parameter)
        }),

        ExpressionNode::Column { path, .. } => Ok(WireExpression::schema_column(path.clone())),

        ExpressionNode::Function {
            function, argument, ..
        } => {
            let (function_type, aggregation_type, date_part_type) = match function {
                FunctionKind::DatePart(part) => (FunctionType::DatePart, None, Some(*part)),
                FunctionKind::Aggregation(kind) => (FunctionType::Aggregation, Some(*kind), None),
            };

            Ok(WireExpression {
                function_type: Some(function_type),
                aggregation_type,
                date_part_type,
                function_argument: Some(Box::new(expression(argument)?)),
                ..WireExpression::of(ExpressionType::Function)
            })
        }

        ExpressionNode::Detail { kind, link, plan } => {
            let Some(aggregation) = kind.aggregation() else {
                return Err(CompileError::UnsupportedProjection {
                    expr: format!("{link} {kind:?}"),
                });
            };
            let column = plan
                .columns
                .first()
                .and_then(|c| match &c.expression {
                    ExpressionNode::Function { argument, .. } => match &**argument {
                        ExpressionNode::Column { path, .. } => Some(path.as_str()),
                        _ => None,
                    },
                    _ => None,
                })
                .unwrap_or("Id");
            let sub_filters = match &plan.filter {
                Some(filter) => Some(Box::new(root_filter(Some(filter))?)),
                None => None,
            };

            Ok(WireExpression {
                column_path: Some(format!("{link}.{column}")),
                function_type: Some(FunctionType::Aggregation),
                aggregation_type: Some(aggregation),
                sub_filters,
                ..WireExpression::of(ExpressionType::SubQuery)
            })
        }

        ExpressionNode::Comparison { .. } | ExpressionNode::Group { .. } => {
            Err(CompileError::UnsupportedProjection {
                expr: format!("{node:?}"),
            })
        }
    }
}
