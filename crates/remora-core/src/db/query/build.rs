//! AST builder: normalized raw nodes to `ExpressionNode`.

use crate::{
    db::query::{
        ast::{AggregationKind, ComparisonType, DetailKind, ExpressionNode, FunctionKind, LogicalOp, Operand},
        error::CompileError,
        plan::{PlanColumn, PlanShape, QueryPlan},
        raw::{RawColumn, RawDetail, RawNode},
    },
    value::{Value, ValueType},
};

/// Build a node in filter position.
pub(crate) fn build_predicate(node: RawNode) -> Result<ExpressionNode, CompileError> {
    match node {
        // keeps a wire representation for constant filters
        RawNode::Constant(Value::Boolean(b)) => Ok(ExpressionNode::Comparison {
            op: ComparisonType::Equal,
            left: Box::new(ExpressionNode::constant(ValueType::Boolean, Value::Boolean(b))),
            right: Operand::Single(Box::new(ExpressionNode::constant(
                ValueType::Boolean,
                Value::Boolean(true),
            ))),
        }),

        RawNode::Compare {
            op: op @ (ComparisonType::Exists | ComparisonType::NotExists),
            left,
            right: None,
        } => match *left {
            RawNode::Detail(detail) => {
                let kind = if op == ComparisonType::Exists {
                    DetailKind::Exists
                } else {
                    DetailKind::NotExists
                };
                build_detail(detail, kind)
            }
            other => Err(CompileError::NotAPredicate {
                expr: other.to_string(),
            }),
        },

        RawNode::Compare { op, left, right } => {
            let left = build_value(*left)?;
            let ty = left.value_type();
            let right = match right.map(|r| *r) {
                None => Operand::None,
                Some(RawNode::List(values)) => Operand::Many(
                    values
                        .into_iter()
                        .map(|v| ExpressionNode::constant(ty, v))
                        .collect(),
                ),
                Some(RawNode::Constant(v)) => {
                    let vt = v.value_type().unwrap_or(ty);
                    Operand::Single(Box::new(ExpressionNode::constant(vt, v)))
                }
                Some(other) => Operand::Single(Box::new(build_value(other)?)),
            };

            Ok(ExpressionNode::Comparison {
                op,
                left: Box::new(left),
                right,
            })
        }

        RawNode::Logical {
            op,
            left,
            right,
            negated,
        } => {
            let mut children = Vec::new();
            flatten_left(op, *left, &mut children)?;
            children.push(build_predicate(*right)?);

            Ok(ExpressionNode::Group {
                op,
                children,
                negated,
            })
        }

        RawNode::Not(inner) => Ok(ExpressionNode::Group {
            op: LogicalOp::And,
            children: vec![build_predicate(*inner)?],
            negated: true,
        }),

        other => Err(CompileError::NotAPredicate {
            expr: other.to_string(),
        }),
    }
}

// Only a left-associated chain of the same, non-negated operator flattens.
fn flatten_left(
    op: LogicalOp,
    node: RawNode,
    out: &mut Vec<ExpressionNode>,
) -> Result<(), CompileError> {
    match node {
        RawNode::Logical {
            op: inner,
            left,
            right,
            negated: false,
        } if inner == op => {
            flatten_left(op, *left, out)?;
            out.push(build_predicate(*right)?);
        }
        other => out.push(build_predicate(other)?),
    }

    Ok(())
}

/// Build a node in value position.
pub(crate) fn build_value(node: RawNode) -> Result<ExpressionNode, CompileError> {
    match node {
        RawNode::Constant(v) => {
            let vt = v.value_type().unwrap_or(ValueType::Text);
            Ok(ExpressionNode::constant(vt, v))
        }
        RawNode::Column(column) => Ok(build_column(column)),
        RawNode::Detail(detail) => {
            let kind = detail.kind;
            build_detail(detail, kind)
        }
        other => Err(CompileError::UnsupportedProjection {
            expr: other.to_string(),
        }),
    }
}

fn build_column(column: RawColumn) -> ExpressionNode {
    match column.date_part {
        Some(part) => ExpressionNode::Function {
            function: FunctionKind::DatePart(part),
            value_type: ValueType::Integer,
            argument: Box::new(ExpressionNode::column(column.path, ValueType::DateTime)),
        },
        None => ExpressionNode::column(column.path, column.value_type),
    }
}

fn build_detail(detail: RawDetail, kind: DetailKind) -> Result<ExpressionNode, CompileError> {
    let mut plan = QueryPlan::new(detail.child_schema);
    plan.filter = detail.filter.map(|f| build_predicate(*f)).transpose()?;

    if let Some(agg) = kind.aggregation() {
        let argument = match (agg, detail.argument) {
            (AggregationKind::Count, _) | (_, None) => {
                ExpressionNode::column(detail.child_key, ValueType::Guid)
            }
            (_, Some(column)) => build_column(column),
        };
        plan.columns = vec![PlanColumn::new(
            agg.label(),
            ExpressionNode::aggregation(agg, argument),
        )];
        plan.shape = PlanShape::Aggregate;
    } else {
        plan.columns = vec![PlanColumn::new(
            detail.child_key.clone(),
            ExpressionNode::column(detail.child_key, ValueType::Guid),
        )];
    }

    Ok(ExpressionNode::Detail {
        kind,
        link: detail.link,
        plan: Box::new(plan),
    })
}
