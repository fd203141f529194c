use crate::{
    db::query::{
        ast::{ComparisonType, LogicalOp},
        error::CompileError,
        raw::{RawColumn, RawNode, parse::compare_values},
    },
    value::{Value, ValueType},
};

///
/// Normalize a node in predicate position into canonical form.
///
/// Normalization guarantees:
/// - no `Not` wrapper survives: comparisons flip through the inverse
///   table, groups carry a `negated` flag (no De Morgan rewrite)
/// - bare boolean columns become `col = true` (`col = false` under NOT)
/// - constants sit on the right, with the operator mirrored
/// - comparisons against null become `IsNull` / `IsNotNull`
/// - the constant side is coerced to the column's wire type
/// - constant `true` / `false` are folded out of groups
///
/// The pass is idempotent: normalizing its own output is a no-op.
///
pub(crate) fn normalize_predicate(node: RawNode) -> Result<RawNode, CompileError> {
    match node {
        RawNode::Constant(Value::Boolean(b)) => Ok(RawNode::Constant(Value::Boolean(b))),
        RawNode::Column(column) => promote(column, true),
        RawNode::Compare { op, left, right } => normalize_compare(op, *left, right.map(|r| *r)),
        RawNode::Logical {
            op,
            left,
            right,
            negated,
        } => {
            let left = normalize_predicate(*left)?;
            let right = normalize_predicate(*right)?;
            let folded = fold(op, left, right);

            Ok(if negated { negate(folded) } else { folded })
        }
        RawNode::Not(inner) => match *inner {
            RawNode::Not(double) => normalize_predicate(*double),
            RawNode::Column(column) => promote(column, false),
            other => Ok(negate(normalize_predicate(other)?)),
        },
        other @ (RawNode::Constant(_) | RawNode::List(_) | RawNode::Detail(_)) => {
            Err(CompileError::NotAPredicate {
                expr: other.to_string(),
            })
        }
    }
}

///
/// Normalize a node in value position (comparison operand, projection,
/// order key). Detail sub-filters are normalized as predicates.
///
pub(crate) fn normalize_value(node: RawNode) -> Result<RawNode, CompileError> {
    match node {
        RawNode::Constant(_) | RawNode::List(_) | RawNode::Column(_) => Ok(node),
        RawNode::Detail(mut detail) => {
            detail.filter = match detail.filter {
                Some(filter) => match normalize_predicate(*filter)? {
                    RawNode::Constant(Value::Boolean(true)) => None,
                    normalized => Some(Box::new(normalized)),
                },
                None => None,
            };

            Ok(RawNode::Detail(detail))
        }
        other => Err(CompileError::UnsupportedProjection {
            expr: other.to_string(),
        }),
    }
}

///
/// Boolean promotion: a bare column in predicate position.
///
fn promote(column: RawColumn, expected: bool) -> Result<RawNode, CompileError> {
    if column.value_type != ValueType::Boolean {
        return Err(CompileError::NotAPredicate { expr: column.path });
    }

    Ok(RawNode::compare(
        ComparisonType::Equal,
        RawNode::Column(column),
        RawNode::Constant(Value::Boolean(expected)),
    ))
}

///
/// Negate a normalized predicate.
///
fn negate(node: RawNode) -> RawNode {
    match node {
        RawNode::Constant(Value::Boolean(b)) => RawNode::Constant(Value::Boolean(!b)),
        RawNode::Compare { op, left, right } => RawNode::Compare {
            op: op.inverse(),
            left,
            right,
        },
        RawNode::Logical {
            op,
            left,
            right,
            negated,
        } => RawNode::Logical {
            op,
            left,
            right,
            negated: !negated,
        },
        other => RawNode::not(other),
    }
}

///
/// Fold constant operands out of a binary group.
///
fn fold(op: LogicalOp, left: RawNode, right: RawNode) -> RawNode {
    match (op, left.as_bool(), right.as_bool()) {
        (LogicalOp::And, Some(false), _) | (LogicalOp::And, _, Some(false)) => {
            RawNode::Constant(Value::Boolean(false))
        }
        (LogicalOp::Or, Some(true), _) | (LogicalOp::Or, _, Some(true)) => {
            RawNode::Constant(Value::Boolean(true))
        }
        (LogicalOp::And, Some(true), _) | (LogicalOp::Or, Some(false), _) => right,
        (LogicalOp::And, _, Some(true)) | (LogicalOp::Or, _, Some(false)) => left,
        _ => RawNode::logical(op, left, right),
    }
}

///
/// Canonicalize one comparison.
///
fn normalize_compare(
    op: ComparisonType,
    left: RawNode,
    right: Option<RawNode>,
) -> Result<RawNode, CompileError> {
    let left = normalize_value(left)?;
    let right = right.map(normalize_value).transpose()?;

    let Some(right) = right else {
        return normalize_unary(op, left);
    };

    // Phase 1: orientation.
    let (op, left, right) = if op.is_binary() && left.is_constant() && !right.is_constant() {
        (op.mirror(), right, left)
    } else {
        (op, left, right)
    };

    // Phase 2: fully constant comparisons.
    if let (RawNode::Constant(a), RawNode::Constant(b)) = (&left, &right)
        && op.is_binary()
    {
        return Ok(RawNode::Constant(Value::Boolean(compare_values(op, a, b))));
    }

    // Phase 3: null folding.
    if matches!(right, RawNode::Constant(Value::Null)) {
        return match op {
            ComparisonType::Equal => normalize_unary(ComparisonType::IsNull, left),
            ComparisonType::NotEqual => normalize_unary(ComparisonType::IsNotNull, left),
            op if op.is_ordering() => Err(CompileError::NullOrdering {
                column: left.to_string(),
            }),
            _ => Err(CompileError::UnsupportedExpression {
                expr: format!("{left} {op:?} null"),
            }),
        };
    }

    // Phase 4: type unification against the left side.
    let Some(left_type) = left.value_type().filter(|_| !left.is_constant()) else {
        return Err(CompileError::UnsupportedExpression {
            expr: format!("{left} {op:?} {right}"),
        });
    };

    let right = match right {
        RawNode::List(values) => {
            if !op.is_membership() {
                return Err(CompileError::UnsupportedExpression {
                    expr: format!("{left} {op:?} list"),
                });
            }
            if values.is_empty() {
                return Ok(RawNode::Constant(Value::Boolean(op == ComparisonType::NotIn)));
            }
            let values = values
                .iter()
                .map(|v| v.coerce_to(left_type))
                .collect::<Result<Vec<_>, _>>()?;

            RawNode::List(values)
        }
        _ if op.is_membership() => {
            return Err(CompileError::ListContainsRequiresColumn);
        }
        RawNode::Constant(value) => RawNode::Constant(value.coerce_to(left_type)?),
        other => {
            let right_type = other.value_type().unwrap_or(left_type);
            if right_type != left_type && left_type.numeric_join(right_type).is_none() {
                return Err(CompileError::TypeMismatch {
                    left: left_type,
                    right: right_type,
                });
            }
            other
        }
    };

    Ok(RawNode::compare(op, left, right))
}

fn normalize_unary(op: ComparisonType, operand: RawNode) -> Result<RawNode, CompileError> {
    match (op, &operand) {
        (ComparisonType::IsNull | ComparisonType::IsNotNull, RawNode::Column(_))
        | (ComparisonType::Exists | ComparisonType::NotExists, RawNode::Detail(_)) => {
            Ok(RawNode::unary(op, operand))
        }
        _ => Err(CompileError::UnsupportedExpression {
            expr: format!("{operand} {op:?}"),
        }),
    }
}
