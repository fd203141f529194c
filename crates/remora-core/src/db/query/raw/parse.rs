use crate::{
    db::query::{
        ast::{ComparisonType, DatePart, DetailKind, LogicalOp},
        error::CompileError,
        expr::{DetailCall, Expr, Method},
        raw::{RawColumn, RawDetail, RawNode},
    },
    model::{DetailProperty, Member, ModelSchema, SchemaRegistry, ValidationError},
    value::{Value, ValueType},
};
use std::{any::TypeId, cmp::Ordering, sync::Arc};

///
/// ParseContext
///
/// Resolves host expressions against the schema of the expression's
/// parameter type. Detail sub-chains are parsed with a child context.
///

pub(crate) struct ParseContext<'a> {
    registry: &'a SchemaRegistry,
    schema: Arc<ModelSchema>,
}

// One resolved path segment, owned so the walk can move between schemas.
enum Step {
    Scalar(String, ValueType),
    Lookup(String, TypeId),
    Detail(DetailProperty),
}

impl<'a> ParseContext<'a> {
    pub fn new(registry: &'a SchemaRegistry, schema: Arc<ModelSchema>) -> Self {
        Self { registry, schema }
    }

    pub fn parse(&self, expr: &Expr) -> Result<RawNode, CompileError> {
        if !expr.is_open() {
            return eval_closed(expr);
        }

        match expr {
            Expr::Member(path) => self.member(path).map(RawNode::Column),
            Expr::Compare { op, left, right } => Ok(RawNode::compare(
                (*op).into(),
                self.parse(left)?,
                self.parse(right)?,
            )),
            Expr::And(left, right) => Ok(RawNode::logical(
                LogicalOp::And,
                self.parse(left)?,
                self.parse(right)?,
            )),
            Expr::Or(left, right) => Ok(RawNode::logical(
                LogicalOp::Or,
                self.parse(left)?,
                self.parse(right)?,
            )),
            Expr::Not(inner) => Ok(RawNode::not(self.parse(inner)?)),
            Expr::Call {
                target,
                method,
                args,
            } => self.call(expr, target, method, args),
            Expr::Detail { path, chain } => self.detail(path, chain),
            Expr::Const(_) | Expr::List(_) => eval_closed(expr),
        }
    }

    fn target_schema(&self, type_id: TypeId, name: &str) -> Result<Arc<ModelSchema>, CompileError> {
        self.registry.schema_of(type_id).ok_or_else(|| {
            CompileError::Schema(ValidationError::UnregisteredModel {
                model: name.to_string(),
            })
        })
    }

    fn step(schema: &ModelSchema, name: &str) -> Result<Step, CompileError> {
        match schema.member(name) {
            Some(Member::Scalar(p)) => Ok(Step::Scalar(p.wire_column.clone(), p.value_type)),
            Some(Member::Lookup(l)) => Ok(Step::Lookup(l.wire_column.clone(), l.target_type)),
            Some(Member::Detail(d)) => Ok(Step::Detail(d.clone())),
            None => Err(CompileError::UnknownProperty {
                schema: schema.schema_name().to_string(),
                property: name.to_string(),
            }),
        }
    }

    // Member path -> wire column path, walking lookups.
    fn member(&self, path: &[String]) -> Result<RawColumn, CompileError> {
        let mut schema = Arc::clone(&self.schema);
        let mut wire: Vec<String> = Vec::with_capacity(path.len());

        for (i, name) in path.iter().enumerate() {
            let last = i + 1 == path.len();

            match Self::step(&schema, name)? {
                Step::Scalar(column, value_type) => {
                    wire.push(column);
                    if let Some(next) = path.get(i + 1) {
                        return Err(CompileError::UnknownProperty {
                            schema: schema.schema_name().to_string(),
                            property: format!("{name}.{next}"),
                        });
                    }
                    return Ok(RawColumn::new(wire.join("."), value_type));
                }
                Step::Lookup(column, target) => {
                    wire.push(column);
                    if last {
                        return Ok(RawColumn::new(wire.join("."), ValueType::Guid));
                    }
                    schema = self.target_schema(target, name)?;
                }
                Step::Detail(_) => {
                    let reason = if last {
                        "detail access requires a terminal aggregation"
                    } else {
                        "member access past a detail"
                    };
                    return Err(CompileError::AmbiguousDetailChain {
                        path: path.join("."),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        Err(CompileError::UnknownProperty {
            schema: self.schema.schema_name().to_string(),
            property: String::new(),
        })
    }

    // Target of a text match or date part: a plain column.
    fn plain_column(&self, target: &Expr) -> Result<RawColumn, CompileError> {
        match self.parse(target)? {
            RawNode::Column(c) if c.date_part.is_none() => Ok(c),
            other => Err(CompileError::UnsupportedExpression {
                expr: other.to_string(),
            }),
        }
    }

    fn call(
        &self,
        expr: &Expr,
        target: &Expr,
        method: &Method,
        args: &[Expr],
    ) -> Result<RawNode, CompileError> {
        let arity = |expected: usize| {
            if args.len() == expected {
                Ok(())
            } else {
                Err(CompileError::InvalidArguments {
                    method: method.name().to_string(),
                    expected,
                    found: args.len(),
                })
            }
        };

        match method {
            // captured list membership
            Method::Contains if !target.is_open() => {
                arity(1)?;
                let RawNode::List(values) = eval_closed(target)? else {
                    return Err(CompileError::UnsupportedExpression {
                        expr: expr.to_string(),
                    });
                };
                match self.parse(&args[0])? {
                    RawNode::Column(column) => Ok(RawNode::compare(
                        ComparisonType::In,
                        RawNode::Column(column),
                        RawNode::List(values),
                    )),
                    _ => Err(CompileError::ListContainsRequiresColumn),
                }
            }

            Method::StartsWith | Method::EndsWith | Method::Contains => {
                arity(1)?;
                let column = self.plain_column(target)?;
                if column.value_type != ValueType::Text {
                    return Err(CompileError::TextMatchOnNonText {
                        column: column.path,
                        value_type: column.value_type,
                    });
                }
                if args[0].is_open() {
                    return Err(CompileError::UnsupportedExpression {
                        expr: expr.to_string(),
                    });
                }
                let pattern = match eval(&args[0])? {
                    Value::Null => {
                        return Err(CompileError::UnsupportedExpression {
                            expr: expr.to_string(),
                        });
                    }
                    value => value.coerce_to(ValueType::Text)?,
                };
                let op = match method {
                    Method::StartsWith => ComparisonType::StartWith,
                    Method::EndsWith => ComparisonType::EndWith,
                    _ => ComparisonType::Contain,
                };

                Ok(RawNode::compare(
                    op,
                    RawNode::Column(column),
                    RawNode::Constant(pattern),
                ))
            }

            Method::Year | Method::Month | Method::Day | Method::Hour => {
                arity(0)?;
                let mut column = self.plain_column(target)?;
                if column.value_type != ValueType::DateTime {
                    return Err(CompileError::DatePartOnNonDateTime {
                        column: column.path,
                        value_type: column.value_type,
                    });
                }
                column.date_part = date_part(method);
                column.value_type = ValueType::Integer;

                Ok(RawNode::Column(column))
            }

            Method::Other(name) => Err(CompileError::UnknownMethod {
                method: name.clone(),
            }),
        }
    }

    fn detail(&self, path: &[String], chain: &[DetailCall]) -> Result<RawNode, CompileError> {
        let full = path.join(".");
        let ambiguous = |reason: &str| CompileError::AmbiguousDetailChain {
            path: full.clone(),
            reason: reason.to_string(),
        };

        // resolve the detail property
        let mut schema = Arc::clone(&self.schema);
        let mut through_lookup = false;
        let mut found = None;
        for (i, name) in path.iter().enumerate() {
            let last = i + 1 == path.len();
            match Self::step(&schema, name)? {
                Step::Detail(d) if last => found = Some(d),
                Step::Detail(_) => return Err(ambiguous("member access past a detail")),
                Step::Lookup(_, target) if !last => {
                    through_lookup = true;
                    schema = self.target_schema(target, name)?;
                }
                Step::Scalar(..) | Step::Lookup(..) => {
                    return Err(ambiguous("not a detail property"));
                }
            }
        }
        let Some(detail) = found else {
            return Err(ambiguous("not a detail property"));
        };
        if through_lookup {
            return Err(ambiguous("detail access through a lookup"));
        }

        let child = self.target_schema(detail.target_type, &detail.target_schema)?;
        let child_cx = ParseContext::new(self.registry, Arc::clone(&child));

        // fold the sub-chain
        let mut filters: Vec<RawNode> = Vec::new();
        let mut terminal: Option<(DetailKind, Option<RawColumn>)> = None;
        for call in chain {
            if terminal.is_some() {
                return Err(ambiguous("operator after a terminal aggregation"));
            }
            match call {
                DetailCall::Where(pred) => filters.push(child_cx.parse(pred)?),
                DetailCall::OrderBy(_) | DetailCall::First(_) => {
                    return Err(CompileError::UnsupportedDetailOperator {
                        detail: detail.name.clone(),
                        operator: call.name().to_string(),
                    });
                }
                DetailCall::Any(pred) | DetailCall::Count(pred) => {
                    if let Some(pred) = pred {
                        filters.push(child_cx.parse(pred)?);
                    }
                    let kind = if matches!(call, DetailCall::Any(_)) {
                        DetailKind::Exists
                    } else {
                        DetailKind::Count
                    };
                    terminal = Some((kind, None));
                }
                DetailCall::Sum(arg) => {
                    terminal = Some((DetailKind::Sum, Some(child_cx.aggregate_argument(arg, true)?)));
                }
                DetailCall::Average(arg) => {
                    terminal = Some((DetailKind::Avg, Some(child_cx.aggregate_argument(arg, true)?)));
                }
                DetailCall::Min(arg) => {
                    terminal = Some((DetailKind::Min, Some(child_cx.aggregate_argument(arg, false)?)));
                }
                DetailCall::Max(arg) => {
                    terminal = Some((DetailKind::Max, Some(child_cx.aggregate_argument(arg, false)?)));
                }
            }
        }
        let Some((kind, argument)) = terminal else {
            return Err(ambiguous("detail access requires a terminal aggregation"));
        };

        let filter = filters
            .into_iter()
            .reduce(|acc, next| RawNode::logical(LogicalOp::And, acc, next))
            .map(Box::new);

        let raw = RawDetail {
            kind,
            name: detail.name.clone(),
            link: detail.join_path(),
            child_schema: child.schema_name().to_string(),
            child_key: child.key_column().to_string(),
            filter,
            argument,
        };

        Ok(if kind == DetailKind::Exists {
            RawNode::unary(ComparisonType::Exists, RawNode::Detail(raw))
        } else {
            RawNode::Detail(raw)
        })
    }

    /// Column argument of an aggregation.
    pub fn aggregate_argument(&self, expr: &Expr, numeric: bool) -> Result<RawColumn, CompileError> {
        match self.parse(expr)? {
            RawNode::Column(c) if numeric && !c.value_type.is_numeric() => {
                Err(CompileError::NonNumericAggregation {
                    column: c.path,
                    value_type: c.value_type,
                })
            }
            RawNode::Column(c) => Ok(c),
            other => Err(CompileError::UnsupportedExpression {
                expr: other.to_string(),
            }),
        }
    }
}

const fn date_part(method: &Method) -> Option<DatePart> {
    match method {
        Method::Year => Some(DatePart::Year),
        Method::Month => Some(DatePart::Month),
        Method::Day => Some(DatePart::Day),
        Method::Hour => Some(DatePart::Hour),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Closed evaluation
// ----------------------------------------------------------------------

/// Evaluate an expression that does not reference the model parameter.
pub(crate) fn eval_closed(expr: &Expr) -> Result<RawNode, CompileError> {
    match expr {
        Expr::List(values) => Ok(RawNode::List(values.clone())),
        other => eval(other).map(RawNode::Constant),
    }
}

fn eval_bool(expr: &Expr) -> Result<bool, CompileError> {
    eval(expr)?
        .as_bool()
        .ok_or_else(|| CompileError::NotAPredicate {
            expr: expr.to_string(),
        })
}

/// Binary comparison between two constants.
pub(crate) fn compare_values(op: ComparisonType, a: &Value, b: &Value) -> bool {
    let ord = a.compare(b);

    match op {
        ComparisonType::Equal => a.loose_eq(b),
        ComparisonType::NotEqual => !a.loose_eq(b),
        ComparisonType::Less => ord == Some(Ordering::Less),
        ComparisonType::LessOrEqual => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        ComparisonType::Greater => ord == Some(Ordering::Greater),
        ComparisonType::GreaterOrEqual => {
            matches!(ord, Some(Ordering::Greater | Ordering::Equal))
        }
        _ => false,
    }
}

fn eval(expr: &Expr) -> Result<Value, CompileError> {
    let unsupported = || CompileError::UnsupportedExpression {
        expr: expr.to_string(),
    };

    match expr {
        Expr::Const(v) => Ok(v.clone()),
        Expr::Compare { op, left, right } => {
            let (a, b) = (eval(left)?, eval(right)?);
            Ok(Value::Boolean(compare_values((*op).into(), &a, &b)))
        }
        Expr::And(l, r) => Ok(Value::Boolean(eval_bool(l)? & eval_bool(r)?)),
        Expr::Or(l, r) => Ok(Value::Boolean(eval_bool(l)? | eval_bool(r)?)),
        Expr::Not(inner) => Ok(Value::Boolean(!eval_bool(inner)?)),
        Expr::Call {
            target,
            method,
            args,
        } => {
            if let (Method::Contains, Expr::List(values), [arg]) = (method, &**target, &args[..]) {
                let arg = eval(arg)?;
                return Ok(Value::Boolean(values.iter().any(|v| v.loose_eq(&arg))));
            }

            let target = eval(target)?;
            match (method, &target, args.as_slice()) {
                (Method::StartsWith | Method::EndsWith | Method::Contains, Value::Text(s), [arg]) => {
                    let pattern = eval(arg)?;
                    let Some(p) = pattern.as_text() else {
                        return Err(unsupported());
                    };
                    Ok(Value::Boolean(match method {
                        Method::StartsWith => s.starts_with(p),
                        Method::EndsWith => s.ends_with(p),
                        _ => s.contains(p),
                    }))
                }
                (Method::Year | Method::Month | Method::Day | Method::Hour, Value::DateTime(ts), []) => {
                    let part = date_part(method).ok_or_else(unsupported)?;
                    Ok(Value::Integer(part.extract(*ts)))
                }
                (Method::Other(name), _, _) => Err(CompileError::UnknownMethod {
                    method: name.clone(),
                }),
                _ => Err(unsupported()),
            }
        }
        Expr::List(_) | Expr::Member(_) | Expr::Detail { .. } => Err(unsupported()),
    }
}
