//! Query plans: the provider-agnostic form of a chained query.

mod group;
mod wire;


use crate::{
    db::query::{
        ast::{AggregationKind, ExpressionNode, LogicalOp},
        error::CompileError,
    },
    model::ModelSchema,
    value::ValueType,
};
use serde::Serialize;
use std::collections::HashSet;

// re-exports
pub use group::GroupResult;
pub(crate) use group::GroupColumn;
pub use wire::{
    ExpressionType, FilterType, FunctionType, NamedMap, WireColumn, WireColumns, WireExpression,
    WireFilter, WireParameter, WireQuery,
};

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

///
/// OrderKey
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderKey {
    pub expression: ExpressionNode,
    pub direction: OrderDirection,
}

///
/// PlanColumn
/// One projected column: alias to expression.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlanColumn {
    pub alias: String,
    pub expression: ExpressionNode,
}

impl PlanColumn {
    #[must_use]
    pub fn new(alias: impl Into<String>, expression: ExpressionNode) -> Self {
        Self {
            alias: alias.into(),
            expression,
        }
    }
}

///
/// PlanShape
/// What a result row materializes into.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PlanShape {
    /// Tracked model instances.
    Model,
    /// One value per row.
    Scalar,
    /// Named projection rows.
    Composite,
    /// A single aggregation value.
    Aggregate,
}

///
/// QueryPlan
///
/// When `group_keys` is present, `columns` reference only group keys or
/// aggregation functions.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryPlan {
    pub root_schema: String,
    pub filter: Option<ExpressionNode>,
    pub order_keys: Vec<OrderKey>,
    pub skip: Option<u32>,
    pub take: Option<u32>,
    pub columns: Vec<PlanColumn>,
    pub group_keys: Option<Vec<String>>,
    pub is_pageable: bool,
    pub shape: PlanShape,
}

impl QueryPlan {
    /// Empty plan over a root schema.
    #[must_use]
    pub fn new(root_schema: impl Into<String>) -> Self {
        Self {
            root_schema: root_schema.into(),
            filter: None,
            order_keys: Vec::new(),
            skip: None,
            take: None,
            columns: Vec::new(),
            group_keys: None,
            is_pageable: false,
            shape: PlanShape::Model,
        }
    }

    /// Plan loading every column of a model.
    #[must_use]
    pub fn for_model(schema: &ModelSchema) -> Self {
        let mut plan = Self::new(schema.schema_name());
        plan.columns = schema
            .columns()
            .into_iter()
            .map(|(column, ty)| PlanColumn::new(column, ExpressionNode::column(column, ty)))
            .collect();

        plan
    }

    /// AND a predicate into the root filter, flattening top-level AND groups.
    pub fn and_filter(&mut self, predicate: ExpressionNode) {
        let Some(existing) = self.filter.take() else {
            self.filter = Some(predicate);
            return;
        };

        let mut children = match existing {
            ExpressionNode::Group {
                op: LogicalOp::And,
                children,
                negated: false,
            } => children,
            other => vec![other],
        };
        match predicate {
            ExpressionNode::Group {
                op: LogicalOp::And,
                children: more,
                negated: false,
            } => children.extend(more),
            other => children.push(other),
        }

        self.filter = Some(ExpressionNode::Group {
            op: LogicalOp::And,
            children,
            negated: false,
        });
    }

    pub fn push_order(&mut self, expression: ExpressionNode, direction: OrderDirection) {
        self.order_keys.push(OrderKey {
            expression,
            direction,
        });
    }

    pub const fn set_skip(&mut self, skip: u32) {
        self.skip = Some(skip);
        self.is_pageable = true;
    }

    pub const fn set_take(&mut self, take: u32) {
        self.take = Some(take);
        self.is_pageable = true;
    }

    #[must_use]
    pub const fn is_paged(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }

    /// Replace the projection wholesale.
    pub fn project(&mut self, columns: Vec<PlanColumn>, shape: PlanShape) -> Result<(), CompileError> {
        if columns.is_empty() {
            return Err(CompileError::EmptyProjection);
        }
        ensure_unique_aliases(&columns)?;

        self.columns = columns;
        self.shape = shape;

        Ok(())
    }

    /// Rewrite into a single-aggregation plan. Ordering is dropped.
    pub fn into_aggregate(
        mut self,
        kind: AggregationKind,
        argument: ExpressionNode,
    ) -> Result<Self, CompileError> {
        if self.is_paged() {
            return Err(CompileError::AggregationAfterPaging);
        }

        self.order_keys.clear();
        self.group_keys = None;
        self.columns = vec![PlanColumn::new(
            kind.label(),
            ExpressionNode::aggregation(kind, argument),
        )];
        self.shape = PlanShape::Aggregate;
        self.is_pageable = false;

        Ok(self)
    }

    /// Alias of the single aggregation column, when the plan is one.
    #[must_use]
    pub fn aggregate_alias(&self) -> Option<&str> {
        match (self.shape, self.columns.as_slice()) {
            (PlanShape::Aggregate, [column]) => Some(&column.alias),
            _ => None,
        }
    }

    /// Type of a projected column.
    #[must_use]
    pub fn column_type(&self, alias: &str) -> Option<ValueType> {
        self.columns
            .iter()
            .find(|c| c.alias == alias)
            .map(|c| c.expression.value_type())
    }
}

pub(crate) fn ensure_unique_aliases(columns: &[PlanColumn]) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.alias.as_str()) {
            return Err(CompileError::DuplicateAlias {
                alias: column.alias.clone(),
            });
        }
    }

    Ok(())
}
