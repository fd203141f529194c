use crate::db::query::{
    ast::ExpressionNode,
    error::CompileError,
    expr::Expr,
    plan::{PlanColumn, PlanShape, QueryPlan, ensure_unique_aliases},
};

///
/// GroupResult
/// One named result column of a grouped query.
///

#[derive(Clone, Debug, PartialEq)]
pub enum GroupResult {
    /// Re-export a group key (by alias) under the result's name.
    Key(String),
    Count,
    Sum(Expr),
    Min(Expr),
    Max(Expr),
    Average(Expr),
}

impl GroupResult {
    #[must_use]
    pub fn key(alias: impl Into<String>) -> Self {
        Self::Key(alias.into())
    }
}

///
/// GroupColumn
/// A group result after compilation.
///

pub(crate) enum GroupColumn {
    Key(String),
    Aggregate(ExpressionNode),
}

impl QueryPlan {
    /// Rewrite columns to group keys plus named aggregations.
    pub(crate) fn group(
        &mut self,
        keys: Vec<PlanColumn>,
        results: Vec<(String, GroupColumn)>,
    ) -> Result<(), CompileError> {
        if self.is_paged() {
            return Err(CompileError::GroupingAfterPaging);
        }
        if keys.is_empty() {
            return Err(CompileError::EmptyGroupKeys);
        }
        if results.is_empty() {
            return Err(CompileError::EmptyGroupResults);
        }

        let mut columns = keys.clone();
        for (alias, result) in results {
            match result {
                GroupColumn::Key(key) => {
                    let Some(found) = keys.iter().find(|k| k.alias == key) else {
                        return Err(CompileError::UnknownGroupKey { alias: key });
                    };
                    if alias != key {
                        columns.push(PlanColumn::new(alias, found.expression.clone()));
                    }
                }
                GroupColumn::Aggregate(expression) => {
                    columns.push(PlanColumn::new(alias, expression));
                }
            }
        }
        ensure_unique_aliases(&columns)?;

        self.group_keys = Some(keys.into_iter().map(|k| k.alias).collect());
        self.columns = columns;
        self.shape = PlanShape::Composite;
        self.is_pageable = false;

        Ok(())
    }
}
