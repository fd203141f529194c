//! Module: query::fluent::project
//! Responsibility: projected, scalar, and grouped query terminals.

use crate::{
    db::{
        context::DataContext,
        query::{QueryPlan, fluent::execute_rows},
    },
    error::Error,
    obs::sink::ExecKind,
    value::{Row, Value},
};

/// Alias of the single column of a scalar projection.
pub(crate) const SCALAR_ALIAS: &str = "Value";

///
/// ProjectedQuery
/// Query returning named columns instead of tracked instances.
///

pub struct ProjectedQuery<'a> {
    cx: &'a DataContext,
    plan: Result<QueryPlan, Error>,
}

impl<'a> ProjectedQuery<'a> {
    pub(crate) const fn new(cx: &'a DataContext, plan: Result<QueryPlan, Error>) -> Self {
        Self { cx, plan }
    }

    pub const fn plan(&self) -> Result<&QueryPlan, &Error> {
        self.plan.as_ref()
    }

    pub fn to_list(self) -> Result<Vec<Row>, Error> {
        let plan = self.plan?;

        execute_rows(self.cx, &plan, ExecKind::Load)
    }

    pub fn first_or_default(self) -> Result<Option<Row>, Error> {
        let mut plan = self.plan?;
        plan.set_take(1);

        Ok(execute_rows(self.cx, &plan, ExecKind::Load)?
            .into_iter()
            .next())
    }
}

///
/// ScalarQuery
/// Query returning one value per row.
///

pub struct ScalarQuery<'a> {
    cx: &'a DataContext,
    plan: Result<QueryPlan, Error>,
}

impl<'a> ScalarQuery<'a> {
    pub(crate) const fn new(cx: &'a DataContext, plan: Result<QueryPlan, Error>) -> Self {
        Self { cx, plan }
    }

    pub const fn plan(&self) -> Result<&QueryPlan, &Error> {
        self.plan.as_ref()
    }

    pub fn to_list(self) -> Result<Vec<Value>, Error> {
        let plan = self.plan?;
        let rows = execute_rows(self.cx, &plan, ExecKind::Load)?;

        Ok(rows.into_iter().map(scalar).collect())
    }

    pub fn first_or_default(self) -> Result<Option<Value>, Error> {
        let mut plan = self.plan?;
        plan.set_take(1);

        Ok(execute_rows(self.cx, &plan, ExecKind::Load)?
            .into_iter()
            .next()
            .map(scalar))
    }
}

fn scalar(mut row: Row) -> Value {
    row.remove(SCALAR_ALIAS).unwrap_or(Value::Null)
}

///
/// GroupedQuery
/// Grouped aggregation; one row per group.
///

pub struct GroupedQuery<'a> {
    cx: &'a DataContext,
    plan: Result<QueryPlan, Error>,
}

impl<'a> GroupedQuery<'a> {
    pub(crate) const fn new(cx: &'a DataContext, plan: Result<QueryPlan, Error>) -> Self {
        Self { cx, plan }
    }

    pub const fn plan(&self) -> Result<&QueryPlan, &Error> {
        self.plan.as_ref()
    }

    pub fn to_list(self) -> Result<Vec<Row>, Error> {
        let plan = self.plan?;

        execute_rows(self.cx, &plan, ExecKind::Aggregate)
    }
}
