//! Module: query::fluent::load
//! Responsibility: model queries, paging, and reducing terminals.
//! Does not own: expression resolution against schemas.
//! Boundary: context facade over compile and plan assembly.

use crate::{
    db::{
        context::{DataContext, ModelRef},
        query::{
            AggregationKind, CompileError, Compiler, ExpressionNode, GroupResult, OrderDirection,
            PlanColumn, PlanShape, QueryPlan,
            expr::Expr,
            fluent::{
                GroupedQuery, ProjectedQuery, ScalarQuery, execute_rows,
                project::SCALAR_ALIAS,
            },
            plan::GroupColumn,
        },
    },
    error::Error,
    model::ModelSchema,
    obs::sink::ExecKind,
    traits::Model,
    value::{Value, ValueType},
};
use std::{marker::PhantomData, sync::Arc};

///
/// Queryable
///
/// Context-bound query over `T`.
/// Every chained call compiles immediately; the first compile error is held
/// and returned by the terminal before any provider call.
///

pub struct Queryable<'a, T> {
    cx: &'a DataContext,
    schema: Option<Arc<ModelSchema>>,
    plan: QueryPlan,
    pending: Option<CompileError>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Model> Queryable<'a, T> {
    pub(crate) fn new(cx: &'a DataContext) -> Self {
        let (schema, plan, pending) = match cx.registry().schema::<T>() {
            Ok(schema) => {
                let plan = QueryPlan::for_model(&schema);
                (Some(schema), plan, None)
            }
            Err(err) => (None, QueryPlan::new(T::SCHEMA_NAME), Some(err.into())),
        };

        Self {
            cx,
            schema,
            plan,
            pending,
            _marker: PhantomData,
        }
    }

    // ------------------------------------------------------------------
    // Plan inspection
    // ------------------------------------------------------------------

    /// The assembled plan, or the first error raised while chaining.
    pub fn plan(&self) -> Result<QueryPlan, CompileError> {
        match &self.pending {
            Some(err) => Err(err.clone()),
            None => Ok(self.plan.clone()),
        }
    }

    fn compiler(&self) -> Option<Compiler<'a>> {
        let schema = self.schema.as_ref()?;

        Some(Compiler::new(self.cx.registry(), Arc::clone(schema)))
    }

    fn apply(
        mut self,
        f: impl FnOnce(&Compiler<'a>, &mut QueryPlan) -> Result<(), CompileError>,
    ) -> Self {
        if self.pending.is_some() {
            return self;
        }
        if let Some(compiler) = self.compiler()
            && let Err(err) = f(&compiler, &mut self.plan)
        {
            self.pending = Some(err);
        }

        self
    }

    fn ready(&self) -> Result<(), Error> {
        match &self.pending {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Refinement
    // ------------------------------------------------------------------

    /// AND a predicate into the filter.
    #[must_use]
    pub fn filter(self, predicate: impl Into<Expr>) -> Self {
        let predicate = predicate.into();

        self.apply(|compiler, plan| {
            plan.and_filter(compiler.predicate(&predicate)?);
            Ok(())
        })
    }

    #[must_use]
    pub fn order_by(self, key: impl Into<Expr>) -> Self {
        self.push_order(key.into(), OrderDirection::Ascending)
    }

    #[must_use]
    pub fn order_by_desc(self, key: impl Into<Expr>) -> Self {
        self.push_order(key.into(), OrderDirection::Descending)
    }

    #[must_use]
    pub fn then_by(self, key: impl Into<Expr>) -> Self {
        self.push_order(key.into(), OrderDirection::Ascending)
    }

    #[must_use]
    pub fn then_by_desc(self, key: impl Into<Expr>) -> Self {
        self.push_order(key.into(), OrderDirection::Descending)
    }

    fn push_order(self, key: Expr, direction: OrderDirection) -> Self {
        self.apply(|compiler, plan| {
            plan.push_order(compiler.value(&key)?, direction);
            Ok(())
        })
    }

    #[must_use]
    pub fn skip(mut self, rows: u32) -> Self {
        self.plan.set_skip(rows);
        self
    }

    #[must_use]
    pub fn take(mut self, rows: u32) -> Self {
        self.plan.set_take(rows);
        self
    }

    // ------------------------------------------------------------------
    // Projection
    // ------------------------------------------------------------------

    /// Replace the loaded columns with named expressions.
    #[must_use]
    pub fn select<I, S, E>(self, columns: I) -> ProjectedQuery<'a>
    where
        I: IntoIterator<Item = (S, E)>,
        S: Into<String>,
        E: Into<Expr>,
    {
        let columns: Vec<(String, Expr)> = columns
            .into_iter()
            .map(|(alias, expr)| (alias.into(), expr.into()))
            .collect();

        let this = self.apply(|compiler, plan| {
            let columns = columns
                .iter()
                .map(|(alias, expr)| Ok(PlanColumn::new(alias.clone(), compiler.value(expr)?)))
                .collect::<Result<Vec<_>, CompileError>>()?;
            plan.project(columns, PlanShape::Composite)
        });

        ProjectedQuery::new(this.cx, this.plan().map_err(Error::from))
    }

    /// Project a single expression.
    #[must_use]
    pub fn select_scalar(self, expr: impl Into<Expr>) -> ScalarQuery<'a> {
        let expr = expr.into();

        let this = self.apply(|compiler, plan| {
            let column = PlanColumn::new(SCALAR_ALIAS, compiler.value(&expr)?);
            plan.project(vec![column], PlanShape::Scalar)
        });

        ScalarQuery::new(this.cx, this.plan().map_err(Error::from))
    }

    /// Group by named key expressions and emit named results.
    #[must_use]
    pub fn group_by<K, KS, KE, R, RS>(self, keys: K, results: R) -> GroupedQuery<'a>
    where
        K: IntoIterator<Item = (KS, KE)>,
        KS: Into<String>,
        KE: Into<Expr>,
        R: IntoIterator<Item = (RS, GroupResult)>,
        RS: Into<String>,
    {
        let keys: Vec<(String, Expr)> = keys
            .into_iter()
            .map(|(alias, expr)| (alias.into(), expr.into()))
            .collect();
        let results: Vec<(String, GroupResult)> = results
            .into_iter()
            .map(|(alias, result)| (alias.into(), result))
            .collect();

        let this = self.apply(|compiler, plan| {
            let keys = keys
                .iter()
                .map(|(alias, expr)| Ok(PlanColumn::new(alias.clone(), compiler.value(expr)?)))
                .collect::<Result<Vec<_>, CompileError>>()?;
            let results = results
                .into_iter()
                .map(|(alias, result)| Ok((alias, group_column(compiler, result)?)))
                .collect::<Result<Vec<_>, CompileError>>()?;

            plan.group(keys, results)
        });

        GroupedQuery::new(this.cx, this.plan().map_err(Error::from))
    }

    // ------------------------------------------------------------------
    // Model terminals
    // ------------------------------------------------------------------

    /// Load every matching instance.
    pub fn to_list(self) -> Result<Vec<ModelRef<T>>, Error> {
        self.ready()?;
        let Some(schema) = self.schema.as_ref() else {
            return Ok(Vec::new());
        };

        let inner = &self.cx.inner;
        let loaded = inner.with_sink(|| inner.load(schema, &self.plan, ExecKind::Load))?;

        Ok(loaded
            .into_iter()
            .map(|shared| self.cx.handle(shared))
            .collect())
    }

    /// First matching instance; NotFound when there is none.
    pub fn first(self) -> Result<ModelRef<T>, Error> {
        self.first_or_default()?
            .ok_or_else(|| Error::no_rows(T::SCHEMA_NAME))
    }

    pub fn first_or_default(self) -> Result<Option<ModelRef<T>>, Error> {
        Ok(self.take(1).to_list()?.into_iter().next())
    }

    // ------------------------------------------------------------------
    // Reducing terminals
    // ------------------------------------------------------------------

    /// Number of matching rows; a backend that omits the count reads as 0.
    pub fn count(self) -> Result<i64, Error> {
        let value = self.reduce(AggregationKind::Count, None)?;

        match value.coerce_to(ValueType::Integer) {
            Ok(Value::Integer(n)) => Ok(n),
            _ => Ok(0),
        }
    }

    pub fn count_where(self, predicate: impl Into<Expr>) -> Result<i64, Error> {
        self.filter(predicate).count()
    }

    pub fn any(self) -> Result<bool, Error> {
        Ok(self.count()? > 0)
    }

    pub fn any_where(self, predicate: impl Into<Expr>) -> Result<bool, Error> {
        self.filter(predicate).any()
    }

    pub fn sum(self, expr: impl Into<Expr>) -> Result<Value, Error> {
        self.reduce(AggregationKind::Sum, Some(expr.into()))
    }

    pub fn min(self, expr: impl Into<Expr>) -> Result<Value, Error> {
        self.reduce(AggregationKind::Min, Some(expr.into()))
    }

    pub fn max(self, expr: impl Into<Expr>) -> Result<Value, Error> {
        self.reduce(AggregationKind::Max, Some(expr.into()))
    }

    pub fn average(self, expr: impl Into<Expr>) -> Result<Value, Error> {
        self.reduce(AggregationKind::Avg, Some(expr.into()))
    }

    /// Aggregation plan for a reducer, without executing it.
    pub fn aggregate_plan(
        &self,
        kind: AggregationKind,
        argument: Option<&Expr>,
    ) -> Result<QueryPlan, CompileError> {
        let plan = self.plan()?;
        let Some(compiler) = self.compiler() else {
            return Ok(plan);
        };

        let argument = match argument {
            Some(expr) => compiler.aggregate_argument(expr, kind.requires_numeric())?,
            None => {
                let schema = compiler.schema();
                ExpressionNode::column(schema.key_column(), ValueType::Guid)
            }
        };

        plan.into_aggregate(kind, argument)
    }

    fn reduce(self, kind: AggregationKind, argument: Option<Expr>) -> Result<Value, Error> {
        let plan = self.aggregate_plan(kind, argument.as_ref())?;
        let rows = execute_rows(self.cx, &plan, ExecKind::Aggregate)?;

        let alias = plan.aggregate_alias().unwrap_or(kind.label());
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(alias))
            .unwrap_or(Value::Null))
    }
}

fn group_column(compiler: &Compiler<'_>, result: GroupResult) -> Result<GroupColumn, CompileError> {
    let aggregate = |kind: AggregationKind, expr: &Expr| -> Result<GroupColumn, CompileError> {
        let argument = compiler.aggregate_argument(expr, kind.requires_numeric())?;
        Ok(GroupColumn::Aggregate(ExpressionNode::aggregation(kind, argument)))
    };

    match result {
        GroupResult::Key(alias) => Ok(GroupColumn::Key(alias)),
        GroupResult::Count => {
            let key = compiler.schema().key_column();
            Ok(GroupColumn::Aggregate(ExpressionNode::aggregation(
                AggregationKind::Count,
                ExpressionNode::column(key, ValueType::Guid),
            )))
        }
        GroupResult::Sum(expr) => aggregate(AggregationKind::Sum, &expr),
        GroupResult::Min(expr) => aggregate(AggregationKind::Min, &expr),
        GroupResult::Max(expr) => aggregate(AggregationKind::Max, &expr),
        GroupResult::Average(expr) => aggregate(AggregationKind::Avg, &expr),
    }
}
