//! Module: query::fluent
//! Responsibility: context-bound chained queries and their terminals.
//! Does not own: expression compilation or wire encoding.
//! Boundary: ergonomic API layer over `Compiler` and `QueryPlan`.

mod load;
mod project;


pub use load::Queryable;
pub use project::{GroupedQuery, ProjectedQuery, ScalarQuery};

use crate::{
    db::{context::DataContext, query::QueryPlan},
    error::Error,
    obs::sink::{ExecKind, Span},
    value::{Row, Value},
};

/// Execute a non-model plan and coerce each projected column to its type.
/// Columns outside the projection are dropped.
fn execute_rows(cx: &DataContext, plan: &QueryPlan, kind: ExecKind) -> Result<Vec<Row>, Error> {
    let inner = &cx.inner;

    inner.with_sink(|| {
        let mut span = Span::new(kind, &plan.root_schema);
        let rows = inner.fetch_rows(plan)?;
        span.set_rows(rows.len() as u64);

        rows.into_iter().map(|row| project_row(plan, row)).collect()
    })
}

fn project_row(plan: &QueryPlan, mut row: Row) -> Result<Row, Error> {
    let mut out = Row::new();

    for column in &plan.columns {
        let value = row.remove(&column.alias).unwrap_or(Value::Null);
        let value = value
            .coerce_to(column.expression.value_type())
            .map_err(|err| Error::provider(format!("column '{}': {err}", column.alias)))?;
        out.insert(column.alias.clone(), value);
    }

    Ok(out)
}
