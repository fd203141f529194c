use crate::{
    db::context::{ContextInner, ModelState, Shared, TrackedModel},
    error::Error,
    model::ModelSchema,
    obs::sink::{MetricsEvent, record},
    types::Guid,
    value::{Row, Value},
};
use std::sync::Arc;

impl ContextInner {
    /// Resolve one loaded row against the identity map.
    ///
    /// A tracked instance with the same key wins and is returned untouched,
    /// so local edits survive later queries.
    pub fn materialize(&self, schema: &Arc<ModelSchema>, row: Row) -> Result<Shared, Error> {
        let values = coerce_row(schema, row)?;
        let key = row_key(schema, &values)?;

        if let Some(existing) = self.identity.borrow().get(schema.schema_name(), key) {
            record(MetricsEvent::IdentityHit {
                schema: schema.schema_name(),
            });
            return Ok(existing);
        }

        let model = TrackedModel::new(Arc::clone(schema), key, values, ModelState::Unchanged);

        Ok(self.identity.borrow_mut().insert(model))
    }
}

/// Keep the schema's columns present in `row`, coerced to their wire types.
pub(crate) fn coerce_row(schema: &ModelSchema, mut row: Row) -> Result<Row, Error> {
    let mut out = Row::new();

    for (column, ty) in schema.columns() {
        let Some(value) = row.remove(column) else {
            continue;
        };
        let value = value.coerce_to(ty).map_err(|err| {
            Error::provider(format!(
                "{}.{column}: {err}",
                schema.schema_name()
            ))
        })?;
        out.insert(column.to_string(), value);
    }

    Ok(out)
}

fn row_key(schema: &ModelSchema, values: &Row) -> Result<Guid, Error> {
    match values.get(schema.key_column()) {
        Some(Value::Guid(key)) => Ok(*key),
        _ => Err(Error::provider(format!(
            "{} row has no '{}' key",
            schema.schema_name(),
            schema.key_column()
        ))),
    }
}

///
/// TESTS
///
