use crate::{
    db::context::{ContextInner, DataContext, ModelRef, ModelState, Shared, key_plan, materialize},
    error::Error,
    obs::sink::{ExecKind, Span},
    traits::Model,
};
use std::sync::Arc;

impl DataContext {
    /// Re-read an instance from the backend in place.
    ///
    /// Scalar and lookup values are overwritten, lookup memoization is
    /// cleared and detail memoization is kept. A row that no longer exists
    /// leaves the instance Deleted and returns a NotFound error.
    pub fn reload<T: Model>(&self, model: &ModelRef<T>) -> Result<(), Error> {
        self.ensure_owned(model)?;

        self.inner.with_sink(|| self.inner.reload(&model.model))
    }
}

impl ContextInner {
    fn reload(&self, shared: &Shared) -> Result<(), Error> {
        let (schema, key, state) = {
            let model = shared.borrow();
            (Arc::clone(&model.schema), model.key, model.state)
        };

        if matches!(state, ModelState::New | ModelState::Deleted) {
            return Err(Error::not_found(schema.schema_name(), key));
        }

        let mut span = Span::new(ExecKind::Reload, schema.schema_name());
        let plan = key_plan(&schema, key);
        let mut rows = self.fetch_rows(&plan)?;
        span.set_rows(rows.len() as u64);

        if rows.is_empty() {
            shared.borrow_mut().state = ModelState::Deleted;
            tracing::debug!(schema = %schema.schema_name(), %key, "reload found no row; marked deleted");

            return Err(Error::not_found(schema.schema_name(), key));
        }

        let row = materialize::coerce_row(&schema, rows.swap_remove(0))?;
        shared.borrow_mut().refresh(row);

        Ok(())
    }
}
