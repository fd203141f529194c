//! Unit of work over a remote backend.
//!
//! A [`DataContext`] owns the identity map and change tracker for every
//! instance it loads or creates. Handles ([`ModelRef`]) share state with the
//! context; the context is single-threaded by construction.

mod handle;
mod identity;
mod materialize;
mod reload;
mod save;
mod tracked;

#[cfg(test)]
mod tests;

pub use handle::ModelRef;
pub use save::SaveReport;
pub use tracked::ModelState;

pub(crate) use tracked::{Shared, TrackedModel};

use crate::{
    db::{
        context::identity::IdentityMap,
        provider::{DataProvider, ProcessRequest, ProcessResponse},
        query::{ComparisonType, ExpressionNode, Operand, QueryPlan, Queryable},
    },
    error::Error,
    model::{ModelSchema, SchemaRegistry},
    obs::sink::{ExecKind, MetricsEvent, MetricsSink, ProviderOp, Span, record, with_metrics_sink},
    traits::Model,
    types::Guid,
    value::{Row, Value, ValueType},
};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    sync::Arc,
};

/// Fallback save failure message when the backend reports none.
pub const DEFAULT_SAVE_ERROR: &str = "Save failed";

///
/// DataContext
///
/// Session over one provider and one schema registry.
/// Configuration follows the builder flags below; every flag is optional.
///

pub struct DataContext {
    pub(crate) inner: Rc<ContextInner>,
}

impl DataContext {
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>, provider: impl DataProvider + 'static) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                registry,
                provider: Box::new(provider),
                identity: RefCell::new(IdentityMap::default()),
                debug: Cell::new(false),
                generic_save_error: RefCell::new(DEFAULT_SAVE_ERROR.to_string()),
                sink: RefCell::new(None),
            }),
        }
    }

    /// Log the wire form of every executed query.
    #[must_use]
    pub fn debug(self) -> Self {
        self.inner.debug.set(true);
        self
    }

    /// Route this context's metrics events to `sink` instead of the
    /// per-thread global state.
    #[must_use]
    pub fn metrics_sink(self, sink: Rc<dyn MetricsSink>) -> Self {
        *self.inner.sink.borrow_mut() = Some(sink);
        self
    }

    /// Message used when a failed save carries no backend message.
    #[must_use]
    pub fn generic_save_error(self, message: impl Into<String>) -> Self {
        *self.inner.generic_save_error.borrow_mut() = message.into();
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.inner.registry
    }

    /// Start a query over every `T`.
    #[must_use]
    pub fn models<T: Model>(&self) -> Queryable<'_, T> {
        Queryable::new(self)
    }

    /// Fetch one `T` by primary key. Already tracked instances are returned
    /// without a round trip unless deleted.
    pub fn find<T: Model>(&self, id: Guid) -> Result<Option<ModelRef<T>>, Error> {
        let schema = self.inner.schema_for::<T>()?;

        if let Some(shared) = self.inner.identity.borrow().get(schema.schema_name(), id) {
            record(MetricsEvent::IdentityHit {
                schema: schema.schema_name(),
            });
            let deleted = shared.borrow().state == ModelState::Deleted;

            return Ok((!deleted).then(|| self.handle(shared)));
        }

        let found = self
            .inner
            .with_sink(|| self.inner.fetch_by_key(&schema, id, ExecKind::Load))?;

        Ok(found.map(|shared| self.handle(shared)))
    }

    /// Allocate a New `T` with a fresh key and the backend's defaults.
    pub fn create_model<T: Model>(&self) -> Result<ModelRef<T>, Error> {
        let schema = self.inner.schema_for::<T>()?;
        let shared = self.inner.with_sink(|| self.inner.create(&schema))?;

        Ok(self.handle(shared))
    }

    /// Track a row obtained elsewhere as an Unchanged instance.
    pub fn attach<T: Model>(&self, row: Row) -> Result<ModelRef<T>, Error> {
        let schema = self.inner.schema_for::<T>()?;
        let shared = self.inner.with_sink(|| self.inner.materialize(&schema, row))?;

        Ok(self.handle(shared))
    }

    /// Mark an instance for deletion on the next save.
    pub fn delete_model<T: Model>(&self, model: &ModelRef<T>) -> Result<(), Error> {
        self.ensure_owned(model)?;
        model.model.borrow_mut().state = ModelState::Deleted;

        Ok(())
    }

    /// Forward a business-process request to the provider.
    pub fn execute_process(&self, request: &ProcessRequest) -> Result<ProcessResponse, Error> {
        self.inner.with_sink(|| {
            let response = self.inner.provider.execute_process(request);
            record(MetricsEvent::ProviderCall {
                op: ProviderOp::ExecuteProcess,
                schema: &request.process_name,
                success: response.success,
            });

            if response.success {
                Ok(response)
            } else {
                Err(Error::provider(failure_message(
                    response.error_message,
                    || format!("process '{}' failed", request.process_name),
                )))
            }
        })
    }

    /// Number of instances currently tracked.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.inner.identity.borrow().len()
    }

    pub(crate) fn handle<T: Model>(&self, shared: Shared) -> ModelRef<T> {
        ModelRef::new(shared, Rc::downgrade(&self.inner))
    }

    pub(crate) fn ensure_owned<T: Model>(&self, model: &ModelRef<T>) -> Result<(), Error> {
        if model.belongs_to(&self.inner) {
            Ok(())
        } else {
            Err(Error::invalid_state(format!(
                "{} '{}' is tracked by another context",
                T::SCHEMA_NAME,
                model.id()
            )))
        }
    }
}

///
/// ContextInner
/// Shared context state; handles hold it weakly.
///

pub(crate) struct ContextInner {
    pub registry: Arc<SchemaRegistry>,
    pub provider: Box<dyn DataProvider>,
    pub identity: RefCell<IdentityMap>,
    pub debug: Cell<bool>,
    pub generic_save_error: RefCell<String>,
    pub sink: RefCell<Option<Rc<dyn MetricsSink>>>,
}

impl ContextInner {
    /// Run `f` with this context's metrics sink installed, if any.
    pub fn with_sink<R>(&self, f: impl FnOnce() -> R) -> R {
        let sink = self.sink.borrow().clone();

        with_metrics_sink(sink.as_ref(), f)
    }

    pub fn schema_for<T: Model>(&self) -> Result<Arc<ModelSchema>, Error> {
        Ok(self.registry.schema::<T>()?)
    }

    /// Execute a plan and return its raw rows.
    pub fn fetch_rows(&self, plan: &QueryPlan) -> Result<Vec<Row>, Error> {
        let wire = plan.to_wire()?;
        if self.debug.get() {
            let json = serde_json::to_string(&wire).unwrap_or_default();
            tracing::debug!(schema = %plan.root_schema, query = %json, "executing query");
        }

        let response = self.provider.get_items(plan);
        record(MetricsEvent::ProviderCall {
            op: ProviderOp::GetItems,
            schema: &plan.root_schema,
            success: response.success,
        });

        if response.success {
            tracing::debug!(schema = %plan.root_schema, rows = response.items.len(), "query returned");
            Ok(response.items)
        } else {
            let message = failure_message(response.error_message, || {
                format!("query over {} failed", plan.root_schema)
            });
            tracing::warn!(schema = %plan.root_schema, error = %message, "query failed");

            Err(Error::provider(message))
        }
    }

    /// Execute a model plan and resolve rows against the identity map.
    /// Instances already marked Deleted are left out.
    pub fn load(
        &self,
        schema: &Arc<ModelSchema>,
        plan: &QueryPlan,
        kind: ExecKind,
    ) -> Result<Vec<Shared>, Error> {
        let mut span = Span::new(kind, schema.schema_name());
        let rows = self.fetch_rows(plan)?;
        span.set_rows(rows.len() as u64);

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let shared = self.materialize(schema, row)?;
            if shared.borrow().state != ModelState::Deleted {
                out.push(shared);
            }
        }

        Ok(out)
    }

    /// Load one instance by key, bypassing the identity map lookup.
    pub fn fetch_by_key(
        &self,
        schema: &Arc<ModelSchema>,
        key: Guid,
        kind: ExecKind,
    ) -> Result<Option<Shared>, Error> {
        let plan = key_plan(schema, key);

        Ok(self.load(schema, &plan, kind)?.into_iter().next())
    }

    fn create(&self, schema: &Arc<ModelSchema>) -> Result<Shared, Error> {
        let name = schema.schema_name();
        let response = self.provider.get_default_values(name);
        record(MetricsEvent::ProviderCall {
            op: ProviderOp::DefaultValues,
            schema: name,
            success: response.success,
        });
        if !response.success {
            return Err(Error::provider(failure_message(response.error_message, || {
                format!("default values for {name} failed")
            })));
        }

        let key = Guid::generate();
        let mut values = materialize::coerce_row(schema, response.values)?;
        values.insert(schema.key_column().to_string(), Value::Guid(key));

        let model = TrackedModel::new(Arc::clone(schema), key, values, ModelState::New);

        Ok(self.identity.borrow_mut().insert(model))
    }
}

/// Plan selecting every column of one row by primary key.
pub(crate) fn key_plan(schema: &ModelSchema, key: Guid) -> QueryPlan {
    let mut plan = QueryPlan::for_model(schema);
    plan.and_filter(ExpressionNode::Comparison {
        op: ComparisonType::Equal,
        left: Box::new(ExpressionNode::column(schema.key_column(), ValueType::Guid)),
        right: Operand::Single(Box::new(ExpressionNode::constant(
            ValueType::Guid,
            Value::Guid(key),
        ))),
    });

    plan
}

/// Backend message when non-blank, else the fallback.
pub(crate) fn failure_message(message: Option<String>, fallback: impl FnOnce() -> String) -> String {
    match message {
        Some(message) if !message.trim().is_empty() => message,
        _ => fallback(),
    }
}
