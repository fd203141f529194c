use crate::{
    model::ModelSchema,
    types::Guid,
    value::{Row, Value},
};
use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc, sync::Arc};

pub(crate) type Shared = Rc<RefCell<TrackedModel>>;

///
/// ModelState
///
/// Lifecycle of a tracked instance:
/// New → Unchanged (saved) → Changed (mutated) → Deleted (marked) → evicted.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ModelState {
    New,
    Unchanged,
    Changed,
    Deleted,
}

impl ModelState {
    /// Whether the next save has work to do for this state.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

///
/// CachedLookup
/// Memoized lookup target, valid while the lookup column still holds `key`.
///

pub(crate) struct CachedLookup {
    pub key: Guid,
    pub target: Shared,
}

///
/// TrackedModel
///
/// Context-owned state of one model instance. Values are keyed by wire
/// column; a column absent from `values` was never loaded.
///

pub(crate) struct TrackedModel {
    pub schema: Arc<ModelSchema>,
    pub key: Guid,
    pub values: Row,
    pub snapshot: Row,
    pub state: ModelState,

    // Set once the backend is known to hold the row.
    pub persisted: bool,

    // Tracking order; save emits requests in this order.
    pub seq: u64,

    pub lookups: HashMap<String, CachedLookup>,
    pub details: HashMap<String, Vec<Shared>>,
}

impl TrackedModel {
    pub fn new(schema: Arc<ModelSchema>, key: Guid, values: Row, state: ModelState) -> Self {
        Self {
            schema,
            key,
            snapshot: values.clone(),
            values,
            state,
            persisted: !matches!(state, ModelState::New),
            seq: 0,
            lookups: HashMap::new(),
            details: HashMap::new(),
        }
    }

    pub fn schema_name(&self) -> &str {
        self.schema.schema_name()
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Write one column. Returns whether the value actually changed.
    pub fn write(&mut self, column: &str, value: Value) -> bool {
        if self.values.get(column) == Some(&value) {
            return false;
        }
        self.values.insert(column.to_string(), value);

        if self.state == ModelState::Unchanged {
            self.state = ModelState::Changed;
        }

        true
    }

    /// (column, value) pairs whose current value differs from the snapshot,
    /// in schema column order. Never-loaded columns are skipped.
    pub fn changes(&self) -> Vec<(String, Value)> {
        self.schema
            .columns()
            .into_iter()
            .filter_map(|(column, _)| {
                let current = self.values.get(column)?;
                (self.snapshot.get(column) != Some(current))
                    .then(|| (column.to_string(), current.clone()))
            })
            .collect()
    }

    /// Accept the current values as persisted.
    pub fn accept(&mut self) {
        self.snapshot = self.values.clone();
        self.state = ModelState::Unchanged;
        self.persisted = true;
    }

    /// Overwrite values and snapshot from a freshly loaded row.
    pub fn refresh(&mut self, row: Row) {
        self.values = row;
        self.accept();
        self.lookups.clear();
    }
}

impl fmt::Debug for TrackedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedModel")
            .field("schema", &self.schema.schema_name())
            .field("key", &self.key)
            .field("state", &self.state)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Order, schema_of};

    fn order(state: ModelState) -> TrackedModel {
        let key = Guid::from_u128(7);
        let values = Row::from([
            ("Id".to_string(), Value::Guid(key)),
            ("StringValue".to_string(), Value::from("a")),
            ("IntValue".to_string(), Value::Integer(1)),
        ]);

        TrackedModel::new(schema_of::<Order>(), key, values, state)
    }

    #[test]
    fn write_marks_unchanged_as_changed_only_on_real_change() {
        let mut model = order(ModelState::Unchanged);

        assert!(!model.write("IntValue", Value::Integer(1)));
        assert_eq!(model.state, ModelState::Unchanged);

        assert!(model.write("IntValue", Value::Integer(2)));
        assert_eq!(model.state, ModelState::Changed);
    }

    #[test]
    fn write_keeps_new_state() {
        let mut model = order(ModelState::New);
        model.write("IntValue", Value::Integer(5));

        assert_eq!(model.state, ModelState::New);
        assert!(!model.persisted);
    }

    #[test]
    fn changes_follow_schema_order_and_skip_unloaded_columns() {
        let mut model = order(ModelState::Unchanged);
        model.write("IntValue", Value::Integer(3));
        model.write("StringValue", Value::from("b"));

        let changes = model.changes();
        let columns: Vec<_> = changes.iter().map(|(c, _)| c.as_str()).collect();

        assert_eq!(columns, ["StringValue", "IntValue"]);
        assert!(!changes.iter().any(|(c, _)| c == "DecimalValue"));
    }

    #[test]
    fn reverting_a_value_empties_the_diff() {
        let mut model = order(ModelState::Unchanged);
        model.write("IntValue", Value::Integer(3));
        model.write("IntValue", Value::Integer(1));

        assert_eq!(model.state, ModelState::Changed);
        assert!(model.changes().is_empty());
    }

    #[test]
    fn accept_resnapshots() {
        let mut model = order(ModelState::New);
        model.write("IntValue", Value::Integer(9));
        model.accept();

        assert_eq!(model.state, ModelState::Unchanged);
        assert!(model.persisted);
        assert!(model.changes().is_empty());
    }
}
