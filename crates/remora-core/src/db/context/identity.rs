use crate::{
    db::context::tracked::{Shared, TrackedModel},
    types::Guid,
};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

///
/// IdentityMap
///
/// One live instance per (schema, key) inside a context. Entries are
/// stamped with a tracking sequence so pending work replays in the order
/// instances were first tracked.
///

#[derive(Debug, Default)]
pub(crate) struct IdentityMap {
    entries: HashMap<(String, Guid), Shared>,
    next_seq: u64,
}

impl IdentityMap {
    pub fn get(&self, schema: &str, key: Guid) -> Option<Shared> {
        self.entries.get(&(schema.to_string(), key)).cloned()
    }

    /// Track a new instance and return its shared handle.
    pub fn insert(&mut self, mut model: TrackedModel) -> Shared {
        model.seq = self.next_seq;
        self.next_seq += 1;

        let id = (model.schema_name().to_string(), model.key);
        let shared = Rc::new(RefCell::new(model));
        self.entries.insert(id, Rc::clone(&shared));

        shared
    }

    pub fn remove(&mut self, schema: &str, key: Guid) -> Option<Shared> {
        self.entries.remove(&(schema.to_string(), key))
    }

    /// Instances with save work, in tracking order.
    pub fn pending(&self) -> Vec<Shared> {
        let mut pending: Vec<(u64, Shared)> = self
            .entries
            .values()
            .filter_map(|shared| {
                let model = shared.borrow();
                model
                    .state
                    .is_pending()
                    .then(|| (model.seq, Rc::clone(shared)))
            })
            .collect();
        pending.sort_by_key(|(seq, _)| *seq);

        pending.into_iter().map(|(_, shared)| shared).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::context::tracked::ModelState,
        test_support::{Order, schema_of},
        value::{Row, Value},
    };

    fn model(n: u128, state: ModelState) -> TrackedModel {
        let key = Guid::from_u128(n);
        let row = Row::from([("Id".to_string(), Value::Guid(key))]);

        TrackedModel::new(schema_of::<Order>(), key, row, state)
    }

    #[test]
    fn get_returns_the_same_shared_instance() {
        let mut map = IdentityMap::default();
        let inserted = map.insert(model(1, ModelState::Unchanged));
        let found = map.get("Order", Guid::from_u128(1)).unwrap();

        assert!(Rc::ptr_eq(&inserted, &found));
        assert!(map.get("Order", Guid::from_u128(2)).is_none());
        assert!(map.get("OrderLine", Guid::from_u128(1)).is_none());
    }

    #[test]
    fn pending_is_in_tracking_order_and_skips_unchanged() {
        let mut map = IdentityMap::default();
        for (n, state) in [
            (5, ModelState::Changed),
            (3, ModelState::Unchanged),
            (9, ModelState::New),
            (1, ModelState::Deleted),
        ] {
            map.insert(model(n, state));
        }

        let keys: Vec<_> = map.pending().iter().map(|m| m.borrow().key).collect();

        assert_eq!(
            keys,
            [Guid::from_u128(5), Guid::from_u128(9), Guid::from_u128(1)]
        );
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn remove_evicts() {
        let mut map = IdentityMap::default();
        map.insert(model(1, ModelState::Deleted));

        assert!(map.remove("Order", Guid::from_u128(1)).is_some());
        assert_eq!(map.len(), 0);
    }
}
