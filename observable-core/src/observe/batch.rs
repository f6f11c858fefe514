//! Batching
//!
//! While a batch is open, writes are recorded instead of dispatched. Each key
//! keeps only its latest value; intermediate values are never delivered.
//!
//! When the batch ends, the pending changes are aggregated per observer:
//! every observer interested in at least one changed key (through a keyed or
//! a wildcard registration) receives exactly one [`ChangeSet`] holding all of
//! those keys.
//!
//! Batches do not nest. Opening an open batch keeps it open, and the first
//! end flushes everything recorded so far.

use indexmap::IndexMap;

use super::observer::{Observer, ObserverId};
use super::registry::SubscriberRegistry;
use super::ChangeSet;
use crate::subject::{Key, Value};

/// Batch flag plus the pending `key -> latest value` map.
#[derive(Debug, Default)]
pub(crate) struct BatchState {
    open: bool,
    pending: IndexMap<Key, Value>,
}

impl BatchState {
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    /// Open the batch. Returns `false` if it was already open.
    pub(crate) fn open(&mut self) -> bool {
        !std::mem::replace(&mut self.open, true)
    }

    /// Record a change, overwriting any earlier value for the same key.
    pub(crate) fn record(&mut self, key: Key, value: Value) {
        self.pending.insert(key, value);
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Close the batch and take everything recorded.
    pub(crate) fn close(&mut self) -> IndexMap<Key, Value> {
        self.open = false;
        std::mem::take(&mut self.pending)
    }
}

/// Group pending changes by observer.
///
/// Observers appear in the order they are first reached when walking the
/// pending keys in first-change order (keyed observers of a key before the
/// wildcard set), which is deterministic for a given registry state.
pub(crate) fn aggregate(
    pending: IndexMap<Key, Value>,
    registry: &SubscriberRegistry,
) -> Vec<(Observer, ChangeSet)> {
    // The last field is the position of the most recent pending key pushed,
    // so an observer reached twice for one key (keyed and wildcard) is skipped.
    let mut by_observer: IndexMap<ObserverId, (Observer, ChangeSet, usize)> = IndexMap::new();

    for (round, (key, value)) in pending.into_iter().enumerate() {
        registry.for_each_interested(&key, |observer| {
            let (_, changes, last) = by_observer
                .entry(observer.id())
                .or_insert_with(|| (observer.clone(), ChangeSet::default(), usize::MAX));
            if *last != round {
                *last = round;
                changes.push(key.clone(), value.clone());
            }
        });
    }

    by_observer
        .into_values()
        .map(|(observer, changes, _)| (observer, changes))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Subject;

    fn keys() -> (Key, Key, Key) {
        let subject = Subject::from_fields([("a", 0), ("b", 0), ("c", 0)]).unwrap();
        let schema = subject.schema();
        (
            schema.key("a").unwrap(),
            schema.key("b").unwrap(),
            schema.key("c").unwrap(),
        )
    }

    #[test]
    fn record_keeps_latest_value() {
        let (a, b, _) = keys();
        let mut batch = BatchState::default();
        assert!(batch.open());
        assert!(!batch.open());

        batch.record(a.clone(), Value::from(1));
        batch.record(a.clone(), Value::from(2));
        batch.record(b.clone(), Value::from(3));
        assert_eq!(batch.pending_len(), 2);

        let pending = batch.close();
        assert!(!batch.is_open());
        assert_eq!(pending.get(&a), Some(&Value::from(2)));
        assert_eq!(pending.get(&b), Some(&Value::from(3)));
        assert_eq!(batch.pending_len(), 0);
    }

    #[test]
    fn aggregate_one_change_set_per_observer() {
        let (a, b, c) = keys();
        let mut registry = SubscriberRegistry::new();
        let ab = Observer::new(|_| {});
        let all = Observer::new(|_| {});
        registry.add(&a, &ab);
        registry.add(&b, &ab);
        registry.add_wildcard(&all);
        // Both keyed and wildcard: still one delivery.
        registry.add(&c, &all);

        let mut pending = IndexMap::new();
        pending.insert(a.clone(), Value::from(1));
        pending.insert(b.clone(), Value::from(2));
        pending.insert(c.clone(), Value::from(3));

        let deliveries = aggregate(pending, &registry);
        assert_eq!(deliveries.len(), 2);

        let (first, changes) = &deliveries[0];
        assert_eq!(first, &ab);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes.get("a"), Some(&Value::from(1)));
        assert_eq!(changes.get("b"), Some(&Value::from(2)));

        let (second, changes) = &deliveries[1];
        assert_eq!(second, &all);
        assert_eq!(changes.len(), 3);
        let names: Vec<_> = changes.keys().map(Key::name).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn aggregate_skips_uninterested_observers() {
        let (a, b, _) = keys();
        let mut registry = SubscriberRegistry::new();
        registry.add(&b, &Observer::new(|_| {}));

        let mut pending = IndexMap::new();
        pending.insert(a, Value::from(1));

        assert!(aggregate(pending, &registry).is_empty());
    }
}
