//! Subscriber Registry
//!
//! The registry is the bookkeeping behind an
//! [`Observable`](crate::Observable). It maps each field key to the set of
//! observers watching it, and holds a separate wildcard set for observers that
//! watch every field.
//!
//! # Ordering
//!
//! All sets are insertion-ordered maps keyed by [`ObserverId`], so:
//!
//! - registering an observer twice for one key keeps a single entry at its
//!   original position
//! - removal preserves the relative order of the remaining observers
//! - fan-out order equals registration order, keyed observers before
//!   wildcard observers
//!
//! # Pruning
//!
//! When the last observer of a key is removed the key entry itself goes away,
//! so [`SubscriberRegistry::keys`] only ever lists keys that are watched.
//!
//! The registry does no locking and fires no hooks; the observable does both
//! around it.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;

use super::observer::{Observer, ObserverId};
use crate::subject::Key;

/// Where an observer is registered: one field, or every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Key(Key),
    /// The wildcard channel.
    All,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Key(key) => fmt::Display::fmt(key, f),
            Channel::All => f.write_str("All"),
        }
    }
}

/// Callback fired on registry churn, after the change took effect.
pub type Hook = Arc<dyn Fn(&Channel, &Observer) + Send + Sync>;

/// Optional diagnostics callbacks. They never take part in notification.
///
/// Keyed hooks receive [`Channel::Key`]; wildcard hooks receive
/// [`Channel::All`].
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub on_watch: Option<Hook>,
    pub on_unwatch: Option<Hook>,
    pub on_watch_all: Option<Hook>,
    pub on_unwatch_all: Option<Hook>,
}

impl LifecycleHooks {
    pub fn on_watch<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Channel, &Observer) + Send + Sync + 'static,
    {
        self.on_watch = Some(Arc::new(hook));
        self
    }

    pub fn on_unwatch<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Channel, &Observer) + Send + Sync + 'static,
    {
        self.on_unwatch = Some(Arc::new(hook));
        self
    }

    pub fn on_watch_all<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Channel, &Observer) + Send + Sync + 'static,
    {
        self.on_watch_all = Some(Arc::new(hook));
        self
    }

    pub fn on_unwatch_all<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Channel, &Observer) + Send + Sync + 'static,
    {
        self.on_unwatch_all = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_watch", &self.on_watch.is_some())
            .field("on_unwatch", &self.on_unwatch.is_some())
            .field("on_watch_all", &self.on_watch_all.is_some())
            .field("on_unwatch_all", &self.on_unwatch_all.is_some())
            .finish()
    }
}

/// One row of the subscriber dump rendered by inspector panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberData {
    /// Field name, or `All` for wildcard observers.
    pub key: String,
    /// Observer name, or `Anonymous #<id>`.
    pub handler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

type ObserverSet = IndexMap<ObserverId, Observer>;

/// Per-key and wildcard observer sets.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    keyed: IndexMap<Key, ObserverSet>,
    wildcard: ObserverSet,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `observer` to the set for `key`. Returns `false` if it was
    /// already there.
    pub fn add(&mut self, key: &Key, observer: &Observer) -> bool {
        let set = self.keyed.entry(key.clone()).or_default();
        if set.contains_key(&observer.id()) {
            return false;
        }
        set.insert(observer.id(), observer.clone());
        true
    }

    /// Remove `id` from the set for `key`, pruning the key if its set empties.
    /// Returns `false` if the observer was not registered.
    pub fn remove(&mut self, key: &Key, id: ObserverId) -> bool {
        let Some(set) = self.keyed.get_mut(key) else {
            return false;
        };
        let removed = set.shift_remove(&id).is_some();
        if set.is_empty() {
            self.keyed.shift_remove(key);
        }
        removed
    }

    pub fn add_wildcard(&mut self, observer: &Observer) -> bool {
        if self.wildcard.contains_key(&observer.id()) {
            return false;
        }
        self.wildcard.insert(observer.id(), observer.clone());
        true
    }

    pub fn remove_wildcard(&mut self, id: ObserverId) -> bool {
        self.wildcard.shift_remove(&id).is_some()
    }

    /// Drop every keyed and wildcard registration.
    pub fn clear(&mut self) {
        self.keyed.clear();
        self.wildcard.clear();
    }

    /// Observers to notify for a change at `key`: keyed first, then wildcard.
    pub fn interested(&self, key: &Key) -> SmallVec<[Observer; 4]> {
        self.keyed
            .get(key)
            .into_iter()
            .flat_map(|set| set.values())
            .chain(self.wildcard.values())
            .cloned()
            .collect()
    }

    /// Iterate the observers for `key` (keyed, then wildcard) without cloning.
    pub(crate) fn for_each_interested(&self, key: &Key, mut f: impl FnMut(&Observer)) {
        if let Some(set) = self.keyed.get(key) {
            set.values().for_each(&mut f);
        }
        self.wildcard.values().for_each(f);
    }

    /// Number of keys with at least one observer.
    pub fn key_count(&self) -> usize {
        self.keyed.len()
    }

    /// Number of observers registered for `key`.
    pub fn count_for(&self, key: &Key) -> usize {
        self.keyed.get(key).map_or(0, IndexMap::len)
    }

    /// Number of keyed registrations across all keys.
    pub fn keyed_count(&self) -> usize {
        self.keyed.values().map(IndexMap::len).sum()
    }

    pub fn wildcard_count(&self) -> usize {
        self.wildcard.len()
    }

    /// Keys with at least one observer, in first-registration order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keyed.keys()
    }

    pub fn contains(&self, key: &Key, id: ObserverId) -> bool {
        self.keyed.get(key).is_some_and(|set| set.contains_key(&id))
    }

    pub fn contains_wildcard(&self, id: ObserverId) -> bool {
        self.wildcard.contains_key(&id)
    }

    /// Rows for every registration: keyed rows first, then wildcard rows.
    pub fn dump(&self) -> Vec<SubscriberData> {
        let keyed = self
            .keyed
            .iter()
            .flat_map(|(key, set)| set.values().map(move |o| row(key.name(), o)));
        let wildcard = self.wildcard.values().map(|o| row("All", o));
        keyed.chain(wildcard).collect()
    }
}

fn row(key: &str, observer: &Observer) -> SubscriberData {
    SubscriberData {
        key: key.to_string(),
        handler: observer.label(),
        details: observer.description().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Subject;

    fn keys() -> (Key, Key) {
        let subject = Subject::from_fields([("a", 0), ("b", 0)]).unwrap();
        let schema = subject.schema();
        (schema.key("a").unwrap(), schema.key("b").unwrap())
    }

    #[test]
    fn add_is_idempotent() {
        let (a, _) = keys();
        let mut registry = SubscriberRegistry::new();
        let observer = Observer::new(|_| {});

        assert!(registry.add(&a, &observer));
        assert!(!registry.add(&a, &observer.clone()));
        assert_eq!(registry.count_for(&a), 1);
    }

    #[test]
    fn remove_prunes_empty_keys() {
        let (a, b) = keys();
        let mut registry = SubscriberRegistry::new();
        let observer = Observer::new(|_| {});

        registry.add(&a, &observer);
        registry.add(&b, &observer);
        assert_eq!(registry.key_count(), 2);

        assert!(registry.remove(&a, observer.id()));
        assert_eq!(registry.count_for(&a), 0);
        assert_eq!(registry.keys().collect::<Vec<_>>(), [&b]);

        assert!(!registry.remove(&a, observer.id()));
    }

    #[test]
    fn interested_lists_keyed_before_wildcard() {
        let (a, b) = keys();
        let mut registry = SubscriberRegistry::new();
        let wildcard = Observer::new(|_| {});
        let first = Observer::new(|_| {});
        let second = Observer::new(|_| {});

        registry.add_wildcard(&wildcard);
        registry.add(&a, &first);
        registry.add(&a, &second);

        let ids: Vec<_> = registry.interested(&a).iter().map(Observer::id).collect();
        assert_eq!(ids, [first.id(), second.id(), wildcard.id()]);

        let ids: Vec<_> = registry.interested(&b).iter().map(Observer::id).collect();
        assert_eq!(ids, [wildcard.id()]);
    }

    #[test]
    fn removal_preserves_order_of_the_rest() {
        let (a, _) = keys();
        let mut registry = SubscriberRegistry::new();
        let observers: Vec<_> = (0..3).map(|_| Observer::new(|_| {})).collect();
        for observer in &observers {
            registry.add(&a, observer);
        }

        registry.remove(&a, observers[0].id());
        let ids: Vec<_> = registry.interested(&a).iter().map(Observer::id).collect();
        assert_eq!(ids, [observers[1].id(), observers[2].id()]);
    }

    #[test]
    fn counts() {
        let (a, b) = keys();
        let mut registry = SubscriberRegistry::new();
        let x = Observer::new(|_| {});
        let y = Observer::new(|_| {});

        registry.add(&a, &x);
        registry.add(&a, &y);
        registry.add(&b, &x);
        registry.add_wildcard(&y);

        assert_eq!(registry.key_count(), 2);
        assert_eq!(registry.keyed_count(), 3);
        assert_eq!(registry.wildcard_count(), 1);

        registry.clear();
        assert_eq!(registry.key_count(), 0);
        assert_eq!(registry.wildcard_count(), 0);
    }

    #[test]
    fn dump_rows() {
        let (a, _) = keys();
        let mut registry = SubscriberRegistry::new();
        let named = Observer::named("render", |_| {}).with_description("repaints");
        let anonymous = Observer::new(|_| {});

        registry.add(&a, &named);
        registry.add_wildcard(&anonymous);

        assert_eq!(
            registry.dump(),
            vec![
                SubscriberData {
                    key: "a".into(),
                    handler: "render".into(),
                    details: Some("repaints".into()),
                },
                SubscriberData {
                    key: "All".into(),
                    handler: anonymous.label(),
                    details: None,
                },
            ]
        );
    }

    #[test]
    fn channel_display() {
        let (a, _) = keys();
        assert_eq!(Channel::Key(a).to_string(), "a");
        assert_eq!(Channel::All.to_string(), "All");
    }
}
