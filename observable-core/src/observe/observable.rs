//! Observable Implementation
//!
//! An [`Observable`] owns a [`Subject`]'s values and its
//! [`SubscriberRegistry`]. Every write goes through [`Observable::set`]:
//!
//! 1. the key is resolved against the schema (unknown names fail)
//! 2. the new value is compared with the stored one using
//!    [`Value::is_same`]; an identical value is a successful no-op
//! 3. read-only slots reject the write
//! 4. the slot is updated, then the change is dispatched immediately or
//!    recorded in the open batch
//!
//! # Dispatch
//!
//! Immediate dispatch builds one single-entry [`ChangeSet`] per observer and
//! delivers it to the key's observers in registration order, then to the
//! wildcard observers. Batched dispatch is described in the `batch` module.
//!
//! # Locking
//!
//! State lives behind one `parking_lot::Mutex`. The lock is always released
//! before observers or lifecycle hooks run, so they may read, write,
//! subscribe and unsubscribe on the same observable. The model is still
//! single-writer: concurrent writers need their own serialization to get a
//! meaningful notification order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::batch::{self, BatchState};
use super::observer::Observer;
use super::registry::{Channel, Hook, LifecycleHooks, SubscriberData, SubscriberRegistry};
use super::ChangeSet;
use crate::error::{ObservableError, Result};
use crate::subject::{AsKey, Key, Schema, Subject, Value};

struct State {
    values: Vec<Value>,
    registry: SubscriberRegistry,
    hooks: LifecycleHooks,
    batch: BatchState,
}

struct Shared {
    schema: Schema,
    state: Mutex<State>,
}

/// Which hook slot a registry change reports to.
#[derive(Clone, Copy)]
enum HookSlot {
    Watch,
    Unwatch,
    WatchAll,
    UnwatchAll,
}

impl Shared {
    fn hook(&self, slot: HookSlot) -> Option<Hook> {
        let state = self.state.lock();
        match slot {
            HookSlot::Watch => state.hooks.on_watch.clone(),
            HookSlot::Unwatch => state.hooks.on_unwatch.clone(),
            HookSlot::WatchAll => state.hooks.on_watch_all.clone(),
            HookSlot::UnwatchAll => state.hooks.on_unwatch_all.clone(),
        }
    }

    fn fire(&self, slot: HookSlot, channel: &Channel, observer: &Observer) {
        if let Some(hook) = self.hook(slot) {
            hook(channel, observer);
        }
    }

    fn add(&self, key: &Key, observer: &Observer) {
        let added = self.state.lock().registry.add(key, observer);
        debug!(key = %key, observer = observer.id().raw(), added, "watch");
        self.fire(HookSlot::Watch, &Channel::Key(key.clone()), observer);
    }

    fn remove(&self, key: &Key, observer: &Observer) {
        let removed = self.state.lock().registry.remove(key, observer.id());
        debug!(key = %key, observer = observer.id().raw(), removed, "unwatch");
        self.fire(HookSlot::Unwatch, &Channel::Key(key.clone()), observer);
    }

    fn add_wildcard(&self, observer: &Observer) {
        let added = self.state.lock().registry.add_wildcard(observer);
        debug!(observer = observer.id().raw(), added, "watch all");
        self.fire(HookSlot::WatchAll, &Channel::All, observer);
    }

    fn remove_wildcard(&self, observer: &Observer) {
        let removed = self.state.lock().registry.remove_wildcard(observer.id());
        debug!(observer = observer.id().raw(), removed, "unwatch all");
        self.fire(HookSlot::UnwatchAll, &Channel::All, observer);
    }

    fn end_batch(&self) {
        let deliveries = {
            let mut state = self.state.lock();
            let pending = state.batch.close();
            batch::aggregate(pending, &state.registry)
        };
        debug!(observers = deliveries.len(), "batch flushed");
        for (observer, changes) in deliveries {
            observer.notify(&changes);
        }
    }

    fn abandon_batch(&self) {
        let pending = self.state.lock().batch.pending_len();
        warn!(pending, "batch abandoned during panic; left open until the next end");
    }
}

/// A subject whose field writes are observed.
///
/// Cloning is cheap and yields another handle to the same state.
#[derive(Clone)]
pub struct Observable {
    shared: Arc<Shared>,
}

impl Observable {
    /// Start observing `subject`.
    pub fn new(subject: Subject) -> Self {
        let Subject { schema, values } = subject;
        Self {
            shared: Arc::new(Shared {
                schema,
                state: Mutex::new(State {
                    values,
                    registry: SubscriberRegistry::new(),
                    hooks: LifecycleHooks::default(),
                    batch: BatchState::default(),
                }),
            }),
        }
    }

    /// Build an observable whose fields are all writable.
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Subject::from_fields(fields).map(Self::new)
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    /// Resolve a field name into a [`Key`].
    pub fn key(&self, name: &str) -> Result<Key> {
        self.shared.schema.key(name)
    }

    // Fields ---------------------------------------------------------------

    /// Current value of a field.
    pub fn get(&self, key: impl AsKey) -> Result<Value> {
        let key = key.resolve(&self.shared.schema)?;
        Ok(self.shared.state.lock().values[key.index()].clone())
    }

    /// Write a field.
    ///
    /// Writing a value that [`is_same`](Value::is_same) as the stored one
    /// succeeds without notifying anyone. Fails with
    /// [`ObservableError::UnknownKey`] or [`ObservableError::ReadOnly`]
    /// without mutating state.
    pub fn set(&self, key: impl AsKey, value: impl Into<Value>) -> Result<()> {
        let key = key.resolve(&self.shared.schema)?;
        let value = value.into();

        let observers = {
            let mut state = self.shared.state.lock();
            let slot = &mut state.values[key.index()];
            if slot.is_same(&value) {
                trace!(key = %key, "write unchanged");
                return Ok(());
            }
            if !self.shared.schema.is_writable(&key) {
                return Err(ObservableError::ReadOnly {
                    key: key.name().to_string(),
                });
            }
            *slot = value.clone();

            if state.batch.is_open() {
                trace!(key = %key, "write batched");
                state.batch.record(key, value);
                return Ok(());
            }
            state.registry.interested(&key)
        };

        trace!(key = %key, observers = observers.len(), "write dispatched");
        for observer in observers {
            observer.notify(&ChangeSet::single(key.clone(), value.clone()));
        }
        Ok(())
    }

    /// Apply several writes in order. Stops at the first failure; earlier
    /// writes stay applied and notified.
    pub fn set_many<I, K, V>(&self, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsKey,
        V: Into<Value>,
    {
        updates
            .into_iter()
            .try_for_each(|(key, value)| self.set(key, value))
    }

    /// Current state as a JSON object, in declaration order.
    pub fn snapshot(&self) -> serde_json::Value {
        let state = self.shared.state.lock();
        serde_json::Value::Object(
            self.shared
                .schema
                .keys()
                .zip(state.values.iter())
                .map(|(key, value)| (key.name().to_string(), value.to_json()))
                .collect(),
        )
    }

    // Batching -------------------------------------------------------------

    /// Open a batch. Writes are recorded until the session ends.
    pub fn begin_batch(&self) -> BatchSession<'_> {
        let opened = self.shared.state.lock().batch.open();
        debug!(opened, "batch begin");
        BatchSession {
            observable: self,
            ended: false,
        }
    }

    /// Whether a batch is currently open.
    pub fn is_batching(&self) -> bool {
        self.shared.state.lock().batch.is_open()
    }

    /// Run `f` inside a batch and flush when it returns.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let session = self.begin_batch();
        let out = f();
        session.end();
        out
    }

    // Watchers -------------------------------------------------------------

    /// Watch one field.
    pub fn watch(&self, key: impl AsKey, observer: &Observer) -> Result<Subscription> {
        let key = key.resolve(&self.shared.schema)?;
        self.shared.add(&key, observer);
        Ok(self.subscription(Target::Keys(SmallVec::from_elem(key, 1)), observer))
    }

    /// Watch one field with a fresh anonymous observer.
    pub fn watch_fn<F>(&self, key: impl AsKey, handler: F) -> Result<Subscription>
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.watch(key, &Observer::new(handler))
    }

    /// Watch several fields with one observer. All names are resolved before
    /// anything is registered.
    pub fn watch_many<I, K>(&self, keys: I, observer: &Observer) -> Result<Subscription>
    where
        I: IntoIterator<Item = K>,
        K: AsKey,
    {
        let keys = keys
            .into_iter()
            .map(|key| key.resolve(&self.shared.schema))
            .collect::<Result<SmallVec<[Key; 4]>>>()?;
        for key in &keys {
            self.shared.add(key, observer);
        }
        Ok(self.subscription(Target::Keys(keys), observer))
    }

    pub fn watch_many_fn<I, K, F>(&self, keys: I, handler: F) -> Result<Subscription>
    where
        I: IntoIterator<Item = K>,
        K: AsKey,
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.watch_many(keys, &Observer::new(handler))
    }

    /// Watch every field.
    pub fn watch_all(&self, observer: &Observer) -> Subscription {
        self.shared.add_wildcard(observer);
        self.subscription(Target::All, observer)
    }

    pub fn watch_all_fn<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.watch_all(&Observer::new(handler))
    }

    /// Remove `observer` from one field. Not being registered is fine.
    pub fn unwatch(&self, key: impl AsKey, observer: &Observer) -> Result<()> {
        let key = key.resolve(&self.shared.schema)?;
        self.shared.remove(&key, observer);
        Ok(())
    }

    /// Remove `observer` from the wildcard set.
    pub fn unwatch_all(&self, observer: &Observer) {
        self.shared.remove_wildcard(observer);
    }

    /// Drop every registration. Fires no hooks.
    pub fn reset_watchers(&self) {
        self.shared.state.lock().registry.clear();
        debug!("watchers reset");
    }

    /// Replace the lifecycle hooks.
    pub fn set_hooks(&self, hooks: LifecycleHooks) {
        self.shared.state.lock().hooks = hooks;
    }

    fn subscription(&self, target: Target, observer: &Observer) -> Subscription {
        Subscription {
            shared: Arc::downgrade(&self.shared),
            target,
            observer: observer.clone(),
            active: AtomicBool::new(true),
        }
    }

    // Count watchers -------------------------------------------------------

    /// Number of fields with at least one observer.
    pub fn watched_key_count(&self) -> usize {
        self.shared.state.lock().registry.key_count()
    }

    /// Number of observers of one field; zero for unknown names.
    pub fn watchers_count_for(&self, key: impl AsKey) -> usize {
        match key.resolve(&self.shared.schema) {
            Ok(key) => self.shared.state.lock().registry.count_for(&key),
            Err(_) => 0,
        }
    }

    /// Number of keyed registrations across all fields.
    pub fn watchers_count_for_all_keys(&self) -> usize {
        self.shared.state.lock().registry.keyed_count()
    }

    /// Number of wildcard observers.
    pub fn watchers_all_count(&self) -> usize {
        self.shared.state.lock().registry.wildcard_count()
    }

    /// Fields with at least one observer, in first-registration order.
    pub fn watched_keys(&self) -> Vec<Key> {
        self.shared.state.lock().registry.keys().cloned().collect()
    }

    /// One row per registration, for inspector panels. Read-only.
    pub fn debug_dump(&self) -> Vec<SubscriberData> {
        self.shared.state.lock().registry.dump()
    }
}

impl std::fmt::Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Observable")
            .field("values", &state.values)
            .field("registry", &state.registry)
            .field("batching", &state.batch.is_open())
            .finish()
    }
}

/// An open batch on one observable.
///
/// Ending the session flushes the aggregated changes. Dropping it without
/// calling [`end`](BatchSession::end) also flushes, unless the thread is
/// panicking: then the batch stays open with its pending changes, and the
/// next session to end delivers them.
#[must_use = "the batch stays open until the session is ended or dropped"]
pub struct BatchSession<'a> {
    observable: &'a Observable,
    ended: bool,
}

impl BatchSession<'_> {
    /// Close the batch and notify every interested observer once.
    pub fn end(mut self) {
        self.ended = true;
        self.observable.shared.end_batch();
    }
}

impl Drop for BatchSession<'_> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        if std::thread::panicking() {
            self.observable.shared.abandon_batch();
        } else {
            self.observable.shared.end_batch();
        }
    }
}

enum Target {
    Keys(SmallVec<[Key; 4]>),
    All,
}

/// Handle returned by every `watch*` call.
///
/// Dropping it does **not** unsubscribe; call
/// [`unsubscribe`](Subscription::unsubscribe), or convert it with
/// [`into_guard`](Subscription::into_guard) to tie the registration to a scope.
#[must_use = "dropping a Subscription keeps the observer registered"]
pub struct Subscription {
    shared: Weak<Shared>,
    target: Target,
    observer: Observer,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the registration. Only the first call has any effect.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        match &self.target {
            Target::Keys(keys) => {
                for key in keys {
                    shared.remove(key, &self.observer);
                }
            }
            Target::All => shared.remove_wildcard(&self.observer),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Unsubscribe automatically when the returned guard is dropped.
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard(self)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channels: Vec<String> = match &self.target {
            Target::Keys(keys) => keys.iter().map(ToString::to_string).collect(),
            Target::All => vec![Channel::All.to_string()],
        };
        f.debug_struct("Subscription")
            .field("channels", &channels)
            .field("observer", &self.observer)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Unsubscribes when dropped.
#[derive(Debug)]
pub struct SubscriptionGuard(Subscription);

impl SubscriptionGuard {
    pub fn subscription(&self) -> &Subscription {
        &self.0
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}
