//! Observer types for the observation engine.
//!
//! An Observer is a callback that receives [`ChangeSet`]s. Its identity is an
//! [`ObserverId`] token assigned at creation, not the closure itself: clones of
//! an `Observer` share the token and are the same observer, while two
//! observers built from identical closures are distinct.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::ChangeSet;

/// Unique identifier for an observer.
///
/// Used as the set-membership key in the registry, so registering the same
/// observer twice for one key is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Generate a new unique observer ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

/// The callback behind an observer.
pub type Handler = Arc<dyn Fn(&ChangeSet) + Send + Sync>;

/// An observer of field changes.
#[derive(Clone)]
pub struct Observer {
    id: ObserverId,
    handler: Handler,
    /// Shown in the subscriber dump instead of `Anonymous #<id>`.
    name: Option<Arc<str>>,
    description: Option<Arc<str>>,
}

impl Observer {
    /// Create an anonymous observer with a fresh identity.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        Self {
            id: ObserverId::new(),
            handler: Arc::new(handler),
            name: None,
            description: None,
        }
    }

    /// Create a named observer.
    pub fn named<F>(name: impl Into<Arc<str>>, handler: F) -> Self
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        let mut observer = Self::new(handler);
        observer.name = Some(name.into());
        observer
    }

    /// Attach a human-readable description for diagnostics.
    pub fn with_description(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Get the observer's unique ID.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The name, or `Anonymous #<id>` for unnamed observers.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => format!("Anonymous #{}", self.id.raw()),
        }
    }

    /// Deliver a change set. Panics in the handler propagate to the caller.
    pub fn notify(&self, changes: &ChangeSet) {
        (self.handler)(changes);
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Observer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Observer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_ids_are_unique() {
        let id1 = ObserverId::new();
        let id2 = ObserverId::new();
        let id3 = ObserverId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn identity_follows_token_not_closure() {
        let a = Observer::new(|_| {});
        let b = Observer::new(|_| {});

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn observer_notify_calls_callback() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let observer = Observer::new(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        assert!(!called.load(Ordering::SeqCst));
        observer.notify(&ChangeSet::default());
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn labels_fall_back_to_anonymous() {
        let anonymous = Observer::new(|_| {});
        assert_eq!(anonymous.label(), format!("Anonymous #{}", anonymous.id().raw()));

        let named = Observer::named("counter", |_| {}).with_description("renders count");
        assert_eq!(named.label(), "counter");
        assert_eq!(named.description(), Some("renders count"));
    }
}
