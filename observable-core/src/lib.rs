//! Observable Core
//!
//! This crate provides the core runtime for the Observable
//! property-observation engine. It implements:
//!
//! - An intercepted record whose field writes are detected
//! - Identity-based change detection (redundant writes are silent)
//! - Per-key, multi-key and wildcard subscriptions
//! - Immediate and batched (aggregated) notification
//! - Subscription counting and a subscriber dump for inspector panels
//!
//! UI bindings (context providers, hooks, inspector widgets) are expected to
//! live in other crates and only consume this API.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `subject`: field values, keys and the record's key domain
//! - `observe`: observers, the subscriber registry, batching and dispatch
//! - `error`: the error type returned by fallible operations
//!
//! # Example
//!
//! ```rust
//! use observable_core::{Observable, Value};
//! use std::sync::{Arc, Mutex};
//!
//! let observable = Observable::from_fields([("count", 0)]).unwrap();
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let seen_clone = seen.clone();
//! let subscription = observable
//!     .watch_fn("count", move |changes| {
//!         seen_clone.lock().unwrap().push(changes.get("count").cloned());
//!     })
//!     .unwrap();
//!
//! // Writing the current value notifies nobody
//! observable.set("count", 0).unwrap();
//!
//! // A real change is delivered immediately
//! observable.set("count", 5).unwrap();
//!
//! // Inside a batch only the last value is delivered, once
//! observable.batch(|| {
//!     observable.set("count", 6).unwrap();
//!     observable.set("count", 7).unwrap();
//! });
//!
//! assert_eq!(
//!     *seen.lock().unwrap(),
//!     vec![Some(Value::from(5)), Some(Value::from(7))]
//! );
//!
//! subscription.unsubscribe();
//! ```

pub mod error;
pub mod observe;
pub mod subject;

pub use error::{ObservableError, Result};
pub use observe::{
    BatchSession, ChangeSet, Channel, LifecycleHooks, Observable, Observer, ObserverId,
    SubscriberData, Subscription, SubscriptionGuard,
};
pub use subject::{AsKey, Key, Schema, Subject, SubjectBuilder, Value};
