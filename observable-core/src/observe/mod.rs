//! Observation Engine
//!
//! This module turns a [`Subject`](crate::Subject) into an [`Observable`]:
//! field writes are intercepted, filtered by identity, and fanned out to
//! registered observers.
//!
//! # Concepts
//!
//! ## Observers
//!
//! An [`Observer`] is a callback receiving a [`ChangeSet`]. It can watch one
//! field, several fields (one registration per field, sharing the observer),
//! or every field through the wildcard channel. Every registration returns a
//! [`Subscription`] whose `unsubscribe` is idempotent.
//!
//! ## Immediate Mode
//!
//! Outside a batch, each real change is delivered at once as a single-entry
//! change set: first to the field's observers in registration order, then to
//! the wildcard observers.
//!
//! ## Batches
//!
//! Between [`Observable::begin_batch`] and [`BatchSession::end`], writes are
//! only recorded. The flush gives every interested observer exactly one
//! change set with the latest value of each field it cares about.
//!
//! # Implementation Notes
//!
//! Execution is synchronous: observers run on the writer's thread, inside
//! the call that triggered them. Observer panics are not caught.

mod batch;
mod change_set;
mod observable;
mod observer;
mod registry;

pub use change_set::ChangeSet;
pub use observable::{BatchSession, Observable, Subscription, SubscriptionGuard};
pub use observer::{Handler, Observer, ObserverId};
pub use registry::{Channel, Hook, LifecycleHooks, SubscriberData, SubscriberRegistry};
