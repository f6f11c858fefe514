//! Error types for the observation engine.
//!
//! Structural failures (bad key, non-writable slot, malformed subject) are
//! surfaced synchronously to the caller as [`ObservableError`]. A failed
//! operation never partially mutates state and never notifies.
//!
//! Removing an observer that is not registered is not an error, and panics
//! raised inside observers are not caught here.

use thiserror::Error;

/// Errors produced by an [`Observable`](crate::Observable) or its builder.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObservableError {
    /// The field name is not part of the subject's key domain.
    #[error("unknown field `{name}`")]
    UnknownKey {
        /// The name that failed to resolve.
        name: String,
    },

    /// The field exists but was declared read-only.
    #[error("field `{key}` is not writable")]
    ReadOnly {
        /// Name of the read-only field.
        key: String,
    },

    /// The same field was declared twice while building a subject.
    #[error("field `{name}` declared more than once")]
    DuplicateKey {
        /// The duplicated name.
        name: String,
    },
}

impl ObservableError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ObservableError::UnknownKey { .. } => "unknown_key",
            ObservableError::ReadOnly { .. } => "read_only",
            ObservableError::DuplicateKey { .. } => "duplicate_key",
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = ObservableError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let err = ObservableError::UnknownKey { name: "x".into() };
        assert_eq!(err.as_label(), "unknown_key");
        assert_eq!(err.to_string(), "unknown field `x`");

        let err = ObservableError::ReadOnly { key: "id".into() };
        assert_eq!(err.as_label(), "read_only");
        assert_eq!(err.to_string(), "field `id` is not writable");
    }
}
