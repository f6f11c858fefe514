//! Subject
//!
//! The subject is the plain record wrapped by an
//! [`Observable`](crate::Observable): a fixed set of named fields, each holding
//! a [`Value`]. Fields are declared up front with a [`SubjectBuilder`] and may
//! be marked read-only; writes to a read-only slot fail.
//!
//! ```rust
//! use observable_core::{Observable, Subject};
//!
//! let subject = Subject::builder()
//!     .field("count", 0)
//!     .readonly("id", "user-1")
//!     .build()
//!     .unwrap();
//!
//! let observable = Observable::new(subject);
//! assert_eq!(observable.get("count").unwrap().as_int(), Some(0));
//! ```

mod key;
mod value;

pub use key::{AsKey, Key, Schema};
pub use value::Value;

use crate::error::{ObservableError, Result};

/// A validated record: its schema plus the initial value of every field.
#[derive(Debug, Clone, Default)]
pub struct Subject {
    pub(crate) schema: Schema,
    pub(crate) values: Vec<Value>,
}

impl Subject {
    /// Start declaring fields.
    pub fn builder() -> SubjectBuilder {
        SubjectBuilder::default()
    }

    /// Build a subject whose fields are all writable.
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        fields
            .into_iter()
            .fold(SubjectBuilder::default(), |builder, (name, value)| {
                builder.field(name, value)
            })
            .build()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Declares the fields of a [`Subject`].
///
/// Errors (duplicate names) are deferred to [`SubjectBuilder::build`] so the
/// builder can be chained.
#[derive(Debug, Default)]
pub struct SubjectBuilder {
    subject: Subject,
    duplicate: Option<String>,
}

impl SubjectBuilder {
    /// Declare a writable field.
    pub fn field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.declare(name.into(), value.into(), true)
    }

    /// Declare a field that rejects every write which would change it.
    pub fn readonly(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.declare(name.into(), value.into(), false)
    }

    fn declare(mut self, name: String, value: Value, writable: bool) -> Self {
        if self.subject.schema.declare(&name, writable) {
            self.subject.values.push(value);
        } else if self.duplicate.is_none() {
            self.duplicate = Some(name);
        }
        self
    }

    /// Finish, failing if any name was declared twice.
    pub fn build(self) -> Result<Subject> {
        match self.duplicate {
            Some(name) => Err(ObservableError::DuplicateKey { name }),
            None => Ok(self.subject),
        }
    }
}
