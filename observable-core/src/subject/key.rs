//! Field keys and the subject's key domain.
//!
//! The set of fields is fixed when the subject is built. Names are validated
//! once, against the [`Schema`], and resolved into an opaque [`Key`] that the
//! rest of the engine uses for lookups.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ObservableError, Result};

/// Identifier of one field of a subject.
///
/// Keys are only produced by a [`Schema`], so holding one means the name was
/// validated. Cloning is cheap (the name is shared).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key {
    index: usize,
    name: Arc<str>,
}

impl Key {
    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the field in declaration order.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Per-field declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) writable: bool,
}

/// The closed set of fields of a subject.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: IndexMap<Arc<str>, Slot>,
}

impl Schema {
    /// Declare a field. Returns `false` if the name was already declared.
    pub(crate) fn declare(&mut self, name: &str, writable: bool) -> bool {
        if self.fields.contains_key(name) {
            return false;
        }
        self.fields.insert(Arc::from(name), Slot { writable });
        true
    }

    /// Resolve a field name into a key.
    pub fn key(&self, name: &str) -> Result<Key> {
        self.fields
            .get_full(name)
            .map(|(index, name, _)| Key {
                index,
                name: name.clone(),
            })
            .ok_or_else(|| ObservableError::UnknownKey {
                name: name.to_string(),
            })
    }

    /// Whether the field accepts writes.
    pub fn is_writable(&self, key: &Key) -> bool {
        self.fields
            .get_index(key.index)
            .map(|(_, slot)| slot.writable)
            .unwrap_or(false)
    }

    /// All keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.fields.keys().enumerate().map(|(index, name)| Key {
            index,
            name: name.clone(),
        })
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A key belongs to this schema if its name sits at its index.
    fn owns(&self, key: &Key) -> bool {
        self.fields
            .get_index(key.index)
            .is_some_and(|(name, _)| **name == *key.name)
    }
}

/// Anything that can name a field: a resolved [`Key`] or a field name.
pub trait AsKey {
    /// Resolve against `schema`, failing with [`ObservableError::UnknownKey`].
    fn resolve(&self, schema: &Schema) -> Result<Key>;
}

impl AsKey for Key {
    fn resolve(&self, schema: &Schema) -> Result<Key> {
        if schema.owns(self) {
            Ok(self.clone())
        } else {
            Err(ObservableError::UnknownKey {
                name: self.name.to_string(),
            })
        }
    }
}

impl AsKey for str {
    fn resolve(&self, schema: &Schema) -> Result<Key> {
        schema.key(self)
    }
}

impl AsKey for String {
    fn resolve(&self, schema: &Schema) -> Result<Key> {
        schema.key(self)
    }
}

impl<T: AsKey + ?Sized> AsKey for &T {
    fn resolve(&self, schema: &Schema) -> Result<Key> {
        (**self).resolve(schema)
    }
}
