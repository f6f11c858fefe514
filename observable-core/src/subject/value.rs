//! Field values.
//!
//! A subject is heterogeneous: every slot holds a [`Value`], which is either a
//! primitive (compared by value) or a shared reference (compared by identity).
//!
//! # Change Detection
//!
//! Writes are filtered through [`Value::is_same`], which follows the rules of
//! JavaScript's `Object.is`:
//!
//! - primitives compare by value
//! - floats treat every NaN as the same value, and `+0.0` as different from `-0.0`
//! - lists, maps and opaque values compare by `Arc` pointer identity, never
//!   structurally
//! - values of different variants are never the same
//!
//! Identity comparison is what keeps redundant writes from triggering
//! notifications. Two freshly built lists with equal contents are *different*
//! values, while a clone of the same list is the *same* value.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A value stored in a subject slot.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// An immutable string, compared by content.
    Str(Arc<str>),
    /// A shared list, compared by identity.
    List(Arc<Vec<Value>>),
    /// A shared string-keyed map, compared by identity.
    Map(Arc<IndexMap<String, Value>>),
    /// Any other shared payload, compared by identity.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Build a list value from an iterator.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Build a map value from an iterator of entries.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Wrap an arbitrary payload.
    pub fn opaque<T: Any + Send + Sync>(payload: T) -> Self {
        Value::Opaque(Arc::new(payload))
    }

    /// `Object.is`-style comparison. See the module docs.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                if a.is_nan() || b.is_nan() {
                    a.is_nan() && b.is_nan()
                } else {
                    a.to_bits() == b.to_bits()
                }
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the payload of an [`Value::Opaque`] as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(payload) => payload.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Render as JSON for inspection. Non-finite floats become `null` and
    /// opaque payloads become the string `"<opaque>"`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.to_string()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Opaque(_) => Json::String(OPAQUE_TEXT.to_string()),
        }
    }
}

const OPAQUE_TEXT: &str = "<opaque>";

/// Equality is [`Value::is_same`]: identity for shared values.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Value::Opaque(payload) => f
                .debug_tuple("Opaque")
                .field(&Arc::as_ptr(payload))
                .finish(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Opaque(_) => serializer.serialize_str(OPAQUE_TEXT),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_compare_by_value() {
        assert!(Value::from(5).is_same(&Value::from(5)));
        assert!(!Value::from(5).is_same(&Value::from(6)));
        assert!(Value::from("a").is_same(&Value::from(String::from("a"))));
        assert!(Value::Null.is_same(&Value::Null));
    }

    #[test]
    fn floats_follow_object_is() {
        assert!(Value::Float(f64::NAN).is_same(&Value::Float(f64::NAN)));
        assert!(!Value::Float(0.0).is_same(&Value::Float(-0.0)));
        assert!(Value::Float(1.5).is_same(&Value::Float(1.5)));
    }

    #[test]
    fn shared_values_compare_by_identity() {
        let a = Value::list([1, 2, 3]);
        let b = Value::list([1, 2, 3]);

        assert!(a.is_same(&a.clone()));
        assert!(!a.is_same(&b));

        let payload = Value::opaque(vec![1u8]);
        assert!(payload.is_same(&payload.clone()));
        assert!(!payload.is_same(&Value::opaque(vec![1u8])));
    }

    #[test]
    fn default_is_null() {
        assert!(Value::default().is_null());
    }

    #[test]
    fn different_variants_differ() {
        assert!(!Value::Int(1).is_same(&Value::Float(1.0)));
        assert!(!Value::Null.is_same(&Value::Bool(false)));
    }

    #[test]
    fn to_json_renders_nested_values() {
        let value = Value::map([("name", Value::from("x")), ("tags", Value::list(["a"]))]);
        assert_eq!(
            value.to_json(),
            serde_json::json!({ "name": "x", "tags": ["a"] })
        );
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(Value::opaque(1u8).to_json(), serde_json::json!("<opaque>"));
    }

    #[test]
    fn serializes_like_to_json() {
        let value = Value::list([Value::from(1), Value::from(true), Value::Null]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, value.to_json());
    }

    #[test]
    fn downcast_opaque_payload() {
        let value = Value::opaque(String::from("hello"));
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello"));
        assert!(value.downcast_ref::<u32>().is_none());
    }
}
