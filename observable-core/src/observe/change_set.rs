//! Change sets.
//!
//! A [`ChangeSet`] maps changed field names to their new values. Immediate
//! notifications carry exactly one entry; a batch flush hands each observer
//! the union of the entries it is interested in.

use serde::ser::{Serialize, SerializeMap, Serializer};
use smallvec::SmallVec;

use crate::subject::{Key, Value};

/// Field changes delivered to one observer in one notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    entries: SmallVec<[(Key, Value); 2]>,
}

impl ChangeSet {
    pub(crate) fn single(key: Key, value: Value) -> Self {
        let mut entries = SmallVec::new();
        entries.push((key, value));
        Self { entries }
    }

    /// Append an entry. Callers guarantee `key` is not already present.
    pub(crate) fn push(&mut self, key: Key, value: Value) {
        self.entries.push((key, value));
    }

    /// The new value of the named field, if it changed.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.name() == name)
            .map(|(_, v)| v)
    }

    /// The new value for `key`, if it changed.
    pub fn get_key(&self, key: &Key) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Render as a JSON object keyed by field name.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.name().to_string(), v.to_json()))
                .collect(),
        )
    }
}

impl Serialize for ChangeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key.name(), value)?;
        }
        map.end()
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
    fn push_keeps_insertion_order() {
        let (a, b) = keys();
        let mut changes = ChangeSet::single(b, Value::from(3));
        changes.push(a.clone(), Value::from(2));

        assert_eq!(changes.len(), 2);
        assert_eq!(changes.get_key(&a), Some(&Value::from(2)));
        let names: Vec<_> = changes.keys().map(Key::name).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn serializes_as_object() {
        let (a, b) = keys();
        let mut changes = ChangeSet::single(a, Value::from(2));
        changes.push(b, Value::from("x"));

        let json = serde_json::to_value(&changes).unwrap();
        assert_eq!(json, serde_json::json!({ "a": 2, "b": "x" }));
        assert_eq!(changes.to_json(), json);
    }

    #[test]
    fn missing_fields_are_absent() {
        let (a, _) = keys();
        let changes = ChangeSet::single(a, Value::Null);
        assert!(changes.contains("a"));
        assert!(!changes.contains("b"));
    }
}
