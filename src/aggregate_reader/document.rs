//! The reconstruction engine's output structure.
//!
//! A [`RowDocument`] is an insertion-ordered field map; values are raw
//! scalars, nested documents (entities, embedded objects and maps), or
//! lists. Documents are the pre-materialization form handed to an
//! external materializer, and serialize to JSON objects for diagnostics
//! and tests.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    Scalar(Value),
    Document(RowDocument),
    List(Vec<RowValue>),
}

impl RowValue {
    pub fn null() -> Self {
        RowValue::Scalar(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RowValue::Scalar(Value::Null))
    }

    /// Lossless JSON rendering. `preserve_order` keeps document field
    /// order in the resulting object.
    pub fn to_json(&self) -> Value {
        match self {
            RowValue::Scalar(v) => v.clone(),
            RowValue::Document(doc) => doc.to_json(),
            RowValue::List(items) => Value::Array(items.iter().map(RowValue::to_json).collect()),
        }
    }
}

/// Ordered field-name to value mapping. Keys are unique; inserting an
/// existing key replaces the value in place, keeping the original
/// position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowDocument {
    fields: Vec<(String, RowValue)>,
}

impl RowDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: RowValue) {
        let field = field.into();
        if let Some(slot) = self.fields.iter_mut().find(|(name, _)| *name == field) {
            slot.1 = value;
        } else {
            self.fields.push((field, value));
        }
    }

    pub fn get(&self, field: &str) -> Option<&RowValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut RowValue> {
        self.fields
            .iter_mut()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, field: &str) -> Option<RowValue> {
        let idx = self.fields.iter().position(|(name, _)| name == field)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut RowValue)> {
        self.fields
            .iter_mut()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json());
        }
        Value::Object(map)
    }
}

impl IntoIterator for RowDocument {
    type Item = (String, RowValue);
    type IntoIter = std::vec::IntoIter<(String, RowValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl Serialize for RowDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for RowValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RowValue::Scalar(v) => v.serialize(serializer),
            RowValue::Document(doc) => doc.serialize(serializer),
            RowValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_replaces_in_place() {
        let mut doc = RowDocument::new();
        doc.insert("a", RowValue::Scalar(json!(1)));
        doc.insert("b", RowValue::Scalar(json!(2)));
        doc.insert("a", RowValue::Scalar(json!(3)));
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.to_json(), json!({"a": 3, "b": 2}));
        let order: Vec<&str> = doc.iter().map(|(name, _)| name).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn nested_json_rendering() {
        let mut inner = RowDocument::new();
        inner.insert("qty", RowValue::Scalar(json!(2)));
        let mut doc = RowDocument::new();
        doc.insert("id", RowValue::Scalar(json!(1)));
        doc.insert(
            "lineItems",
            RowValue::List(vec![RowValue::Document(inner), RowValue::null()]),
        );
        assert_eq!(
            doc.to_json(),
            json!({"id": 1, "lineItems": [{"qty": 2}, null]})
        );
    }
}
