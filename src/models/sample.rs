//! Single-sample mappings of field name to array value.

use super::array::ArrayValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar metadata attached to a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Free text.
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

/// One data point: a mapping of field name to array value.
///
/// Field names are unique. Iteration is in sorted key order so that anything
/// derived from a sample (schemas, archive headers) is reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    fields: BTreeMap<String, ArrayValue>,
    metadata: BTreeMap<String, Scalar>,
}

impl Sample {
    /// Creates an empty sample.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any previous value under the same name.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: ArrayValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Scalar) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Inserts a field, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: ArrayValue) -> Option<ArrayValue> {
        self.fields.insert(name.into(), value)
    }

    /// Looks up a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArrayValue> {
        self.fields.get(name)
    }

    /// Removes a field.
    pub fn remove(&mut self, name: &str) -> Option<ArrayValue> {
        self.fields.remove(name)
    }

    /// Returns whether a field is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates over fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &ArrayValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the sample has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Scalar metadata.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, Scalar> {
        &self.metadata
    }

    /// Mutable scalar metadata.
    pub const fn metadata_mut(&mut self) -> &mut BTreeMap<String, Scalar> {
        &mut self.metadata
    }
}

impl FromIterator<(String, ArrayValue)> for Sample {
    fn from_iter<I: IntoIterator<Item = (String, ArrayValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
            metadata: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_builder() {
        let sample = Sample::new()
            .with_field("b", ArrayValue::scalar(1u8))
            .with_field("a", ArrayValue::scalar(2u8))
            .with_metadata("source", Scalar::Text("cam0".to_string()));

        assert_eq!(sample.len(), 2);
        assert!(sample.contains("a"));
        assert_eq!(sample.field_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            sample.metadata().get("source"),
            Some(&Scalar::Text("cam0".to_string()))
        );
    }

    #[test]
    fn test_scalar_serde_untagged() {
        let json = serde_json::to_string(&Scalar::Int(3)).unwrap();
        assert_eq!(json, "3");
        let parsed: Scalar = serde_json::from_str("1.25").unwrap();
        assert_eq!(parsed, Scalar::Float(1.25));
        let parsed: Scalar = serde_json::from_str("\"x\"").unwrap();
        assert_eq!(parsed, Scalar::Text("x".to_string()));
    }
}
