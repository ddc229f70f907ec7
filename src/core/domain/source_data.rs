//! The per-scan view assembled from the source cache.

use std::collections::HashMap;

use serde_json::Value;

/// Mapping from source name to the latest payload produced by that source.
///
/// Payload shape is source-specific and opaque to the pipeline (spec §3,
/// §9 "untyped opaque payloads"); detectors parse at the boundary via
/// [`SourceData::get`].
#[derive(Debug, Clone, Default)]
pub struct SourceData(HashMap<String, Value>);

impl SourceData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) a source's payload.
    pub fn insert(&mut self, name: impl Into<String>, payload: Value) {
        self.0.insert(name.into(), payload);
    }

    /// Raw opaque payload lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Typed accessor: deserializes the payload for `name`, if present and
    /// well-formed. Detector adapter pattern from spec §9.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.0.get(name).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Whether every one of `names` is present. Used by Phase D to decide
    /// whether a detector without missing-input tolerance must be skipped.
    #[must_use]
    pub fn has_all(&self, names: &[String]) -> bool {
        names.iter().all(|n| self.contains(n))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        v: i64,
    }

    #[test]
    fn get_as_deserializes_payload() {
        let mut data = SourceData::new();
        data.insert("binance", json!({"v": 1}));
        assert_eq!(data.get_as::<Payload>("binance"), Some(Payload { v: 1 }));
    }

    #[test]
    fn get_as_returns_none_for_missing_or_malformed() {
        let mut data = SourceData::new();
        data.insert("binance", json!({"wrong": true}));
        assert_eq!(data.get_as::<Payload>("binance"), None);
        assert_eq!(data.get_as::<Payload>("missing"), None);
    }

    #[test]
    fn has_all_checks_every_declared_source() {
        let mut data = SourceData::new();
        data.insert("a", json!(1));
        data.insert("b", json!(2));
        assert!(data.has_all(&["a".to_string(), "b".to_string()]));
        assert!(!data.has_all(&["a".to_string(), "c".to_string()]));
    }
}
