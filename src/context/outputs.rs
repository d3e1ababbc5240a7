// ABOUTME: Append-only string key/value store written by stages.
// ABOUTME: Rejects overwrites so downstream stages see each value exactly once.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutputError {
    #[error("output '{0}' was already written")]
    Duplicate(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Outputs(BTreeMap<String, String>);

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), OutputError> {
        let key = key.into();
        if self.0.contains_key(&key) {
            return Err(OutputError::Duplicate(key));
        }
        self.0.insert(key, value.into());
        Ok(())
    }

    /// Chainable `insert` for stage bodies producing a handful of bindings.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self, OutputError> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`, failing on the first key already present.
    /// Nothing is written when a collision is found.
    pub fn merge(&mut self, other: &Outputs) -> Result<(), OutputError> {
        if let Some(dup) = other.keys().find(|k| self.0.contains_key(*k)) {
            return Err(OutputError::Duplicate(dup.to_string()));
        }
        for (k, v) in other.iter() {
            self.0.insert(k.to_string(), v.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_append_only() {
        let mut outputs = Outputs::new();
        outputs.insert("endpoint", "https://a").unwrap();
        assert_eq!(
            outputs.insert("endpoint", "https://b"),
            Err(OutputError::Duplicate("endpoint".to_string()))
        );
        assert_eq!(outputs.get("endpoint"), Some("https://a"));
    }

    #[test]
    fn chained_duplicate_is_rejected() {
        let err = Outputs::new()
            .with("revision", "r1")
            .and_then(|outputs| outputs.with("revision", "r2"))
            .unwrap_err();
        assert_eq!(err, OutputError::Duplicate("revision".to_string()));
    }

    #[test]
    fn merge_is_all_or_nothing() {
        let mut outputs = Outputs::new().with("a", "1").unwrap();
        let incoming = Outputs::new().with("b", "2").unwrap().with("a", "3").unwrap();
        assert!(outputs.merge(&incoming).is_err());
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs.get("b"), None);
    }
}
