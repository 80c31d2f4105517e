//! Per-entity game payload.
//!
//! Every entity carries a [`StateBag`]: string keys mapped to JSON values.
//! Games store whatever they need there (collected keys, hit points, switch
//! states) and the bag is deep-copied into every undo step.
//!
//! Values are kept as [`serde_json::Value`] so that any `Serialize` type can
//! go in and any `Deserialize` type can come out.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::GridError;

/// Key-value payload attached to an entity or composite.
///
/// Uses a `BTreeMap` so iteration order and serialized form are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateBag(BTreeMap<String, serde_json::Value>);

impl StateBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Read and convert the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent and an error when the stored
    /// value does not convert into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, GridError> {
        self.0
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|source| GridError::State {
                    key: key.to_owned(),
                    source,
                })
            })
            .transpose()
    }

    /// The raw JSON value under `key`.
    pub fn get_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), GridError> {
        let value = serde_json::to_value(value).map_err(|source| GridError::State {
            key: key.to_owned(),
            source,
        })?;
        self.0.insert(key.to_owned(), value);
        Ok(())
    }

    /// Store a raw JSON value under `key`.
    pub fn set_value(&mut self, key: &str, value: serde_json::Value) {
        self.0.insert(key.to_owned(), value);
    }

    /// Remove and return the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.0.remove(key)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
