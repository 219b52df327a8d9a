//! # Local Store Adapter
//!
//! Durable key-value persistence of rosters, the attendance database and the
//! current session. Reads and writes are synchronous and every value is a
//! complete serialized snapshot of the in-memory structure it mirrors.

pub mod file_store;
pub mod keys;
pub mod memory_store;

pub use file_store::FileKeyValueStore;
pub use memory_store::MemoryKeyValueStore;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::storage::traits::KeyValueStore;

/// Typed JSON view over a [`KeyValueStore`]
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    /// Local store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()))
    }

    /// Load and deserialize the value under `key`
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.inner.get(key)? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt value stored under {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Serialize `value` and overwrite whatever is stored under `key`
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.inner.set(key, &raw)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Role, Session};

    #[test]
    fn test_typed_round_trip() {
        let store = LocalStore::in_memory();
        let session = Session {
            username: "pastor".to_string(),
            role: Role::Admin,
            name: "Pastor".to_string(),
        };

        store.save(keys::CURRENT_USER, &session).unwrap();
        let loaded: Option<Session> = store.load(keys::CURRENT_USER).unwrap();
        assert_eq!(loaded, Some(session));

        store.remove(keys::CURRENT_USER).unwrap();
        let loaded: Option<Session> = store.load(keys::CURRENT_USER).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_value_is_an_error() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(keys::CURRENT_USER, "not json").unwrap();
        let store = LocalStore::new(kv);
        assert!(store.load::<Session>(keys::CURRENT_USER).is_err());
    }
}
