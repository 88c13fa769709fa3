use parking_lot::RwLock;
use snipper_core::kv::{KeyValueStore, Result};
use snipper_core::KvError;
use std::collections::HashMap;

/// In-memory key/value store.
///
/// A single reader/writer lock guards the whole map: `get` shares it,
/// writes take it exclusively. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Inserts or replaces `key`. Infallible, unlike the trait's `set`.
    pub(crate) fn insert(&self, key: String, value: Vec<u8>) {
        self.entries.write().insert(key, value);
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| KvError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
