//! Ephemeral key-value store for per-session state.

use super::{KeyValueStore, KvError, KvResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory key-value store; contents live as long as the session.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry, as at session end.
    pub fn clear(&self) -> KvResult<()> {
        self.entries
            .lock()
            .map_err(|_| KvError::LockPoisoned)?
            .clear();
        Ok(())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| KvError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.entries
            .lock()
            .map_err(|_| KvError::LockPoisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryKeyValueStore;
    use crate::storage::KeyValueStore;

    #[test]
    fn set_overwrites_and_clear_empties() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "1").unwrap();
        store.set("k", "2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("2"));

        store.clear().unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
