//! In-process store backed by a `HashMap`.

use std::collections::HashMap;

use crate::KeyValueStore;
use crate::error::Result;

/// Default store: values live as long as the store itself.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys written so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<String> {
        Ok(self.values.get(key).cloned().unwrap_or_default())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reads_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.get("token_app").unwrap(), "");
        assert!(store.is_empty());
    }

    #[test]
    fn set_overwrites() {
        let mut store = MemoryStore::new();
        store.set("token_app", "first").unwrap();
        store.set("token_app", "second").unwrap();
        assert_eq!(store.get("token_app").unwrap(), "second");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn boxed_store_delegates() {
        let mut store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        store.set("linked_app", "1").unwrap();
        assert_eq!(store.get("linked_app").unwrap(), "1");
    }
}
