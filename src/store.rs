// 🗄️ Key-value store adapter
// The store is the system of record: plain keys for blobs, hashes for
// collections keyed by field. Values are JSON documents.

use crate::error::StoreError;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations the vote core needs from a shared key-value store.
///
/// Implementations must be safe to share across concurrent requests. Nothing
/// above this trait holds mutable state between calls.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Write `value` only if the current value equals `expected`
    /// (`None` meaning the key is absent). Returns whether the write happened.
    fn compare_and_set(&self, key: &str, expected: Option<&Value>, value: Value)
        -> StoreResult<bool>;

    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Plain keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> StoreResult<Vec<String>>;

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<Value>>;

    fn hset(&self, key: &str, field: &str, value: Value) -> StoreResult<()>;

    /// Insert-if-absent on a hash field. Returns whether the field was written.
    fn hset_nx(&self, key: &str, field: &str, value: Value) -> StoreResult<bool>;

    /// Returns whether the field existed.
    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool>;

    /// All fields of a hash, sorted by field name.
    fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, Value)>>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Default)]
struct Inner {
    values: HashMap<String, Value>,
    hashes: HashMap<String, BTreeMap<String, Value>>,
}

/// Process-local store behind a single mutex. Used by tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.lock()?.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.lock()?.values.insert(key.to_string(), value);
        Ok(())
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&Value>,
        value: Value,
    ) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        if inner.values.get(key) != expected {
            return Ok(false);
        }
        inner.values.insert(key.to_string(), value);
        Ok(true)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.lock()?.values.remove(key).is_some())
    }

    fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let inner = self.lock()?;
        let mut keys: Vec<String> = inner
            .values
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .lock()?
            .hashes
            .get(key)
            .and_then(|h| h.get(field))
            .cloned())
    }

    fn hset(&self, key: &str, field: &str, value: Value) -> StoreResult<()> {
        self.lock()?
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    fn hset_nx(&self, key: &str, field: &str, value: Value) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        let hash = inner.hashes.entry(key.to_string()).or_default();
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value);
        Ok(true)
    }

    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        Ok(inner
            .hashes
            .get_mut(key)
            .map(|h| h.remove(field).is_some())
            .unwrap_or(false))
    }

    fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, Value)>> {
        Ok(self
            .lock()?
            .hashes
            .get(key)
            .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_keys() {
        let store = MemoryStore::new();

        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", json!([1, 2])).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(json!([1, 2])));

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
    }

    #[test]
    fn test_compare_and_set() {
        let store = MemoryStore::new();

        // Absent key only matches None
        assert!(!store.compare_and_set("k", Some(&json!(1)), json!(2)).unwrap());
        assert!(store.compare_and_set("k", None, json!(1)).unwrap());

        // Stale expectation loses
        assert!(!store.compare_and_set("k", None, json!(5)).unwrap());
        assert!(store.compare_and_set("k", Some(&json!(1)), json!(2)).unwrap());
        assert_eq!(store.get("k").unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_keys_by_prefix() {
        let store = MemoryStore::new();
        store.set("vote_event:b", json!(1)).unwrap();
        store.set("vote_event:a", json!(1)).unwrap();
        store.set("other", json!(1)).unwrap();

        assert_eq!(
            store.keys("vote_event:").unwrap(),
            vec!["vote_event:a".to_string(), "vote_event:b".to_string()]
        );
    }

    #[test]
    fn test_hash_operations() {
        let store = MemoryStore::new();

        store.hset("h", "x", json!({"n": 1})).unwrap();
        assert!(!store.hset_nx("h", "x", json!({"n": 2})).unwrap());
        assert!(store.hset_nx("h", "y", json!({"n": 3})).unwrap());

        assert_eq!(store.hget("h", "x").unwrap(), Some(json!({"n": 1})));
        assert_eq!(store.hgetall("h").unwrap().len(), 2);

        assert!(store.hdel("h", "x").unwrap());
        assert!(!store.hdel("h", "x").unwrap());
        assert!(!store.hdel("missing", "x").unwrap());
        assert!(store.hgetall("missing").unwrap().is_empty());
    }
}
