// 💾 SQLite-backed key-value store
// Durable single-file store: WAL mode, one table for plain keys and one for
// hash fields. Values are stored as JSON text.

use crate::error::StoreError;
use crate::store::{KeyValueStore, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How long a write waits on another process holding the file lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store file and make sure the schema exists
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        setup_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn setup_schema(conn: &Connection) -> StoreResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_hash (
            key TEXT NOT NULL,
            field TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (key, field)
        )",
        [],
    )?;

    Ok(())
}

/// Stored text that is not valid JSON comes back as a JSON string, so the
/// codec layer decides what to do with it.
fn parse_stored(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let conn = self.lock()?;
        let text: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(text.map(parse_stored))
    }

    fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let text = serde_json::to_string(&value)?;
        self.lock()?.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, text],
        )?;
        Ok(())
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&Value>,
        value: Value,
    ) -> StoreResult<bool> {
        let text = serde_json::to_string(&value)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current: Option<String> = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        let current = current.map(parse_stored);

        if current.as_ref() != expected {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, text],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let changed = self.lock()?.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(changed > 0)
    }

    fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let keys = stmt
            .query_map([prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn hget(&self, key: &str, field: &str) -> StoreResult<Option<Value>> {
        let conn = self.lock()?;
        let text: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_hash WHERE key = ?1 AND field = ?2",
                params![key, field],
                |row| row.get(0),
            )
            .optional()?;
        Ok(text.map(parse_stored))
    }

    fn hset(&self, key: &str, field: &str, value: Value) -> StoreResult<()> {
        let text = serde_json::to_string(&value)?;
        self.lock()?.execute(
            "INSERT INTO kv_hash (key, field, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
            params![key, field, text],
        )?;
        Ok(())
    }

    fn hset_nx(&self, key: &str, field: &str, value: Value) -> StoreResult<bool> {
        let text = serde_json::to_string(&value)?;
        let changed = self.lock()?.execute(
            "INSERT OR IGNORE INTO kv_hash (key, field, value) VALUES (?1, ?2, ?3)",
            params![key, field, text],
        )?;
        Ok(changed > 0)
    }

    fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        let changed = self.lock()?.execute(
            "DELETE FROM kv_hash WHERE key = ?1 AND field = ?2",
            params![key, field],
        )?;
        Ok(changed > 0)
    }

    fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, Value)>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT field, value FROM kv_hash WHERE key = ?1 ORDER BY field")?;
        let rows = stmt
            .query_map([key], |row| {
                let field: String = row.get(0)?;
                let text: String = row.get(1)?;
                Ok((field, parse_stored(text)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.set("vote_stats", json!([{"entryId": "E1", "votes": 2}])).unwrap();
        assert_eq!(
            store.get("vote_stats").unwrap(),
            Some(json!([{"entryId": "E1", "votes": 2}]))
        );

        // Overwrite
        store.set("vote_stats", json!([])).unwrap();
        assert_eq!(store.get("vote_stats").unwrap(), Some(json!([])));

        assert!(store.delete("vote_stats").unwrap());
        assert_eq!(store.get("vote_stats").unwrap(), None);
    }

    #[test]
    fn test_waits_on_locked_database() {
        let store = SqliteStore::open_in_memory().unwrap();
        let timeout: i64 = store
            .lock()
            .unwrap()
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();

        assert_eq!(timeout, 5000);
    }

    #[test]
    fn test_non_json_text_comes_back_as_string() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute("INSERT INTO kv (key, value) VALUES ('raw', 'not json')", [])
            .unwrap();

        assert_eq!(store.get("raw").unwrap(), Some(json!("not json")));
    }

    #[test]
    fn test_compare_and_set() {
        let store = SqliteStore::open_in_memory().unwrap();

        assert!(store.compare_and_set("k", None, json!([1])).unwrap());
        assert!(!store.compare_and_set("k", None, json!([2])).unwrap());
        assert!(!store.compare_and_set("k", Some(&json!([9])), json!([2])).unwrap());
        assert!(store.compare_and_set("k", Some(&json!([1])), json!([2])).unwrap());

        assert_eq!(store.get("k").unwrap(), Some(json!([2])));
    }

    #[test]
    fn test_keys_by_prefix() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("vote_event:v1:b", json!({})).unwrap();
        store.set("vote_event:v1:a", json!({})).unwrap();
        store.set("vote_event:v2:a", json!({})).unwrap();
        store.set("vote_stats", json!([])).unwrap();

        assert_eq!(
            store.keys("vote_event:v1:").unwrap(),
            vec!["vote_event:v1:a".to_string(), "vote_event:v1:b".to_string()]
        );
        // LIKE wildcards in the prefix are matched literally
        assert!(store.keys("vote_%").unwrap().is_empty());
    }

    #[test]
    fn test_hash_operations() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.hset("pending_votes", "bob_1", json!({"id": "bob_1"})).unwrap();
        assert!(!store.hset_nx("pending_votes", "bob_1", json!({})).unwrap());
        assert!(store.hset_nx("voters", "bob", json!("bob_1")).unwrap());

        assert_eq!(
            store.hget("pending_votes", "bob_1").unwrap(),
            Some(json!({"id": "bob_1"}))
        );
        assert_eq!(store.hgetall("pending_votes").unwrap().len(), 1);

        assert!(store.hdel("pending_votes", "bob_1").unwrap());
        assert!(!store.hdel("pending_votes", "bob_1").unwrap());
        assert!(store.hgetall("pending_votes").unwrap().is_empty());
    }
}
