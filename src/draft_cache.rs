use crate::error::CacheError;
use crate::record::InvoiceRecord;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Snapshot saved explicitly by the user.
pub const DRAFT_KEY: &str = "draft";
/// Snapshot written after every successful extraction.
pub const LAST_EXTRACTION_KEY: &str = "lastExtraction";

/// A string-keyed store of string payloads, in the shape of browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Durable snapshots in a SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the snapshot database
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, CacheError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Unavailable(format!("{}: {e}", parent.display())))?;
        }

        let conn = Connection::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        info!(path = %db_path.display(), "Draft store initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let payload = self
            .conn()
            .query_row(
                "SELECT payload FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.conn().execute(
            "INSERT INTO snapshots (key, payload)
             VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.conn()
            .execute("DELETE FROM snapshots WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Process-local snapshots; gone when the session ends.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Best-effort cache of form snapshots.
///
/// Every operation reports failure through [`CacheError`] so the caller can
/// log it; no caller is expected to act on it. The cache is never the
/// source of truth.
pub struct DraftCache {
    store: Box<dyn KeyValueStore>,
}

impl DraftCache {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, key: &str, record: &InvoiceRecord) -> Result<(), CacheError> {
        let payload = serde_json::to_string(record)?;
        self.store.set(key, &payload)?;
        debug!(key, bytes = payload.len(), "Snapshot saved");
        Ok(())
    }

    /// `Ok(None)` when nothing is stored under `key`.
    pub fn load(&self, key: &str) -> Result<Option<InvoiceRecord>, CacheError> {
        let Some(payload) = self.store.get(key)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&payload)?))
    }

    pub fn clear(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(key)?;
        debug!(key, "Snapshot cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> InvoiceRecord {
        InvoiceRecord {
            file_name: Some("factuur-0042.pdf".into()),
            supplier: "Acme BV".into(),
            invoice_date: "2025-06-30".into(),
            invoice_amount: "121.00".into(),
            btw_amount: "21.00".into(),
            btw_number: "NL123456789B01".into(),
            kvk: "12345678".into(),
            notes: "office chairs".into(),
        }
    }

    #[test]
    fn test_round_trip() {
        let cache = DraftCache::new(Box::new(MemoryStore::new()));
        cache.save(DRAFT_KEY, &sample()).unwrap();
        assert_eq!(cache.load(DRAFT_KEY).unwrap(), Some(sample()));
    }

    #[test]
    fn test_missing_key_is_absent() {
        let cache = DraftCache::new(Box::new(MemoryStore::new()));
        assert_eq!(cache.load("missingKey").unwrap(), None);
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = DraftCache::new(Box::new(MemoryStore::new()));
        let mut other = sample();
        other.supplier = "Other BV".into();

        cache.save(DRAFT_KEY, &sample()).unwrap();
        cache.save(LAST_EXTRACTION_KEY, &other).unwrap();
        cache.clear(LAST_EXTRACTION_KEY).unwrap();
        cache.clear(LAST_EXTRACTION_KEY).unwrap();

        assert_eq!(cache.load(LAST_EXTRACTION_KEY).unwrap(), None);
        assert_eq!(cache.load(DRAFT_KEY).unwrap(), Some(sample()));
    }

    #[test]
    fn test_later_write_wins() {
        let cache = DraftCache::new(Box::new(MemoryStore::new()));
        let mut newer = sample();
        newer.notes = "second".into();

        cache.save(DRAFT_KEY, &sample()).unwrap();
        cache.save(DRAFT_KEY, &newer).unwrap();
        assert_eq!(cache.load(DRAFT_KEY).unwrap(), Some(newer));
    }

    #[test]
    fn test_corrupt_payload_is_an_error() {
        let store = MemoryStore::new();
        store.set(DRAFT_KEY, "{not json").unwrap();
        let cache = DraftCache::new(Box::new(store));

        assert!(matches!(cache.load(DRAFT_KEY), Err(CacheError::Corrupt(_))));
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("drafts.db");

        {
            let cache = DraftCache::new(Box::new(SqliteStore::open(&path).unwrap()));
            cache.save(DRAFT_KEY, &sample()).unwrap();
            cache.save(LAST_EXTRACTION_KEY, &sample()).unwrap();
            cache.clear(LAST_EXTRACTION_KEY).unwrap();
        }

        let cache = DraftCache::new(Box::new(SqliteStore::open(&path).unwrap()));
        assert_eq!(cache.load(DRAFT_KEY).unwrap(), Some(sample()));
        assert_eq!(cache.load(LAST_EXTRACTION_KEY).unwrap(), None);
    }

    #[test]
    fn test_sqlite_store_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("drafts.db")).unwrap();

        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
