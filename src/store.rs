use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::error;

use crate::config::StorageBackend;
use crate::error::StoreError;

pub const SCHEMA_VERSION: u32 = 1;

/// Raw string storage addressed by logical key
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Read a typed record. Values are stored as `{"version":N,"data":...}`; a
/// bare payload written before the envelope existed is accepted as-is.
pub fn read_record<T: DeserializeOwned>(
    store: &impl KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(&raw)?;

    let payload = match value {
        Value::Object(mut map) if map.len() == 2 && map.contains_key("version") && map.contains_key("data") => {
            let found = map
                .get("version")
                .and_then(Value::as_u64)
                .unwrap_or(u64::MAX);
            if found != SCHEMA_VERSION as u64 {
                return Err(StoreError::UnsupportedVersion {
                    key: key.to_string(),
                    found: u32::try_from(found).unwrap_or(u32::MAX),
                });
            }
            map.remove("data").unwrap_or(Value::Null)
        }
        bare => bare,
    };

    Ok(Some(serde_json::from_value(payload)?))
}

pub fn write_record<T: Serialize>(
    store: &mut impl KeyValueStore,
    key: &str,
    record: &T,
) -> Result<(), StoreError> {
    let envelope = serde_json::json!({
        "version": SCHEMA_VERSION,
        "data": record,
    });
    store.set(key, &serde_json::to_string(&envelope)?)
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        // rename last so readers never see a partial file
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Single-table SQLite backend
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

/// Open the configured backend rooted at `dir`. A backend that cannot be
/// opened degrades to in-memory storage for this run.
pub fn open_backend(backend: StorageBackend, dir: &Path) -> Box<dyn KeyValueStore> {
    match backend {
        StorageBackend::Json => Box::new(FileStore::new(dir)),
        StorageBackend::Sqlite => match SqliteStore::open(dir.join("progress.db")) {
            Ok(store) => Box::new(store),
            Err(e) => {
                error!("storage unavailable ({e}), progress will not be saved");
                Box::new(MemoryStore::new())
            }
        },
        StorageBackend::Memory => Box::new(MemoryStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    fn exercise(store: &mut impl KeyValueStore) {
        assert_eq!(store.get("missing").unwrap(), None);
        store.set("greeting", "hello").unwrap();
        store.set("greeting", "hi").unwrap();
        assert_eq!(store.get("greeting").unwrap().as_deref(), Some("hi"));
        store.remove("greeting").unwrap();
        store.remove("greeting").unwrap();
        assert_eq!(store.get("greeting").unwrap(), None);
    }

    #[test]
    fn memory_store_basics() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn file_store_basics() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested"));
        exercise(&mut store);
    }

    #[test]
    fn sqlite_store_basics() {
        exercise(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_store_persists_across_connections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.set("wordleStats", "{}").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("wordleStats").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn records_are_wrapped_in_versioned_envelope() {
        let mut store = MemoryStore::new();
        write_record(&mut store, "numbers", &vec![1, 2, 3]).unwrap();
        let raw: Value = serde_json::from_str(&store.get("numbers").unwrap().unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"version": 1, "data": [1, 2, 3]}));

        let back: Option<Vec<i32>> = read_record(&store, "numbers").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
    }

    #[test]
    fn bare_legacy_payload_is_accepted() {
        let mut store = MemoryStore::new();
        store.set("numbers", "[4,5]").unwrap();
        let back: Option<Vec<i32>> = read_record(&store, "numbers").unwrap();
        assert_eq!(back, Some(vec![4, 5]));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut store = MemoryStore::new();
        store.set("numbers", r#"{"version": 2, "data": [1]}"#).unwrap();
        assert_matches!(
            read_record::<Vec<i32>>(&store, "numbers"),
            Err(StoreError::UnsupportedVersion { found: 2, .. })
        );
    }

    #[test]
    fn open_backend_json_writes_files() {
        let dir = tempdir().unwrap();
        let mut store = open_backend(StorageBackend::Json, dir.path());
        write_record(&mut store, "wordleStats", &0u32).unwrap();
        assert!(dir.path().join("wordleStats.json").exists());
    }

    #[test]
    fn corrupt_json_is_an_error() {
        let mut store = MemoryStore::new();
        store.set("numbers", "{not json").unwrap();
        assert_matches!(read_record::<Vec<i32>>(&store, "numbers"), Err(StoreError::Json(_)));
    }
}
