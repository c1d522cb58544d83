//! Durable single-key storage for settings, persona state and cache markers.
//!
//! # Tables
//!
//! | Name | Key        | Value                         |
//! |------|------------|-------------------------------|
//! | `kv` | key (&str) | UTF-8 value, usually JSON     |

use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use redb::{Database, ReadableTable, TableDefinition, TableError};
use thiserror::Error;
use tracing::debug;

const KV_TABLE: TableDefinition<&str, &str> = TableDefinition::new("kv");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value store: {0}")]
    Backend(String),
    #[error("stored value is not valid JSON: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    pub fn backend(err: impl Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Minimal key-value contract the engine needs from its host.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

// ── redb ──────────────────────────────────────────────────────────────────────

pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Open or create the redb file at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StoreError::backend)?;
            }
        }
        let db = Database::create(&path).map_err(|err| {
            StoreError::Backend(format!("opening redb store at {}: {err}", path.display()))
        })?;

        // Ensure the table exists so reads never race a first write.
        {
            let tx = db.begin_write().map_err(StoreError::backend)?;
            tx.open_table(KV_TABLE).map_err(StoreError::backend)?;
            tx.commit().map_err(StoreError::backend)?;
        }

        debug!(path = %path.display(), "redb store opened");
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let tx = self.db.begin_read().map_err(StoreError::backend)?;
        let table = match tx.open_table(KV_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(StoreError::backend(err)),
        };
        let value = table
            .get(key)
            .map_err(StoreError::backend)?
            .map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let tx = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut table = tx.open_table(KV_TABLE).map_err(StoreError::backend)?;
            table.insert(key, value).map_err(StoreError::backend)?;
        }
        tx.commit().map_err(StoreError::backend)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let tx = self.db.begin_write().map_err(StoreError::backend)?;
        let existed = {
            let mut table = tx.open_table(KV_TABLE).map_err(StoreError::backend)?;
            let removed = table.remove(key).map_err(StoreError::backend)?;
            removed.is_some()
        };
        tx.commit().map_err(StoreError::backend)?;
        Ok(existed)
    }
}

// ── in-memory ─────────────────────────────────────────────────────────────────

/// Process-local store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().map_err(StoreError::backend)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(StoreError::backend)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(StoreError::backend)?;
        Ok(entries.remove(key).is_some())
    }
}
