//! Content items that drive persona updates and recent-activity summaries.

use std::sync::{Arc, RwLock};

use alterego_memory::{KeyValueStore, StoreError};
use serde::{Deserialize, Serialize};

/// Oldest items are dropped once a [`KvContentStore`] log grows past this.
pub const CONTENT_LOG_CAP: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default)]
    pub id: u64,
    pub content: String,
    #[serde(default)]
    pub created_at: i64,
}

pub trait ContentStore: Send + Sync {
    /// Record new content and return it with its assigned id.
    fn append(&self, text: &str, created_at: i64) -> Result<Content, StoreError>;

    /// Up to `limit` items, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<Content>, StoreError>;
}

fn newest_first(items: &[Content], limit: usize) -> Vec<Content> {
    items.iter().rev().take(limit).cloned().collect()
}

fn next_id(items: &[Content]) -> u64 {
    items.last().map_or(1, |c| c.id + 1)
}

// ── in-memory ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    items: RwLock<Vec<Content>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for InMemoryContentStore {
    fn append(&self, text: &str, created_at: i64) -> Result<Content, StoreError> {
        let mut items = self.items.write().map_err(StoreError::backend)?;
        let content = Content {
            id: next_id(&items),
            content: text.to_string(),
            created_at,
        };
        items.push(content.clone());
        Ok(content)
    }

    fn recent(&self, limit: usize) -> Result<Vec<Content>, StoreError> {
        let items = self.items.read().map_err(StoreError::backend)?;
        Ok(newest_first(&items, limit))
    }
}

// ── key-value backed ──────────────────────────────────────────────────────────

/// A capped JSON log kept under one key, so content survives between CLI runs.
pub struct KvContentStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl KvContentStore {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    fn read_log(&self) -> Result<Vec<Content>, StoreError> {
        match self.store.get(&self.key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }
}

impl ContentStore for KvContentStore {
    fn append(&self, text: &str, created_at: i64) -> Result<Content, StoreError> {
        let mut log = self.read_log()?;
        let content = Content {
            id: next_id(&log),
            content: text.to_string(),
            created_at,
        };
        log.push(content.clone());
        if log.len() > CONTENT_LOG_CAP {
            log.drain(..log.len() - CONTENT_LOG_CAP);
        }
        self.store.set(&self.key, &serde_json::to_string(&log)?)?;
        Ok(content)
    }

    fn recent(&self, limit: usize) -> Result<Vec<Content>, StoreError> {
        Ok(newest_first(&self.read_log()?, limit))
    }
}
