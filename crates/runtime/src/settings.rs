use std::sync::Arc;

use alterego_llm::AgentSetting;
use alterego_memory::{KeyValueStore, StoreError};

/// The [`AgentSetting`] record stored as JSON under one key.
#[derive(Clone)]
pub struct SettingsRepository {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load(&self) -> Result<Option<AgentSetting>, StoreError> {
        match self.store.get(&self.key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, setting: &AgentSetting) -> Result<(), StoreError> {
        let raw = serde_json::to_string(setting)?;
        self.store.set(&self.key, &raw)
    }
}
