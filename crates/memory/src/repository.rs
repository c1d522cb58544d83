use std::sync::Arc;

use tracing::debug;

use crate::persona::Persona;
use crate::store::{KeyValueStore, StoreError};

/// Reads and writes the singleton persona as JSON under one key.
#[derive(Clone)]
pub struct PersonaRepository {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl PersonaRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `Ok(None)` when no persona has been written yet.  A value that exists
    /// but fails to decode is an error, so callers never overwrite it blindly.
    pub fn load(&self) -> Result<Option<Persona>, StoreError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        let persona = serde_json::from_str(&raw)?;
        Ok(Some(persona))
    }

    /// Write the full persona, replacing whatever was stored.
    pub fn save(&self, persona: &Persona) -> Result<(), StoreError> {
        let raw = serde_json::to_string(persona)?;
        self.store.set(&self.key, &raw)?;
        debug!(key = %self.key, updated_at = persona.updated_at, "persona saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alterego_config::PersonaConfig;

    use super::*;
    use crate::persona::{Dimension, Feature};
    use crate::store::MemoryStore;

    fn repo() -> (Arc<MemoryStore>, PersonaRepository) {
        let store = Arc::new(MemoryStore::new());
        let repo = PersonaRepository::new(store.clone(), "persona");
        (store, repo)
    }

    #[test]
    fn missing_persona_loads_as_none() {
        let (_, repo) = repo();
        assert!(repo.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_, repo) = repo();
        let mut persona = Persona::bootstrap(&PersonaConfig::default(), 10);
        persona.apply_update(Dimension::Topics, vec![Feature::new("编程", 0.9)], 20);
        repo.save(&persona).unwrap();
        assert_eq!(repo.load().unwrap(), Some(persona));
    }

    #[test]
    fn corrupt_value_is_an_error_not_none() {
        let (store, repo) = repo();
        store.set("persona", "{not json").unwrap();
        assert!(matches!(repo.load(), Err(StoreError::Codec(_))));
    }

    #[test]
    fn writes_under_configured_key() {
        let (store, repo) = repo();
        repo.save(&Persona::bootstrap(&PersonaConfig::default(), 1))
            .unwrap();
        assert_eq!(repo.key(), "persona");
        let raw = store.get("persona").unwrap().unwrap();
        assert!(raw.contains("\"createdAt\":1"));
    }
}
