//! Reaction to a single content-created event.
//!
//! 1. Load the agent setting.  Absent, unreadable or undecodable means
//!    disabled.
//! 2. Delete the recent-summary cache key.  Best effort: a failure is logged
//!    and otherwise ignored.
//! 3. If enabled and the event carries content, run one engine cycle.
//!
//! The outcome is reported in a [`HandleReport`]; persona-update failures are
//! never propagated to the event source.

use std::fmt;
use std::sync::Arc;

use alterego_llm::AgentSetting;
use alterego_memory::{Dimension, Feature, KeyValueStore};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{EngineError, PersonaEngine};
use crate::events::Event;
use crate::settings::SettingsRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NoContent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "agent disabled",
            Self::NoContent => "event carries no content",
        })
    }
}

#[derive(Debug)]
pub enum PersonaUpdate {
    Updated {
        dimension: Dimension,
        features: Vec<Feature>,
    },
    Skipped(SkipReason),
    Failed(EngineError),
}

#[derive(Debug)]
pub struct HandleReport {
    pub cache_invalidated: bool,
    pub update: PersonaUpdate,
}

impl HandleReport {
    pub fn is_updated(&self) -> bool {
        matches!(self.update, PersonaUpdate::Updated { .. })
    }
}

pub struct AgentEventHandler {
    settings: SettingsRepository,
    store: Arc<dyn KeyValueStore>,
    cache_key: String,
    engine: Arc<PersonaEngine>,
}

impl AgentEventHandler {
    pub fn new(
        settings: SettingsRepository,
        store: Arc<dyn KeyValueStore>,
        cache_key: impl Into<String>,
        engine: Arc<PersonaEngine>,
    ) -> Self {
        Self {
            settings,
            store,
            cache_key: cache_key.into(),
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<PersonaEngine> {
        &self.engine
    }

    pub async fn handle(&self, event: &Event) -> HandleReport {
        self.process(event, None).await
    }

    /// Like [`handle`](Self::handle), forwarding raw model output chunks to `tx`.
    pub async fn handle_streaming(&self, event: &Event, tx: mpsc::Sender<String>) -> HandleReport {
        self.process(event, Some(tx)).await
    }

    async fn process(&self, event: &Event, stream: Option<mpsc::Sender<String>>) -> HandleReport {
        let setting = self.load_setting();
        let cache_invalidated = self.invalidate_cache();

        let update = match (setting, event.content()) {
            (None, _) => PersonaUpdate::Skipped(SkipReason::Disabled),
            (Some(_), None) => PersonaUpdate::Skipped(SkipReason::NoContent),
            (Some(_), Some(content)) if content.content.trim().is_empty() => {
                PersonaUpdate::Skipped(SkipReason::NoContent)
            }
            (Some(setting), Some(content)) => {
                let result = match stream {
                    Some(tx) => self.engine.evolve_streaming(&setting, &content.content, tx).await,
                    None => self.engine.evolve(&setting, &content.content).await,
                };
                match result {
                    Ok(evolution) => PersonaUpdate::Updated {
                        dimension: evolution.dimension,
                        features: evolution.features,
                    },
                    Err(err) => {
                        warn!(kind = err.kind(), error = %err, content_id = content.id, "persona update failed");
                        PersonaUpdate::Failed(err)
                    }
                }
            }
        };

        if let PersonaUpdate::Skipped(reason) = &update {
            debug!(topic = %event.topic, %reason, "persona update skipped");
        }
        HandleReport {
            cache_invalidated,
            update,
        }
    }

    /// Enabled setting, or `None` for every other outcome.
    fn load_setting(&self) -> Option<AgentSetting> {
        match self.settings.load() {
            Ok(Some(setting)) if setting.enable => Some(setting),
            Ok(_) => None,
            Err(err) => {
                warn!(key = %self.settings.key(), error = %err, "agent setting unreadable, treating as disabled");
                None
            }
        }
    }

    fn invalidate_cache(&self) -> bool {
        match self.store.delete(&self.cache_key) {
            Ok(existed) => {
                if existed {
                    info!(key = %self.cache_key, "recent summary cache invalidated");
                }
                true
            }
            Err(err) => {
                warn!(key = %self.cache_key, error = %err, "failed to invalidate recent summary cache");
                false
            }
        }
    }
}
