//! Wiring from [`AppConfig`] to a ready-to-use set of components.

use std::sync::Arc;

use alterego_config::AppConfig;
use alterego_llm::{GenerationRouter, Provider};
use alterego_memory::{KeyValueStore, PersonaRepository, RedbStore, StoreError, selector_from_config};
use tracing::info;

use crate::content::{ContentStore, KvContentStore};
use crate::engine::PersonaEngine;
use crate::handler::AgentEventHandler;
use crate::settings::SettingsRepository;
use crate::summary::RecentSummarizer;

pub struct Services {
    pub store: Arc<dyn KeyValueStore>,
    pub settings: SettingsRepository,
    pub content: Arc<dyn ContentStore>,
    pub engine: Arc<PersonaEngine>,
    pub handler: Arc<AgentEventHandler>,
    pub summarizer: RecentSummarizer,
}

impl Services {
    /// Open the redb store named by `config.store.path` and wire everything to it.
    pub fn open(config: &AppConfig) -> Result<Self, StoreError> {
        let store = RedbStore::open(&config.store.path)?;
        info!(path = %store.path().display(), "store ready");
        Ok(Self::with_store(config, Arc::new(store)))
    }

    pub fn with_store(config: &AppConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_router(config, store, router_from_config(config))
    }

    pub fn with_router(
        config: &AppConfig,
        store: Arc<dyn KeyValueStore>,
        router: GenerationRouter,
    ) -> Self {
        let router = Arc::new(router);
        let keys = &config.keys;
        let settings = SettingsRepository::new(store.clone(), &keys.agent_setting);
        let content: Arc<dyn ContentStore> =
            Arc::new(KvContentStore::new(store.clone(), &keys.content));

        let engine = Arc::new(PersonaEngine::new(
            PersonaRepository::new(store.clone(), &keys.persona),
            Arc::from(selector_from_config(&config.persona)),
            router.clone(),
            config.persona.clone(),
        ));
        let handler = Arc::new(AgentEventHandler::new(
            settings.clone(),
            store.clone(),
            &keys.recent_cache,
            engine.clone(),
        ));
        let summarizer = RecentSummarizer::new(
            settings.clone(),
            content.clone(),
            store.clone(),
            router,
            &keys.recent_cache,
            config.summary.clone(),
        );

        Self {
            store,
            settings,
            content,
            engine,
            handler,
            summarizer,
        }
    }
}

pub fn router_from_config(config: &AppConfig) -> GenerationRouter {
    GenerationRouter::new(config.request_timeout())
        .with_default_base_url(Provider::Ollama, config.llm.ollama_base_url.clone())
}
