//! Recent-activity summary, cached until the next content event.

use std::sync::Arc;

use alterego_config::SummaryConfig;
use alterego_llm::{ChatMessage, GenerationRouter, LlmError};
use alterego_memory::{KeyValueStore, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::content::ContentStore;
use crate::settings::SettingsRepository;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("agent setting not found")]
    SettingNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

pub struct RecentSummarizer {
    settings: SettingsRepository,
    content: Arc<dyn ContentStore>,
    store: Arc<dyn KeyValueStore>,
    router: Arc<GenerationRouter>,
    cache_key: String,
    config: SummaryConfig,
}

impl RecentSummarizer {
    pub fn new(
        settings: SettingsRepository,
        content: Arc<dyn ContentStore>,
        store: Arc<dyn KeyValueStore>,
        router: Arc<GenerationRouter>,
        cache_key: impl Into<String>,
        config: SummaryConfig,
    ) -> Self {
        Self {
            settings,
            content,
            store,
            router,
            cache_key: cache_key.into(),
            config,
        }
    }

    /// The conversation sent to the model: system and user instructions,
    /// then each recent item (newest first) as an assistant message.
    pub fn build_messages(&self) -> Result<Vec<ChatMessage>, SummaryError> {
        let items = self.content.recent(self.config.page_size)?;
        let mut messages = Vec::with_capacity(items.len() + 2);
        messages.push(ChatMessage::system(&self.config.system_prompt));
        messages.push(ChatMessage::user(&self.config.user_prompt));
        messages.extend(items.into_iter().map(|item| ChatMessage::assistant(item.content)));
        Ok(messages)
    }

    pub async fn recent_summary(&self) -> Result<String, SummaryError> {
        if let Some(cached) = self.store.get(&self.cache_key)? {
            debug!(key = %self.cache_key, "recent summary served from cache");
            return Ok(cached);
        }

        let setting = self.settings.load()?.ok_or(SummaryError::SettingNotFound)?;
        let messages = self.build_messages()?;
        let summary = self.router.generate_messages(&setting, &messages).await?;

        if let Err(err) = self.store.set(&self.cache_key, &summary) {
            warn!(key = %self.cache_key, error = %err, "failed to cache recent summary");
        }
        info!(items = messages.len() - 2, chars = summary.chars().count(), "recent summary generated");
        Ok(summary)
    }
}
