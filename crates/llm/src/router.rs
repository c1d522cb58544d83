use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{AgentSetting, BackendConfig, ChatBackend, ChatMessage, LlmError, Provider};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Dispatches generation requests to the provider named in an
/// [`AgentSetting`].
///
/// The router validates the setting, resolves client parameters, and calls
/// the provider's backend exactly once under a deadline.  It never retries
/// and keeps no state between calls.
#[derive(Clone)]
pub struct GenerationRouter {
    backends: HashMap<Provider, Arc<dyn ChatBackend>>,
    base_urls: HashMap<Provider, String>,
    timeout: Duration,
}

impl Default for GenerationRouter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl fmt::Debug for GenerationRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers = self.backends.keys().map(|p| p.as_str()).collect::<Vec<_>>();
        providers.sort_unstable();
        f.debug_struct("GenerationRouter")
            .field("providers", &providers)
            .field("base_urls", &self.base_urls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GenerationRouter {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::new();
        let backends = Provider::ALL
            .into_iter()
            .map(|provider| (provider, provider.backend(http.clone())))
            .collect();
        Self {
            backends,
            base_urls: HashMap::new(),
            timeout,
        }
    }

    /// Replace the backend used for `provider`.
    pub fn with_backend(mut self, provider: Provider, backend: Arc<dyn ChatBackend>) -> Self {
        self.backends.insert(provider, backend);
        self
    }

    /// Override the default endpoint used when a setting has no `baseURL`.
    pub fn with_default_base_url(mut self, provider: Provider, url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, url.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate `setting` and resolve the provider plus client parameters.
    ///
    /// Checks run in a fixed order so the first problem reported is stable:
    /// enabled, model, provider name, credential, then provider lookup.
    pub fn resolve(&self, setting: &AgentSetting) -> Result<(Provider, BackendConfig), LlmError> {
        if !setting.enable {
            return Err(LlmError::AgentDisabled);
        }
        if setting.model.trim().is_empty() {
            return Err(LlmError::ModelMissing);
        }
        if setting.provider.trim().is_empty() {
            return Err(LlmError::ProviderNotConfigured);
        }
        if setting.api_key.trim().is_empty() {
            return Err(LlmError::CredentialMissing);
        }
        let provider = Provider::parse(&setting.provider)
            .ok_or_else(|| LlmError::ProviderNotFound(setting.provider.clone()))?;

        let base_url = if setting.base_url.trim().is_empty() {
            self.base_urls
                .get(&provider)
                .cloned()
                .unwrap_or_else(|| provider.default_base_url().to_string())
        } else {
            setting.base_url.trim().to_string()
        };

        Ok((
            provider,
            BackendConfig {
                api_key: setting.api_key.clone(),
                model: setting.model.clone(),
                base_url,
            },
        ))
    }

    /// Single-prompt generation (feature extraction).
    pub async fn generate(&self, setting: &AgentSetting, prompt: &str) -> Result<String, LlmError> {
        self.generate_messages(setting, &[ChatMessage::user(prompt)]).await
    }

    /// Multi-message generation (summaries over message history).
    pub async fn generate_messages(
        &self,
        setting: &AgentSetting,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let (provider, config) = self.resolve(setting)?;
        let backend = self.backend_for(provider)?;
        debug!(%provider, model = %config.model, messages = messages.len(), "dispatching generation");
        self.with_deadline(provider, backend.generate(&config, messages))
            .await
    }

    /// Streaming single-prompt generation.  Chunks go to `tx`; the full text
    /// is returned once the provider finishes.
    pub async fn generate_stream(
        &self,
        setting: &AgentSetting,
        prompt: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String, LlmError> {
        let (provider, config) = self.resolve(setting)?;
        let backend = self.backend_for(provider)?;
        let messages = [ChatMessage::user(prompt)];
        debug!(%provider, model = %config.model, "dispatching streaming generation");
        self.with_deadline(provider, backend.generate_stream(&config, &messages, tx))
            .await
    }

    fn backend_for(&self, provider: Provider) -> Result<&Arc<dyn ChatBackend>, LlmError> {
        self.backends
            .get(&provider)
            .ok_or_else(|| LlmError::ProviderNotFound(provider.to_string()))
    }

    async fn with_deadline<F>(&self, provider: Provider, call: F) -> Result<String, LlmError>
    where
        F: Future<Output = Result<String, LlmError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%provider, timeout = ?self.timeout, "generation deadline exceeded");
                Err(LlmError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct RecordingBackend {
        calls: AtomicUsize,
        seen: Mutex<Vec<(BackendConfig, Vec<ChatMessage>)>>,
        reply: String,
    }

    impl RecordingBackend {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl ChatBackend for RecordingBackend {
        async fn generate(
            &self,
            config: &BackendConfig,
            messages: &[ChatMessage],
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((config.clone(), messages.to_vec()));
            Ok(self.reply.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl ChatBackend for FailingBackend {
        async fn generate(&self, _: &BackendConfig, _: &[ChatMessage]) -> Result<String, LlmError> {
            Err(LlmError::Backend("qwen error (429): rate limited".into()))
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl ChatBackend for SlowBackend {
        async fn generate(&self, _: &BackendConfig, _: &[ChatMessage]) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    fn setting(provider: &str) -> AgentSetting {
        AgentSetting {
            enable: true,
            provider: provider.to_string(),
            model: "x".to_string(),
            api_key: "k".to_string(),
            base_url: String::new(),
        }
    }

    fn router_with_all(backend: Arc<dyn ChatBackend>) -> GenerationRouter {
        Provider::ALL
            .into_iter()
            .fold(GenerationRouter::default(), |router, provider| {
                router.with_backend(provider, backend.clone())
            })
    }

    #[test]
    fn validation_order_is_fixed() {
        let router = GenerationRouter::default();

        let disabled = AgentSetting::default();
        assert!(matches!(router.resolve(&disabled), Err(LlmError::AgentDisabled)));

        let mut s = AgentSetting {
            enable: true,
            ..Default::default()
        };
        assert!(matches!(router.resolve(&s), Err(LlmError::ModelMissing)));

        s.model = "m".into();
        assert!(matches!(router.resolve(&s), Err(LlmError::ProviderNotConfigured)));

        s.provider = "openai".into();
        assert!(matches!(router.resolve(&s), Err(LlmError::CredentialMissing)));

        s.api_key = "k".into();
        assert!(router.resolve(&s).is_ok());
    }

    #[test]
    fn unknown_provider_checked_after_credential() {
        let router = GenerationRouter::default();
        let mut s = setting("unknown-llm");
        s.api_key.clear();
        assert!(matches!(router.resolve(&s), Err(LlmError::CredentialMissing)));
    }

    #[tokio::test]
    async fn unknown_provider_makes_no_call() {
        let backend = RecordingBackend::replying("never");
        let router = router_with_all(backend.clone());

        let err = router.generate(&setting("unknown-llm"), "p").await.unwrap_err();
        assert!(matches!(err, LlmError::ProviderNotFound(ref name) if name == "unknown-llm"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disabled_setting_makes_no_call() {
        let backend = RecordingBackend::replying("never");
        let router = router_with_all(backend.clone());
        let mut s = setting("openai");
        s.enable = false;

        assert!(matches!(
            router.generate(&s, "p").await,
            Err(LlmError::AgentDisabled)
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_prompt_becomes_one_user_message() {
        let backend = RecordingBackend::replying("[]");
        let router = GenerationRouter::default().with_backend(Provider::OpenAi, backend.clone());

        let out = router.generate(&setting("openai-compatible"), "hello").await.unwrap();
        assert_eq!(out, "[]");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, vec![ChatMessage::user("hello")]);
        assert_eq!(seen[0].0.base_url, Provider::OpenAi.default_base_url());
    }

    #[tokio::test]
    async fn setting_base_url_wins_over_defaults() {
        let backend = RecordingBackend::replying("ok");
        let router = GenerationRouter::default()
            .with_default_base_url(Provider::Custom, "http://fallback")
            .with_backend(Provider::Custom, backend.clone());

        let mut s = setting("custom");
        s.base_url = " https://my-proxy.local/v1 ".into();
        router.generate(&s, "p").await.unwrap();
        s.base_url.clear();
        router.generate(&s, "p").await.unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].0.base_url, "https://my-proxy.local/v1");
        assert_eq!(seen[1].0.base_url, "http://fallback");
    }

    #[tokio::test]
    async fn message_history_is_forwarded_intact() {
        let backend = RecordingBackend::replying("summary");
        let router = GenerationRouter::default().with_backend(Provider::Gemini, backend.clone());
        let history = vec![
            ChatMessage::system("s"),
            ChatMessage::user("u"),
            ChatMessage::assistant("a1"),
            ChatMessage::assistant("a2"),
        ];

        let out = router.generate_messages(&setting("gemini"), &history).await.unwrap();
        assert_eq!(out, "summary");
        assert_eq!(backend.seen.lock().unwrap()[0].1, history);
    }

    #[tokio::test]
    async fn backend_errors_surface_verbatim() {
        let router = GenerationRouter::default().with_backend(Provider::Qwen, Arc::new(FailingBackend));
        let err = router.generate(&setting("qwen"), "p").await.unwrap_err();
        assert_eq!(err.to_string(), "qwen error (429): rate limited");
    }

    #[tokio::test]
    async fn deadline_maps_to_timeout() {
        let router = GenerationRouter::new(Duration::from_millis(20))
            .with_backend(Provider::DeepSeek, Arc::new(SlowBackend));
        let err = router.generate(&setting("deepseek"), "p").await.unwrap_err();
        assert!(err.is_timeout(), "got {err:?}");
    }

    #[tokio::test]
    async fn default_stream_sends_whole_text_once() {
        let backend = RecordingBackend::replying("chunk");
        let router = GenerationRouter::default().with_backend(Provider::Anthropic, backend);
        let (tx, mut rx) = mpsc::channel(4);

        let out = router.generate_stream(&setting("anthropic"), "p", tx).await.unwrap();
        assert_eq!(out, "chunk");
        assert_eq!(rx.recv().await.as_deref(), Some("chunk"));
        assert!(rx.recv().await.is_none());
    }
}
