//! One persona-evolution cycle: select, prompt, generate, repair, merge, save.

use std::sync::Arc;
use std::time::Duration;

use alterego_config::PersonaConfig;
use alterego_llm::{AgentSetting, GenerationRouter, LlmError, repair_json_array};
use alterego_memory::{
    Dimension, DimensionSelector, Feature, FeatureError, Persona, PersonaRepository, StoreError,
    validate_features,
};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::prompt_builder::{self, PromptError};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Setting rejected before dispatch.
    #[error("configuration: {0}")]
    Config(#[source] LlmError),
    /// Unknown provider name, or the backend's own error verbatim.
    #[error("provider: {0}")]
    Provider(#[source] LlmError),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("prompt: {0}")]
    Prompt(#[from] PromptError),
    #[error("model output is not a feature array: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("model output rejected: {0}")]
    InvalidFeature(#[from] FeatureError),
    #[error("saving persona: {0}")]
    Persistence(#[source] StoreError),
    #[error("loading persona: {0}")]
    Load(#[source] StoreError),
}

impl From<LlmError> for EngineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(after) => Self::Timeout(after),
            err if err.is_config() => Self::Config(err),
            err => Self::Provider(err),
        }
    }
}

impl EngineError {
    /// Short machine-friendly class name for logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Provider(_) => "provider",
            Self::Timeout(_) => "timeout",
            Self::Prompt(_) => "prompt",
            Self::Parse(_) | Self::InvalidFeature(_) => "parse",
            Self::Persistence(_) => "persistence",
            Self::Load(_) => "load",
        }
    }
}

// ── clock ─────────────────────────────────────────────────────────────────────

/// Source of Unix-second timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

// ── merge ─────────────────────────────────────────────────────────────────────

/// Repair, parse and validate `raw` model output, then return a copy of
/// `persona` with `dimension` replaced and `updated_at` set to `now`.
///
/// `persona` itself is never touched, so a failure anywhere leaves the
/// caller's state as it was.
pub fn merge_output(
    persona: &Persona,
    dimension: Dimension,
    raw: &str,
    now: i64,
) -> Result<(Persona, Vec<Feature>), EngineError> {
    let repaired = repair_json_array(raw);
    let features: Vec<Feature> = serde_json::from_str(repaired).map_err(EngineError::Parse)?;
    validate_features(&features)?;

    let mut next = persona.clone();
    next.apply_update(dimension, features.clone(), now);
    Ok((next, features))
}

// ── engine ────────────────────────────────────────────────────────────────────

/// Result of a committed cycle.
#[derive(Debug, Clone)]
pub struct Evolution {
    pub dimension: Dimension,
    pub features: Vec<Feature>,
    pub persona: Persona,
}

/// Runs persona-evolution cycles against one persona key.
///
/// Cycles through the same engine are serialised; separate engines (or
/// processes) writing the same key are last-writer-wins.
pub struct PersonaEngine {
    repo: PersonaRepository,
    selector: Arc<dyn DimensionSelector>,
    router: Arc<GenerationRouter>,
    defaults: PersonaConfig,
    clock: Arc<dyn Clock>,
    cycle: Mutex<()>,
}

impl PersonaEngine {
    pub fn new(
        repo: PersonaRepository,
        selector: Arc<dyn DimensionSelector>,
        router: Arc<GenerationRouter>,
        defaults: PersonaConfig,
    ) -> Self {
        Self {
            repo,
            selector,
            router,
            defaults,
            clock: Arc::new(SystemClock),
            cycle: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn repository(&self) -> &PersonaRepository {
        &self.repo
    }

    /// The stored persona, or a fresh bootstrap when none exists yet.
    /// Bootstrapping here does not write anything.
    pub fn load_or_bootstrap(&self) -> Result<Persona, EngineError> {
        match self.repo.load().map_err(EngineError::Load)? {
            Some(persona) => Ok(persona),
            None => {
                debug!(key = %self.repo.key(), "no persona stored, bootstrapping");
                Ok(Persona::bootstrap(&self.defaults, self.clock.now()))
            }
        }
    }

    /// Refresh one dimension of the persona from `content`.
    pub async fn evolve(
        &self,
        setting: &AgentSetting,
        content: &str,
    ) -> Result<Evolution, EngineError> {
        self.run_cycle(setting, content, None).await
    }

    /// Like [`evolve`](Self::evolve), forwarding raw model chunks to `tx` as
    /// they arrive.
    pub async fn evolve_streaming(
        &self,
        setting: &AgentSetting,
        content: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<Evolution, EngineError> {
        self.run_cycle(setting, content, Some(tx)).await
    }

    async fn run_cycle(
        &self,
        setting: &AgentSetting,
        content: &str,
        stream: Option<mpsc::Sender<String>>,
    ) -> Result<Evolution, EngineError> {
        let _guard = self.cycle.lock().await;

        let persona = self.load_or_bootstrap()?;
        let dimension = self.selector.select(&persona);
        let prompt = prompt_builder::render(dimension, persona.features(dimension), content)?;
        debug!(%dimension, selector = self.selector.name(), prompt_len = prompt.len(), "persona prompt rendered");

        let raw = match stream {
            Some(tx) => self.router.generate_stream(setting, &prompt, tx).await,
            None => self.router.generate(setting, &prompt).await,
        }
        .map_err(EngineError::from)?;

        let (next, features) = merge_output(&persona, dimension, &raw, self.clock.now())
            .inspect_err(|err| warn!(%dimension, error = %err, "discarding model output"))?;

        self.repo.save(&next).map_err(EngineError::Persistence)?;
        info!(%dimension, features = features.len(), updated_at = next.updated_at, "persona dimension refreshed");

        Ok(Evolution {
            dimension,
            features,
            persona: next,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    use alterego_llm::{BackendConfig, ChatBackend, ChatMessage, Provider};
    use alterego_memory::{KeyValueStore, MemoryStore};
    use async_trait::async_trait;

    use super::*;

    /// Returns a fixed reply and records every prompt it was sent.
    pub(crate) struct ScriptedBackend {
        reply: String,
        pub(crate) calls: AtomicUsize,
        pub(crate) prompts: StdMutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
                prompts: StdMutex::new(Vec::new()),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn generate(
            &self,
            _config: &BackendConfig,
            messages: &[ChatMessage],
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut prompts = self.prompts.lock().unwrap();
            prompts.extend(messages.iter().map(|m| m.content.clone()));
            Ok(self.reply.clone())
        }
    }

    pub(crate) struct StepClock(AtomicI64);

    impl StepClock {
        pub(crate) fn starting_at(t: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(t)))
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> i64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }
    }

    /// Always picks the same dimension.
    pub(crate) struct FixedSelector(pub(crate) Dimension);

    impl DimensionSelector for FixedSelector {
        fn select(&self, _persona: &Persona) -> Dimension {
            self.0
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    /// A store whose writes always fail.
    pub(crate) struct ReadOnlyStore(pub(crate) MemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.get(key)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        fn delete(&self, _key: &str) -> Result<bool, StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
    }

    pub(crate) fn enabled_setting() -> AgentSetting {
        AgentSetting {
            enable: true,
            provider: "openai-compatible".into(),
            model: "x".into(),
            api_key: "k".into(),
            base_url: String::new(),
        }
    }

    pub(crate) fn engine_with(
        store: Arc<dyn KeyValueStore>,
        backend: Arc<ScriptedBackend>,
        dimension: Dimension,
    ) -> PersonaEngine {
        let router = GenerationRouter::default().with_backend(Provider::OpenAi, backend);
        PersonaEngine::new(
            PersonaRepository::new(store, "persona"),
            Arc::new(FixedSelector(dimension)),
            Arc::new(router),
            PersonaConfig::default(),
        )
        .with_clock(StepClock::starting_at(1_000))
    }

    fn seeded_persona() -> Persona {
        let mut persona = Persona::bootstrap(&PersonaConfig::default(), 500);
        persona.style = vec![Feature::new("温和", 0.7)];
        persona.mood = vec![Feature::new("愉快", 0.4)];
        persona.topics = vec![Feature::new("科技", 0.6)];
        persona.expression = vec![Feature::new("简洁表达", 0.8)];
        persona
    }

    #[tokio::test]
    async fn end_to_end_topics_update() {
        let store = Arc::new(MemoryStore::new());
        let backend = ScriptedBackend::new(r#"[{"name":"编程","weight":0.9}]"#);
        let engine = engine_with(store.clone(), backend.clone(), Dimension::Topics);

        let before = seeded_persona();
        engine.repository().save(&before).unwrap();

        let evolution = engine
            .evolve(&enabled_setting(), "今天学习了新的编程语言")
            .await
            .unwrap();

        assert_eq!(evolution.dimension, Dimension::Topics);
        let stored = engine.repository().load().unwrap().unwrap();
        assert_eq!(stored.topics, vec![Feature::new("编程", 0.9)]);
        assert!(stored.updated_at > before.updated_at);
        assert_eq!(stored.style, before.style);
        assert_eq!(stored.mood, before.mood);
        assert_eq!(stored.expression, before.expression);
        assert_eq!(stored.created_at, before.created_at);

        assert_eq!(backend.calls(), 1);
        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("今天学习了新的编程语言"));
        assert!(prompts[0].contains(r#"[{"name":"科技","weight":0.6}]"#));
    }

    #[tokio::test]
    async fn first_event_bootstraps_persona() {
        let store = Arc::new(MemoryStore::new());
        let backend = ScriptedBackend::new(r#"ok: [{"name":"轻松","weight":0.8}]"#);
        let engine = engine_with(store.clone(), backend, Dimension::Mood);

        let evolution = engine.evolve(&enabled_setting(), "周末去爬山").await.unwrap();
        let persona = evolution.persona;
        assert_eq!(persona.name, "Persona");
        assert_eq!(persona.mood, vec![Feature::new("轻松", 0.8)]);
        assert!(persona.style.is_empty());
        assert_eq!(persona.created_at, persona.last_active);
        assert!(persona.updated_at > persona.created_at);
        assert!(store.get("persona").unwrap().is_some());
    }

    #[tokio::test]
    async fn unparseable_output_leaves_persona_untouched() {
        let store = Arc::new(MemoryStore::new());
        let backend = ScriptedBackend::new("I cannot help with that.");
        let engine = engine_with(store.clone(), backend, Dimension::Style);
        let before = seeded_persona();
        engine.repository().save(&before).unwrap();

        let err = engine.evolve(&enabled_setting(), "x").await.unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
        assert_eq!(err.kind(), "parse");
        assert_eq!(engine.repository().load().unwrap(), Some(before));
    }

    #[tokio::test]
    async fn out_of_range_weight_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let backend = ScriptedBackend::new(r#"[{"name":"温和","weight":1.5}]"#);
        let engine = engine_with(store.clone(), backend, Dimension::Style);

        let err = engine.evolve(&enabled_setting(), "x").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidFeature(_)));
        assert!(store.get("persona").unwrap().is_none());
    }

    #[tokio::test]
    async fn config_errors_make_no_backend_call() {
        let store = Arc::new(MemoryStore::new());
        let backend = ScriptedBackend::new("[]");
        let engine = engine_with(store.clone(), backend.clone(), Dimension::Style);

        let mut setting = enabled_setting();
        setting.provider = "unknown-llm".into();
        let err = engine.evolve(&setting, "x").await.unwrap_err();
        assert!(matches!(err, EngineError::Provider(LlmError::ProviderNotFound(_))));

        setting = enabled_setting();
        setting.api_key.clear();
        let err = engine.evolve(&setting, "x").await.unwrap_err();
        assert!(matches!(err, EngineError::Config(LlmError::CredentialMissing)));

        assert_eq!(backend.calls(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn save_failure_is_persistence_error() {
        let inner = MemoryStore::new();
        let before = seeded_persona();
        inner
            .set("persona", &serde_json::to_string(&before).unwrap())
            .unwrap();
        let store = Arc::new(ReadOnlyStore(inner));
        let backend = ScriptedBackend::new(r#"[{"name":"紧张","weight":0.3}]"#);
        let engine = engine_with(store.clone(), backend, Dimension::Mood);

        let err = engine.evolve(&enabled_setting(), "x").await.unwrap_err();
        assert!(matches!(err, EngineError::Persistence(_)));
        assert_eq!(engine.repository().load().unwrap(), Some(before));
    }

    #[tokio::test]
    async fn corrupt_persona_is_a_load_error() {
        let store = Arc::new(MemoryStore::new());
        store.set("persona", "{broken").unwrap();
        let backend = ScriptedBackend::new("[]");
        let engine = engine_with(store.clone(), backend.clone(), Dimension::Mood);

        let err = engine.evolve(&enabled_setting(), "x").await.unwrap_err();
        assert!(matches!(err, EngineError::Load(StoreError::Codec(_))));
        assert_eq!(backend.calls(), 0);
        assert_eq!(store.get("persona").unwrap().as_deref(), Some("{broken"));
    }

    #[tokio::test]
    async fn streaming_cycle_forwards_chunks() {
        let store = Arc::new(MemoryStore::new());
        let backend = ScriptedBackend::new(r#"[{"name":"故事表达","weight":0.5}]"#);
        let engine = engine_with(store, backend, Dimension::Expression);
        let (tx, mut rx) = mpsc::channel(8);

        let evolution = engine
            .evolve_streaming(&enabled_setting(), "讲了一个故事", tx)
            .await
            .unwrap();
        assert_eq!(evolution.features, vec![Feature::new("故事表达", 0.5)]);
        assert_eq!(
            rx.recv().await.as_deref(),
            Some(r#"[{"name":"故事表达","weight":0.5}]"#)
        );
    }

    #[test]
    fn merge_replaces_only_target_dimension() {
        let before = seeded_persona();
        let (after, _) =
            merge_output(&before, Dimension::Mood, r#"[{"name":"轻松","weight":0.8}]"#, 900)
                .unwrap();
        assert_eq!(after.mood, vec![Feature::new("轻松", 0.8)]);
        assert_eq!(after.updated_at, 900);
        for dim in [Dimension::Style, Dimension::Topics, Dimension::Expression] {
            assert_eq!(
                serde_json::to_vec(after.features(dim)).unwrap(),
                serde_json::to_vec(before.features(dim)).unwrap()
            );
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let raw = "```json\n[{\"name\":\"犀利\",\"weight\":0.65},{\"name\":\"冷静\",\"weight\":0.4}]\n```";
        let base = seeded_persona();
        let (once, _) = merge_output(&base, Dimension::Style, raw, 10).unwrap();
        let (twice, _) = merge_output(&once, Dimension::Style, raw, 10).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_without_brackets_is_parse_error() {
        let base = seeded_persona();
        let err = merge_output(&base, Dimension::Topics, "no json here", 10).unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[test]
    fn llm_errors_map_to_distinct_kinds() {
        let timeout = EngineError::from(LlmError::Timeout(Duration::from_secs(3)));
        assert_eq!(timeout.kind(), "timeout");
        assert_eq!(EngineError::from(LlmError::ModelMissing).kind(), "config");
        assert_eq!(
            EngineError::from(LlmError::ProviderNotFound("x".into())).kind(),
            "provider"
        );
        assert_eq!(EngineError::from(LlmError::Backend("boom".into())).kind(), "provider");
    }
}
