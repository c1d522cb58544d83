use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the redb file holding settings, persona and cache markers.
    /// Overridden at runtime by `ALTEREGO_STORE_PATH` when set.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: ".alterego/store.redb".to_string(),
        }
    }
}

/// Key names inside the key-value store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub agent_setting: String,
    pub persona: String,
    /// Marker key for the cached recent-activity summary.  Deleted on every
    /// content event so the next summary request regenerates it.
    pub recent_cache: String,
    /// JSON log of ingested content used by the CLI.
    pub content: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            agent_setting: "agent_setting".to_string(),
            persona: "persona".to_string(),
            recent_cache: "agent_gen_recent".to_string(),
            content: "content_log".to_string(),
        }
    }
}

// ── Persona ───────────────────────────────────────────────────────────────────

/// How the engine chooses which dimension to refresh on each event.
///
/// | Policy      | Behaviour                                                       |
/// |-------------|-----------------------------------------------------------------|
/// | `uniform`   | Uniformly random among the four dimensions, ignoring history.   |
/// | `staleness` | Weighted toward older dimensions; one unchosen for `max_staleness` selections is forced. |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorPolicy {
    #[default]
    Uniform,
    Staleness,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Name given to a freshly bootstrapped persona.
    pub name: String,
    pub description: String,
    pub independence: f64,
    pub selector: SelectorPolicy,
    /// Only consulted by the `staleness` selector.
    pub max_staleness: u32,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Persona".to_string(),
            description: "parallel personality".to_string(),
            independence: 0.5,
            selector: SelectorPolicy::Uniform,
            max_staleness: 8,
        }
    }
}

// ── LLM ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Deadline for a single generation call.  Expiry is reported as a
    /// timeout, never as a provider or parse failure.
    pub request_timeout_secs: u64,
    /// Fallback base URL for the `ollama` provider when the agent setting
    /// carries none.  Overridden by `OLLAMA_BASE_URL`.
    pub ollama_base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            ollama_base_url: "http://localhost:11434".to_string(),
        }
    }
}

// ── Recent-activity summary ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Number of most recent content items fed to the summary call.
    pub page_size: usize,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            system_prompt: "你是一个热心的个人助理，帮助用户回顾最近的活动。".to_string(),
            user_prompt: "请根据我最近的活动进行总结。".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub keys: KeysConfig,
    pub persona: PersonaConfig,
    pub llm: LlmConfig,
    pub summary: SummaryConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)
                .with_context(|| format!("parsing config at {}", path.display()))?;
        }

        if let Ok(value) = env::var("ALTEREGO_STORE_PATH") {
            if !value.is_empty() {
                config.store.path = value;
            }
        }

        if let Ok(value) = env::var("OLLAMA_BASE_URL") {
            if !value.is_empty() {
                config.llm.ollama_base_url = value;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.llm.request_timeout_secs.max(1))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
