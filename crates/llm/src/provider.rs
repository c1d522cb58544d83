use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backends::{AnthropicClient, ChatBackend, GeminiClient, OllamaClient, OpenAiCompatClient};

/// The closed set of generation providers an [`AgentSetting`](crate::AgentSetting)
/// may name.
///
/// Each variant owns its default endpoint and the backend that speaks its
/// wire format; adding a provider means adding a variant here and the
/// compiler points at every match that needs a new arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
    Qwen,
    DeepSeek,
    Ollama,
    /// Any OpenAI-compatible endpoint addressed through `baseURL`.
    Custom,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::Gemini,
        Self::Qwen,
        Self::DeepSeek,
        Self::Ollama,
        Self::Custom,
    ];

    /// Parse a provider name from a setting (case-insensitive).
    ///
    /// Accepts the canonical names plus the `*-compatible` spellings and a
    /// few common aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Some(Self::OpenAi),
            "anthropic" | "anthropic-compatible" | "claude" => Some(Self::Anthropic),
            "gemini" | "gemini-compatible" | "google" => Some(Self::Gemini),
            "qwen" | "qwen-compatible" | "dashscope" => Some(Self::Qwen),
            "deepseek" | "deepseek-compatible" => Some(Self::DeepSeek),
            "ollama" | "local" => Some(Self::Ollama),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Qwen => "qwen",
            Self::DeepSeek => "deepseek",
            Self::Ollama => "ollama",
            Self::Custom => "custom",
        }
    }

    /// Endpoint used when the setting carries no `baseURL`.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi | Self::Custom => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            Self::DeepSeek => "https://api.deepseek.com",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Construct the backend that speaks this provider's wire format.
    pub fn backend(self, http: reqwest::Client) -> Arc<dyn ChatBackend> {
        match self {
            Self::OpenAi | Self::Qwen | Self::DeepSeek | Self::Custom => {
                Arc::new(OpenAiCompatClient::new(http, self.as_str()))
            }
            Self::Anthropic => Arc::new(AnthropicClient::new(http)),
            Self::Gemini => Arc::new(GeminiClient::new(http)),
            Self::Ollama => Arc::new(OllamaClient::new(http)),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
