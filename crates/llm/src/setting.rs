use std::fmt;

use serde::{Deserialize, Serialize};

/// The user-facing agent configuration persisted in the key-value store.
///
/// Field names on the wire follow the deployed JSON (`apiKey`, `baseURL`).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSetting {
    pub enable: bool,
    pub provider: String,
    pub model: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "baseURL", skip_serializing_if = "String::is_empty")]
    pub base_url: String,
}

impl fmt::Debug for AgentSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSetting")
            .field("enable", &self.enable)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Resolved per-call client parameters handed to a [`ChatBackend`](crate::ChatBackend).
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub api_key: String,
    pub model: String,
    /// Always populated: the setting's `baseURL` or the provider default.
    pub base_url: String,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<empty>" } else { "<redacted>" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_deployed_json_field_names() {
        let raw = r#"{"enable":true,"provider":"openai","model":"gpt-4o-mini","apiKey":"sk-1","baseURL":"https://proxy.local/v1"}"#;
        let setting: AgentSetting = serde_json::from_str(raw).unwrap();
        assert!(setting.enable);
        assert_eq!(setting.provider, "openai");
        assert_eq!(setting.api_key, "sk-1");
        assert_eq!(setting.base_url, "https://proxy.local/v1");
    }

    #[test]
    fn missing_fields_default_to_disabled() {
        let setting: AgentSetting = serde_json::from_str("{}").unwrap();
        assert!(!setting.enable);
        assert!(setting.model.is_empty());
    }

    #[test]
    fn empty_base_url_is_not_serialized() {
        let setting = AgentSetting {
            enable: true,
            provider: "qwen".into(),
            model: "qwen-plus".into(),
            api_key: "k".into(),
            base_url: String::new(),
        };
        let json = serde_json::to_string(&setting).unwrap();
        assert!(!json.contains("baseURL"), "json = {json}");
        assert!(json.contains("\"apiKey\":\"k\""));
    }

    #[test]
    fn debug_output_hides_credentials() {
        let setting = AgentSetting {
            api_key: "sk-very-secret".into(),
            ..Default::default()
        };
        let rendered = format!("{setting:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
