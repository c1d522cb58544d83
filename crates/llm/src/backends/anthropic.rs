use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{ChatBackend, endpoint, read_json};
use crate::message::split_system;
use crate::{BackendConfig, ChatMessage, LlmError};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Messages-API client.  System turns are lifted into the top-level
/// `system` field since the API rejects them inside `messages`.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

pub(crate) fn build_body(config: &BackendConfig, messages: &[ChatMessage]) -> Value {
    let (system, rest) = split_system(messages);
    let mut body = json!({
        "model": config.model,
        "max_tokens": MAX_TOKENS,
        "messages": rest
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect::<Vec<_>>(),
    });
    if let Some(system) = system {
        body["system"] = Value::String(system);
    }
    body
}

/// Concatenate every `text` block of the response.
pub(crate) fn parse_response(body: &Value) -> Option<String> {
    let blocks = body.get("content")?.as_array()?;
    let text = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect::<String>();
    if text.is_empty() { None } else { Some(text) }
}

#[async_trait]
impl ChatBackend for AnthropicClient {
    async fn generate(
        &self,
        config: &BackendConfig,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let url = endpoint(&config.base_url, "messages");
        debug!(provider = "anthropic", %url, model = %config.model, "messages request");

        let response = self
            .client
            .post(url)
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&build_body(config, messages))
            .send()
            .await?;

        let body = read_json(response, "anthropic").await?;
        parse_response(&body)
            .ok_or_else(|| LlmError::Backend(format!("anthropic response missing text: {body}")))
    }
}
