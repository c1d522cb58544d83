use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{ChatBackend, endpoint, read_json};
use crate::message::{Role, split_system};
use crate::{BackendConfig, ChatMessage, LlmError};

/// `generateContent` client for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

pub(crate) fn build_body(messages: &[ChatMessage]) -> Value {
    let (system, rest) = split_system(messages);
    let contents = rest
        .iter()
        .map(|m| {
            let role = if m.role == Role::Assistant { "model" } else { "user" };
            json!({"role": role, "parts": [{"text": m.content}]})
        })
        .collect::<Vec<_>>();
    let mut body = json!({ "contents": contents });
    if let Some(system) = system {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }
    body
}

pub(crate) fn parse_response(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>();
    if text.is_empty() { None } else { Some(text) }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn generate(
        &self,
        config: &BackendConfig,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let url = endpoint(
            &config.base_url,
            &format!("models/{}:generateContent", config.model),
        );
        debug!(provider = "gemini", %url, "generateContent request");

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &config.api_key)
            .json(&build_body(messages))
            .send()
            .await?;

        let body = read_json(response, "gemini").await?;
        parse_response(&body)
            .ok_or_else(|| LlmError::Backend(format!("gemini response missing text: {body}")))
    }
}
