use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use super::{ChatBackend, LineBuffer, endpoint, ensure_success, read_json};
use crate::{BackendConfig, ChatMessage, LlmError};

/// Chat-completions client shared by OpenAI, Qwen, DeepSeek and custom
/// OpenAI-compatible endpoints.  `label` only affects error messages.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    label: &'static str,
}

impl OpenAiCompatClient {
    pub fn new(client: reqwest::Client, label: &'static str) -> Self {
        Self { client, label }
    }
}

pub(crate) fn build_body(config: &BackendConfig, messages: &[ChatMessage], stream: bool) -> Value {
    json!({
        "model": config.model,
        "messages": messages,
        "stream": stream,
    })
}

pub(crate) fn parse_response(body: &Value) -> Option<String> {
    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(ToString::to_string)
}

/// Extract the delta text from one SSE line, `None` for keep-alives,
/// `[DONE]` and non-content events.
pub(crate) fn parse_stream_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return None;
    }
    let json: Value = serde_json::from_str(data).ok()?;
    json.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
        .filter(|content| !content.is_empty())
        .map(ToString::to_string)
}

#[async_trait]
impl ChatBackend for OpenAiCompatClient {
    async fn generate(
        &self,
        config: &BackendConfig,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let url = endpoint(&config.base_url, "chat/completions");
        debug!(provider = self.label, %url, model = %config.model, "chat completion request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&build_body(config, messages, false))
            .send()
            .await?;

        let body = read_json(response, self.label).await?;
        parse_response(&body).ok_or_else(|| {
            LlmError::Backend(format!("{} response missing text: {body}", self.label))
        })
    }

    async fn generate_stream(
        &self,
        config: &BackendConfig,
        messages: &[ChatMessage],
        tx: mpsc::Sender<String>,
    ) -> Result<String, LlmError> {
        let url = endpoint(&config.base_url, "chat/completions");
        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&build_body(config, messages, true))
            .send()
            .await?;
        let mut response = ensure_success(response, self.label).await?;

        let mut lines = LineBuffer::default();
        let mut full_response = String::new();
        while let Some(chunk) = response.chunk().await? {
            for line in lines.push(&chunk) {
                if let Some(content) = parse_stream_line(&line) {
                    full_response.push_str(&content);
                    let _ = tx.send(content).await;
                }
            }
        }
        if let Some(content) = lines.finish().as_deref().and_then(parse_stream_line) {
            full_response.push_str(&content);
            let _ = tx.send(content).await;
        }

        Ok(full_response)
    }
}
