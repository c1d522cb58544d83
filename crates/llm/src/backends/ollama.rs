use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use super::{ChatBackend, LineBuffer, endpoint, ensure_success, read_json};
use crate::{BackendConfig, ChatMessage, LlmError};

/// Local Ollama server via `/api/chat`.  The credential is sent as a bearer
/// token so Ollama instances behind an authenticating proxy work too.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
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
    body.get("message")
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(ToString::to_string)
}

fn parse_stream_line(line: &str) -> Option<String> {
    let json: Value = serde_json::from_str(line).ok()?;
    parse_response(&json).filter(|content| !content.is_empty())
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn generate(
        &self,
        config: &BackendConfig,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let url = endpoint(&config.base_url, "api/chat");
        debug!(provider = "ollama", %url, model = %config.model, "chat request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&build_body(config, messages, false))
            .send()
            .await?;

        let body = read_json(response, "ollama").await?;
        parse_response(&body)
            .ok_or_else(|| LlmError::Backend(format!("ollama response missing text: {body}")))
    }

    async fn generate_stream(
        &self,
        config: &BackendConfig,
        messages: &[ChatMessage],
        tx: mpsc::Sender<String>,
    ) -> Result<String, LlmError> {
        let url = endpoint(&config.base_url, "api/chat");
        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&build_body(config, messages, true))
            .send()
            .await?;
        let mut response = ensure_success(response, "ollama").await?;

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
