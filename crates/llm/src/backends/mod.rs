//! Wire-format clients.  Each speaks one HTTP dialect; the router picks the
//! client through [`Provider::backend`](crate::Provider::backend).

mod anthropic;
mod gemini;
mod ollama;
mod openai_compat;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai_compat::OpenAiCompatClient;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{BackendConfig, ChatMessage, LlmError};

/// Single-turn generation capability shared by every provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn generate(
        &self,
        config: &BackendConfig,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError>;

    /// Streaming variant.  Chunks are forwarded to `tx` as they arrive and
    /// the full text is returned.  Backends without a streaming dialect send
    /// the complete response as one chunk.
    async fn generate_stream(
        &self,
        config: &BackendConfig,
        messages: &[ChatMessage],
        tx: mpsc::Sender<String>,
    ) -> Result<String, LlmError> {
        let text = self.generate(config, messages).await?;
        let _ = tx.send(text.clone()).await;
        Ok(text)
    }
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Read a response body as JSON, turning non-2xx statuses into a verbatim
/// backend error.
pub(crate) async fn read_json(response: reqwest::Response, label: &str) -> Result<Value, LlmError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(LlmError::Backend(format!("{label} error ({status}): {body}")));
    }
    serde_json::from_str(&body)
        .map_err(|err| LlmError::Backend(format!("{label} returned invalid JSON: {err}")))
}

pub(crate) async fn ensure_success(
    response: reqwest::Response,
    label: &str,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Backend(format!("{label} error ({status}): {body}")))
}

/// Reassembles newline-delimited records from arbitrarily split byte chunks.
///
/// Bytes are buffered until a full line is present so multi-byte UTF-8
/// characters split across chunks decode correctly.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    pub(crate) fn finish(self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.pending).trim().to_string();
        if text.is_empty() { None } else { Some(text) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(endpoint("http://h:1", "api/chat"), "http://h:1/api/chat");
    }

    #[test]
    fn line_buffer_handles_split_multibyte_chars() {
        let text = "{\"x\":\"编程\"}\n";
        let bytes = text.as_bytes();
        // split inside the first CJK character
        let cut = text.find('编').unwrap() + 1;
        let mut buf = LineBuffer::default();
        assert!(buf.push(&bytes[..cut]).is_empty());
        let lines = buf.push(&bytes[cut..]);
        assert_eq!(lines, vec!["{\"x\":\"编程\"}".to_string()]);
    }

    #[test]
    fn line_buffer_skips_blank_lines_and_keeps_tail() {
        let mut buf = LineBuffer::default();
        let lines = buf.push(b"a\n\n b \nrest");
        assert_eq!(lines, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(buf.finish().as_deref(), Some("rest"));
    }
}
