use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::Content;

/// Topic published whenever new content is stored.
pub const CONTENT_CREATED: &str = "content.created";

/// Payload key carrying the created [`Content`].
pub const PAYLOAD_CONTENT: &str = "echo";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    #[serde(default)]
    pub payload: HashMap<String, Value>,
}

impl Event {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: HashMap::new(),
        }
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    pub fn content_created(content: &Content) -> Self {
        let value = serde_json::to_value(content).unwrap_or(Value::Null);
        Self::new(CONTENT_CREATED).with_payload(PAYLOAD_CONTENT, value)
    }

    /// The content payload, when present and of the expected shape.
    pub fn content(&self) -> Option<Content> {
        let value = self.payload.get(PAYLOAD_CONTENT)?;
        serde_json::from_value(value.clone()).ok()
    }
}
