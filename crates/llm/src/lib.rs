//! Provider-neutral text generation for the persona engine.
//!
//! An [`AgentSetting`] names a provider, model and credential; the
//! [`GenerationRouter`] validates it and dispatches to the matching
//! [`ChatBackend`].  [`repair_json_array`] cleans model output before the
//! caller parses it.

pub mod backends;
mod error;
mod message;
mod provider;
mod repair;
mod router;
mod setting;

pub use backends::ChatBackend;
pub use error::LlmError;
pub use message::{ChatMessage, Role};
pub use provider::Provider;
pub use repair::repair_json_array;
pub use router::{DEFAULT_REQUEST_TIMEOUT, GenerationRouter};
pub use setting::{AgentSetting, BackendConfig};
