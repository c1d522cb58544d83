//! Event-driven persona evolution: engine, handler, bus and the recent
//! activity summary built on top of the same stores.

pub mod bus;
pub mod content;
pub mod engine;
pub mod events;
pub mod handler;
pub mod prompt_builder;
mod services;
mod settings;
pub mod summary;

pub use bus::{BusClosed, DEFAULT_BUS_CAPACITY, EventBus, Subscription};
pub use content::{Content, ContentStore, InMemoryContentStore, KvContentStore};
pub use engine::{Clock, EngineError, Evolution, PersonaEngine, SystemClock, merge_output};
pub use events::{CONTENT_CREATED, Event, PAYLOAD_CONTENT};
pub use handler::{AgentEventHandler, HandleReport, PersonaUpdate, SkipReason};
pub use prompt_builder::PromptError;
pub use services::{Services, router_from_config};
pub use settings::SettingsRepository;
pub use summary::{RecentSummarizer, SummaryError};
