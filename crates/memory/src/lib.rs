//! Persona state and the key-value storage it lives in.

pub mod persona;
pub mod repository;
pub mod selector;
pub mod store;

pub use persona::{
    Dimension, Feature, FeatureError, MAX_FEATURE_NAME_CHARS, Persona, UnknownDimension,
    validate_features,
};
pub use repository::PersonaRepository;
pub use selector::{DimensionSelector, StalenessSelector, UniformSelector, selector_from_config};
pub use store::{KeyValueStore, MemoryStore, RedbStore, StoreError};
