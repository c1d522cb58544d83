//! The persona profile: four independently refreshed feature dimensions.

use std::fmt;
use std::str::FromStr;

use alterego_config::PersonaConfig;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Longest accepted feature name, in characters.
pub const MAX_FEATURE_NAME_CHARS: usize = 32;

/// A named trait with a weight in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("feature name is empty")]
    EmptyName,
    #[error("feature name {0:?} exceeds {max} characters", max = MAX_FEATURE_NAME_CHARS)]
    NameTooLong(String),
    #[error("feature name {0:?} contains punctuation")]
    Punctuation(String),
    #[error("feature {name:?} has weight {weight} outside [0, 1]")]
    WeightOutOfRange { name: String, weight: f64 },
}

impl Feature {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }

    /// Out-of-range weights are rejected, never clamped.
    pub fn validate(&self) -> Result<(), FeatureError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(FeatureError::EmptyName);
        }
        if name.chars().count() > MAX_FEATURE_NAME_CHARS {
            return Err(FeatureError::NameTooLong(self.name.clone()));
        }
        if name.chars().any(is_punctuation) {
            return Err(FeatureError::Punctuation(self.name.clone()));
        }
        if !self.weight.is_finite() || !(0.0..=1.0).contains(&self.weight) {
            return Err(FeatureError::WeightOutOfRange {
                name: self.name.clone(),
                weight: self.weight,
            });
        }
        Ok(())
    }
}

/// Validate a whole list; the first offending feature is reported.
pub fn validate_features(features: &[Feature]) -> Result<(), FeatureError> {
    features.iter().try_for_each(Feature::validate)
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(c,
            '\u{3000}'..='\u{303F}'   // CJK symbols and punctuation
            | '\u{FF01}'..='\u{FF0F}' // fullwidth ！＂＃…／
            | '\u{FF1A}'..='\u{FF20}'
            | '\u{FF3B}'..='\u{FF40}'
            | '\u{FF5B}'..='\u{FF65}'
            | '\u{2010}'..='\u{2027}' // dashes, quotes, ellipsis
            | '\u{00B7}')
}

// ── Dimension ─────────────────────────────────────────────────────────────────

/// The four facets of a persona.  Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Style,
    Mood,
    Topics,
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown dimension: {0}")]
pub struct UnknownDimension(pub String);

impl Dimension {
    pub const ALL: [Dimension; 4] = [Self::Style, Self::Mood, Self::Topics, Self::Expression];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Mood => "mood",
            Self::Topics => "topics",
            Self::Expression => "expression",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Style => 0,
            Self::Mood => 1,
            Self::Topics => 2,
            Self::Expression => 3,
        }
    }

    /// Short label used in prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Style => "风格维度",
            Self::Mood => "情绪维度",
            Self::Topics => "兴趣主题维度",
            Self::Expression => "表达偏好维度",
        }
    }

    /// Human description of what features in this dimension capture.
    pub fn description(self) -> &'static str {
        match self {
            Self::Style => "行为方式、说话风格，如：温和、犀利、冷静、机敏。",
            Self::Mood => "情绪状态，如：愉快、紧张、轻松、烦躁。",
            Self::Topics => "偏好讨论的主题，如：科技、生活、哲学、编程。",
            Self::Expression => "表达方式，如：简洁表达、比喻表达、故事表达。",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = UnknownDimension;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "style" => Ok(Self::Style),
            "mood" => Ok(Self::Mood),
            "topics" | "topic" => Ok(Self::Topics),
            "expression" => Ok(Self::Expression),
            _ => Err(UnknownDimension(s.to_string())),
        }
    }
}

// ── Persona ───────────────────────────────────────────────────────────────────

/// The singleton personality profile persisted under one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub name: String,
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub style: Vec<Feature>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mood: Vec<Feature>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub topics: Vec<Feature>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub expression: Vec<Feature>,
    /// Reserved for future tuning; the engine never changes it.
    pub independence: f64,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_active: i64,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Feature>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Feature>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Persona {
    /// A fresh persona with empty dimensions and every timestamp at `now`.
    pub fn bootstrap(config: &PersonaConfig, now: i64) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            style: Vec::new(),
            mood: Vec::new(),
            topics: Vec::new(),
            expression: Vec::new(),
            independence: config.independence.clamp(0.0, 1.0),
            created_at: now,
            updated_at: now,
            last_active: now,
        }
    }

    pub fn features(&self, dimension: Dimension) -> &[Feature] {
        match dimension {
            Dimension::Style => &self.style,
            Dimension::Mood => &self.mood,
            Dimension::Topics => &self.topics,
            Dimension::Expression => &self.expression,
        }
    }

    /// Discard every existing feature of `dimension` and install `features`.
    pub fn replace_features(&mut self, dimension: Dimension, features: Vec<Feature>) {
        let slot = match dimension {
            Dimension::Style => &mut self.style,
            Dimension::Mood => &mut self.mood,
            Dimension::Topics => &mut self.topics,
            Dimension::Expression => &mut self.expression,
        };
        *slot = features;
    }

    /// Replace one dimension and stamp `updated_at`.  Nothing else changes.
    pub fn apply_update(&mut self, dimension: Dimension, features: Vec<Feature>, now: i64) {
        self.replace_features(dimension, features);
        self.updated_at = now;
    }
}
