use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong between an [`AgentSetting`](crate::AgentSetting)
/// and a generated string.
///
/// The first five variants are configuration problems detected before any
/// network traffic; they are never retryable.  Backend errors carry the
/// provider's own message verbatim.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("agent disabled")]
    AgentDisabled,
    #[error("model missing")]
    ModelMissing,
    #[error("provider not configured")]
    ProviderNotConfigured,
    #[error("credential missing")]
    CredentialMissing,
    #[error("provider not found: {0}")]
    ProviderNotFound(String),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Backend(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl LlmError {
    /// `true` for errors raised while validating the setting, before dispatch.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::AgentDisabled
                | Self::ModelMissing
                | Self::ProviderNotConfigured
                | Self::CredentialMissing
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
