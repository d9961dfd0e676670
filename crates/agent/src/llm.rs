use async_trait::async_trait;
use thiserror::Error;

use folio_core::domain::chat::ProjectedTurn;

use crate::safety::SafetySettings;

/// One generation call: system instruction, safety thresholds, prior turns and
/// the new user message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub safety: SafetySettings,
    pub turns: Vec<ProjectedTurn>,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation credential is not configured")]
    MissingCredential,
    #[error("generation blocked: {reason}")]
    Blocked { reason: String },
    #[error("generation transport failure: {0}")]
    Transport(String),
    #[error("generation upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("generation response could not be decoded: {0}")]
    Decode(String),
    #[error("generation response contained no candidates")]
    EmptyResponse,
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Whether a credential is present. Checked before any external call.
    fn is_configured(&self) -> bool;

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}
