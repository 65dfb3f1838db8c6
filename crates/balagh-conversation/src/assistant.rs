use async_trait::async_trait;
use thiserror::Error;

use balagh_types::conversation::Turn;

/// Answer shown to the user when the assistant produced nothing usable.
pub const FALLBACK_ANSWER: &str = "لم يتم استلام رد من المساعد";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("assistant returned status {status}")]
    Status { status: u16 },

    #[error("malformed assistant response: {0}")]
    Malformed(String),
}

/// Language-model boundary. `history` ends with the pending user turn.
///
/// `Ok(None)` means the provider answered without any text.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn generate(&self, history: &[Turn]) -> Result<Option<String>, AssistantError>;
}
