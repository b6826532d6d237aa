//! Text-generation collaborator boundary.

use async_trait::async_trait;
use thiserror::Error;

/// Opaque failure from a text-generation backend.
///
/// Callers never branch on the cause; they substitute a fixed fallback
/// string, so one message-carrying type is enough at this seam.
#[derive(Error, Debug, Clone)]
#[error("text generation failed: {0}")]
pub struct GenerateError(pub String);

impl GenerateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Single-shot text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt` under `system_prompt`.
    ///
    /// Implementations return the trimmed completion text.
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> std::result::Result<String, GenerateError>;
}
