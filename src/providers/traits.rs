use crate::error::ProviderError;
use crate::sessions::types::Turn;
use async_trait::async_trait;
use std::path::Path;

/// Language-model boundary consumed by the flows. The conversation core only
/// supplies the windowed history and system prompt as plain text.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate a reply to `text`, given the system prompt and the windowed
    /// history for context.
    async fn chat(
        &self,
        system_prompt: &str,
        history: &[Turn],
        text: &str,
    ) -> Result<String, ProviderError>;

    /// Describe, or answer a question about, a locally saved image.
    async fn describe_image(
        &self,
        prompt: &str,
        image_path: &Path,
    ) -> Result<String, ProviderError>;
}
