use anyhow::Result;

use super::gemini::{GenerateContentRequest, GenerateContentResponse};
use super::session::ChatSession;

/// Trait for generative model backends (Gemini REST, test doubles, ...)
#[async_trait::async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// One `generateContent` round trip. No retries.
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;

    /// Open a conversation bound to `system_instruction` for its whole lifetime.
    fn start_chat(&self, model: &str, system_instruction: &str) -> ChatSession {
        ChatSession::new(model, system_instruction)
    }
}
