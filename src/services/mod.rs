pub mod ai_service; // Provider trait
pub mod errors; // Error classifier
pub mod gateway;
pub mod gemini; // Gemini REST client
pub mod image;
pub mod nutrition;
pub mod prompts;
pub mod session;

#[cfg(test)]
pub mod mock;

pub use gateway::Gateway;
pub use gemini::GeminiClient;
pub use session::SessionState;
