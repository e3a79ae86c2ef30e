use anyhow::Result;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::ai_service::GenerativeProvider;
use super::gemini::{Content, GenerateContentRequest};
use super::prompts::CHAT_GREETING;
use crate::models::{CachedResult, ChatMessage};

/// Client-side handle on one provider conversation.
///
/// The provider keeps no state between calls, so every turn replays the
/// accumulated history together with the system instruction fixed at creation.
pub struct ChatSession {
    model: String,
    system_instruction: Content,
    history: tokio::sync::Mutex<Vec<Content>>,
}

impl ChatSession {
    pub fn new(model: &str, system_instruction: &str) -> Self {
        Self {
            model: model.to_string(),
            system_instruction: Content::instruction(system_instruction),
            history: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Turns on the same session run one at a time. History only grows when the
    /// provider answered, so a failed turn can simply be retried.
    pub async fn send_message(&self, provider: &dyn GenerativeProvider, message: &str) -> Result<String> {
        let mut history = self.history.lock().await;

        let user_turn = Content::user_text(message);
        let mut contents = history.clone();
        contents.push(user_turn.clone());

        let request = GenerateContentRequest {
            system_instruction: Some(self.system_instruction.clone()),
            ..GenerateContentRequest::new(contents)
        };

        let response = provider.generate_content(&self.model, &request).await?;
        let reply = response.text();

        // Replaying an empty model turn gets every later request rejected
        match response.first_content() {
            Some(model_turn) if !reply.trim().is_empty() && !model_turn.parts.is_empty() => {
                history.push(user_turn);
                history.push(model_turn.clone());
            }
            _ => log::warn!("⚠️ Chat turn came back without text, keeping it out of the history"),
        }

        Ok(reply)
    }

    #[cfg(test)]
    pub async fn turn_count(&self) -> usize {
        self.history.lock().await.len() / 2
    }
}

/// In-memory state a caller owns for the lifetime of the process.
pub struct SessionState {
    chat: OnceCell<ChatSession>,
    transcript: Mutex<Vec<ChatMessage>>,
    last_result: Mutex<Option<CachedResult>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            chat: OnceCell::new(),
            transcript: Mutex::new(vec![ChatMessage::bot(CHAT_GREETING)]),
            last_result: Mutex::new(None),
        }
    }

    /// Runs `create` only the first time; later calls get the same session.
    pub fn chat_or_init(&self, create: impl FnOnce() -> ChatSession) -> &ChatSession {
        self.chat.get_or_init(create)
    }

    pub fn push_message(&self, message: ChatMessage) {
        self.transcript.lock().push(message);
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().clone()
    }

    /// Replaces whatever was cached before.
    pub fn remember(&self, result: CachedResult) {
        *self.last_result.lock() = Some(result);
    }

    pub fn last_result(&self) -> Option<CachedResult> {
        self.last_result.lock().clone()
    }

    pub fn last_plan(&self) -> Option<String> {
        match self.last_result.lock().as_ref() {
            Some(CachedResult::Plan { text, .. }) => Some(text.clone()),
            _ => None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NutritionalFacts, Sender};
    use crate::services::mock::{blocked_response, MockProvider};

    #[tokio::test]
    async fn test_history_replayed_with_system_instruction() {
        let provider = MockProvider::new();
        provider.push_text("Hi! What's your goal?");
        provider.push_text("Great, three days it is.");

        let session = ChatSession::new("chat-model", "Be kind.");
        session.send_message(&provider, "hello").await.unwrap();
        let reply = session.send_message(&provider, "3 days please").await.unwrap();

        assert_eq!(reply, "Great, three days it is.");
        assert_eq!(session.turn_count().await, 2);

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].0, "chat-model");

        let second = &requests[1].1;
        assert_eq!(second.contents.len(), 3);
        assert_eq!(second.contents[0].role.as_deref(), Some("user"));
        assert_eq!(second.contents[1].role.as_deref(), Some("model"));
        assert_eq!(second.contents[2].parts[0].text.as_deref(), Some("3 days please"));
        assert_eq!(
            second.system_instruction.as_ref().unwrap().parts[0].text.as_deref(),
            Some("Be kind.")
        );
    }

    #[tokio::test]
    async fn test_empty_reply_not_replayed() {
        let provider = MockProvider::new();
        provider.push_response(blocked_response("SAFETY"));
        provider.push_text("");
        provider.push_text("fine");

        let session = ChatSession::new("chat-model", "Be kind.");
        assert_eq!(session.send_message(&provider, "first").await.unwrap(), "");
        assert_eq!(session.send_message(&provider, "second").await.unwrap(), "");
        assert_eq!(session.turn_count().await, 0);

        let reply = session.send_message(&provider, "third").await.unwrap();
        assert_eq!(reply, "fine");
        assert_eq!(session.turn_count().await, 1);

        let last = &provider.requests()[2].1;
        assert_eq!(last.contents.len(), 1);
        assert_eq!(last.contents[0].parts[0].text.as_deref(), Some("third"));
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_history_untouched() {
        let provider = MockProvider::new();
        provider.push_error("connection reset");

        let session = ChatSession::new("chat-model", "Be kind.");
        assert!(session.send_message(&provider, "hello").await.is_err());
        assert_eq!(session.turn_count().await, 0);
    }

    #[test]
    fn test_chat_initialized_once() {
        let state = SessionState::new();
        let mut created = 0;

        state.chat_or_init(|| {
            created += 1;
            ChatSession::new("a", "first")
        });
        let chat = state.chat_or_init(|| {
            created += 1;
            ChatSession::new("b", "second")
        });

        assert_eq!(created, 1);
        assert_eq!(chat.model(), "a");
    }

    #[test]
    fn test_transcript_starts_with_greeting() {
        let state = SessionState::new();
        state.push_message(ChatMessage::user("hi"));

        let transcript = state.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].sender, Sender::Bot);
        assert_eq!(transcript[0].text, CHAT_GREETING);
        assert_eq!(transcript[1].sender, Sender::User);
    }

    #[test]
    fn test_last_result_keeps_one_entry() {
        let state = SessionState::new();
        assert!(state.last_result().is_none());

        state.remember(CachedResult::Plan {
            text: "Day 1: squats".to_string(),
            detailed: false,
        });
        assert_eq!(state.last_plan().as_deref(), Some("Day 1: squats"));

        state.remember(CachedResult::MealAnalysis {
            text: "Looks balanced".to_string(),
            facts: Some(NutritionalFacts::default()),
        });
        assert!(state.last_plan().is_none());
        assert!(matches!(state.last_result(), Some(CachedResult::MealAnalysis { .. })));
    }
}
