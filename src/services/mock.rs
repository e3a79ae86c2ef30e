use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::ai_service::GenerativeProvider;
use super::gemini::{
    Candidate, Content, GenerateContentRequest, GenerateContentResponse, GroundingChunk,
    GroundingMetadata, Part,
};
use super::session::ChatSession;

/// Scripted provider for tests: answers from a queue and records every call.
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<GenerateContentResponse>>>,
    requests: Mutex<Vec<(String, GenerateContentRequest)>>,
    chats_started: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            chats_started: AtomicUsize::new(0),
        }
    }

    pub fn push_response(&self, response: GenerateContentResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    pub fn push_text(&self, text: &str) {
        self.push_response(text_response(text));
    }

    pub fn push_error(&self, message: &str) {
        self.responses.lock().push_back(Err(anyhow!("{}", message)));
    }

    pub fn push_failure(&self, error: anyhow::Error) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<(String, GenerateContentRequest)> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn chats_started(&self) -> usize {
        self.chats_started.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GenerativeProvider for MockProvider {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        self.requests.lock().push((model.to_string(), request.clone()));
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted response left")))
    }

    fn start_chat(&self, model: &str, system_instruction: &str) -> ChatSession {
        self.chats_started.fetch_add(1, Ordering::SeqCst);
        ChatSession::new(model, system_instruction)
    }
}

pub fn response_with_parts(parts: Vec<Part>) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content {
                role: Some("model".to_string()),
                parts,
            }),
            ..Default::default()
        }],
        prompt_feedback: None,
    }
}

/// A candidate with a finish reason but no content, as the API sends for blocked replies.
pub fn blocked_response(finish_reason: &str) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            finish_reason: Some(finish_reason.to_string()),
            ..Default::default()
        }],
        prompt_feedback: None,
    }
}

pub fn text_response(text: &str) -> GenerateContentResponse {
    response_with_parts(vec![Part::text(text)])
}

pub fn grounded_response(text: &str, chunks: Vec<GroundingChunk>) -> GenerateContentResponse {
    let mut response = text_response(text);
    response.candidates[0].grounding_metadata = Some(GroundingMetadata {
        grounding_chunks: chunks,
    });
    response
}

pub fn inline_response(mime_type: &str, data: &str) -> GenerateContentResponse {
    response_with_parts(vec![Part::inline_data(mime_type, data.to_string())])
}
