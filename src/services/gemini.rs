use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ai_service::GenerativeProvider;
use super::errors::ErrorKind;
use crate::models::{GroundingSource, LatLng, PlaceAnswerSources, ReviewSnippet};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            contents,
            ..Default::default()
        }
    }

    pub fn from_prompt(prompt: &str) -> Self {
        Self::new(vec![Content::user_text(prompt)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    pub fn user_text(text: &str) -> Self {
        Self::user(vec![Part::text(text)])
    }

    /// System instructions carry no role.
    pub fn instruction(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn inline_data(mime_type: &str, data: String) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data,
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleMaps {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_search: Option<GoogleSearch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_maps: Option<GoogleMaps>,
}

impl Tool {
    pub fn google_search() -> Self {
        Self {
            google_search: Some(GoogleSearch {}),
            ..Default::default()
        }
    }

    pub fn google_maps() -> Self {
        Self {
            google_maps: Some(GoogleMaps {}),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    pub retrieval_config: RetrievalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    pub lat_lng: LatLng,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps: Option<MapsChunk>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebChunk {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapsChunk {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_answer_sources: Option<PlaceAnswerSourcesChunk>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceAnswerSourcesChunk {
    #[serde(default)]
    pub review_snippets: Vec<ReviewSnippetChunk>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSnippetChunk {
    #[serde(default, alias = "review")]
    pub text: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub google_maps_uri: Option<String>,
}

impl GroundingChunk {
    /// Chunks that are neither web nor maps are dropped.
    pub fn into_source(self) -> Option<GroundingSource> {
        if let Some(web) = self.web {
            return Some(GroundingSource::Web {
                uri: web.uri.unwrap_or_default(),
                title: web.title.unwrap_or_default(),
            });
        }

        self.maps.map(|maps| GroundingSource::Maps {
            uri: maps.uri.unwrap_or_default(),
            title: maps.title.unwrap_or_default(),
            place_answer_sources: maps.place_answer_sources.map(|sources| PlaceAnswerSources {
                review_snippets: sources
                    .review_snippets
                    .into_iter()
                    .map(|snippet| ReviewSnippet {
                        text: snippet.text,
                        author: snippet.author,
                        title: snippet.title,
                        uri: snippet.google_maps_uri,
                    })
                    .collect(),
            }),
        })
    }
}

impl GenerateContentResponse {
    pub fn first_content(&self) -> Option<&Content> {
        self.candidates.first().and_then(|c| c.content.as_ref())
    }

    /// Concatenated text parts of the first candidate, thoughts excluded.
    pub fn text(&self) -> String {
        self.first_content()
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| part.thought != Some(true))
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    pub fn first_inline_data(&self) -> Option<&InlineData> {
        self.first_content()
            .and_then(|content| content.parts.first())
            .and_then(|part| part.inline_data.as_ref())
    }

    pub fn grounding_sources(&self) -> Vec<GroundingSource> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .iter()
                    .cloned()
                    .filter_map(GroundingChunk::into_source)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set when the prompt itself was rejected and nothing was generated.
    pub fn block_reason(&self) -> Option<&str> {
        if !self.candidates.is_empty() {
            return None;
        }
        self.prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Gemini API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        reason: Option<String>,
        message: String,
    },

    #[error("Gemini request timed out")]
    Timeout,

    #[error("Gemini transport error: {0}")]
    Transport(String),

    #[error("prompt blocked due to content restrictions ({0})")]
    Blocked(String),

    #[error("{0}")]
    EmptyResponse(String),

    #[error("malformed Gemini response: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

impl ProviderError {
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(err.to_string())
        }
    }

    /// Decode a non-2xx body. Unparseable bodies are kept verbatim as the message.
    pub fn from_error_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorEnvelope>(body) {
            Ok(envelope) => ProviderError::Api {
                status,
                code: envelope.error.status,
                reason: envelope
                    .error
                    .details
                    .into_iter()
                    .find_map(|detail| detail.reason),
                message: envelope.error.message,
            },
            Err(_) => ProviderError::Api {
                status,
                code: None,
                reason: None,
                message: body.trim().to_string(),
            },
        }
    }

    /// Structured classification. `None` means only the message text can tell.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ProviderError::Api {
                status,
                code,
                reason,
                ..
            } => {
                if reason.as_deref() == Some("API_KEY_INVALID")
                    || code.as_deref() == Some("UNAUTHENTICATED")
                {
                    Some(ErrorKind::Configuration)
                } else if *status == 504 || code.as_deref() == Some("DEADLINE_EXCEEDED") {
                    Some(ErrorKind::Timeout)
                } else {
                    None
                }
            }
            ProviderError::Timeout => Some(ErrorKind::Timeout),
            ProviderError::Blocked(_) => Some(ErrorKind::PolicyDeclined),
            ProviderError::EmptyResponse(_) => Some(ErrorKind::EmptyResponse),
            ProviderError::Transport(_) | ProviderError::Decode(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self::with_client(api_key, base_url, reqwest::Client::new())
    }

    /// Use a preconfigured client, e.g. one with a request timeout.
    pub fn with_client(api_key: String, base_url: String, client: reqwest::Client) -> Self {
        Self {
            api_key,
            base_url,
            client,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait::async_trait]
impl GenerativeProvider for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        log::info!("🤖 Sending request to Gemini with model: {}", model);
        log::debug!("📤 Request payload size: {} bytes", serde_json::to_string(request)?.len());

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        log::debug!("📥 Gemini response status: {}", status);

        let body = response.text().await.map_err(ProviderError::from_transport)?;

        if !status.is_success() {
            log::error!("❌ Gemini API error response ({}): {}", status, body);
            return Err(ProviderError::from_error_body(status.as_u16(), &body).into());
        }

        log::debug!("📄 Raw Gemini response size: {} bytes", body.len());

        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;

        if let Some(reason) = parsed.block_reason() {
            log::warn!("⚠️ Gemini blocked the prompt: {}", reason);
            return Err(ProviderError::Blocked(reason.to_string()).into());
        }

        Ok(parsed)
    }
}


#[cfg(all(test, feature = "http-server"))]
mod client_tests {
    use super::*;
    use crate::services::errors::classify_error;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::Router;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    /// Path and API key of every request the fake endpoint saw
    type Seen = Arc<Mutex<Vec<(String, Option<String>)>>>;

    async fn fake_gemini(status: StatusCode, body: &'static str, delay: Duration) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let recorder = seen.clone();

        let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap| {
            let recorder = recorder.clone();
            async move {
                let key = headers
                    .get("x-goog-api-key")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                recorder.lock().push((uri.path().to_string(), key));
                tokio::time::sleep(delay).await;
                (status, [("content-type", "application/json")], body)
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/v1beta", addr), seen)
    }

    fn client(base_url: String) -> GeminiClient {
        GeminiClient::new("test-key".to_string(), base_url)
    }

    fn provider_error(err: &anyhow::Error) -> &ProviderError {
        err.downcast_ref::<ProviderError>().unwrap()
    }

    #[tokio::test]
    async fn test_success_hits_model_endpoint_with_key() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello"},{"text":" there"}]}}]}"#;
        let (base_url, seen) = fake_gemini(StatusCode::OK, body, Duration::ZERO).await;

        let response = client(base_url)
            .generate_content("gemini-2.5-flash", &GenerateContentRequest::from_prompt("hi"))
            .await
            .unwrap();

        assert_eq!(response.text(), "Hello there");
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "/v1beta/models/gemini-2.5-flash:generateContent");
        assert_eq!(seen[0].1.as_deref(), Some("test-key"));
    }

    #[tokio::test]
    async fn test_error_status_becomes_api_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        let (base_url, _) = fake_gemini(StatusCode::BAD_REQUEST, body, Duration::ZERO).await;

        let err = client(base_url)
            .generate_content("gemini-2.5-flash", &GenerateContentRequest::from_prompt("hi"))
            .await
            .unwrap_err();

        match provider_error(&err) {
            ProviderError::Api { status, code, reason, .. } => {
                assert_eq!(*status, 400);
                assert_eq!(code.as_deref(), Some("INVALID_ARGUMENT"));
                assert_eq!(reason.as_deref(), Some("API_KEY_INVALID"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(classify_error(&err, "x").kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_blocked_prompt_becomes_policy_error() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let (base_url, _) = fake_gemini(StatusCode::OK, body, Duration::ZERO).await;

        let err = client(base_url)
            .generate_content("gemini-2.5-flash", &GenerateContentRequest::from_prompt("hi"))
            .await
            .unwrap_err();

        assert!(matches!(provider_error(&err), ProviderError::Blocked(reason) if reason == "SAFETY"));
        assert_eq!(classify_error(&err, "x").kind, ErrorKind::PolicyDeclined);
    }

    #[tokio::test]
    async fn test_slow_endpoint_maps_to_timeout() {
        let (base_url, _) = fake_gemini(StatusCode::OK, "{}", Duration::from_secs(5)).await;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();

        let err = GeminiClient::with_client("test-key".to_string(), base_url, http)
            .generate_content("gemini-2.5-flash", &GenerateContentRequest::from_prompt("hi"))
            .await
            .unwrap_err();

        assert!(matches!(provider_error(&err), ProviderError::Timeout));
        assert_eq!(classify_error(&err, "x").kind, ErrorKind::Timeout);
    }
}
