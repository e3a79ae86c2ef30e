use anyhow::Result;
use base64::{engine::general_purpose, Engine};
use std::sync::Arc;

use super::ai_service::GenerativeProvider;
use super::errors::{classify, classify_error, GatewayError};
use super::gemini::{
    Content, GenerateContentRequest, GenerationConfig, Part, PrebuiltVoiceConfig, ProviderError,
    RetrievalConfig, SpeechConfig, ThinkingConfig, Tool, ToolConfig, VoiceConfig,
};
use super::image::MealImage;
use super::prompts;
use super::session::SessionState;
use crate::models::{AnalysisResult, LatLng};

/// Mediates between callers and the generative provider.
///
/// Image analysis, prompt suggestion and plan generation return `Err` with a
/// classified message. Chat, grounded search and speech never fail: they fold
/// the classified message (or `None`) into their normal return value.
pub struct Gateway {
    provider: Arc<dyn GenerativeProvider>,
}

fn fail(error: anyhow::Error, context: &str) -> GatewayError {
    log::error!("❌ Gemini call failed while {}: {:#}", context, error);
    classify_error(&error, context)
}

/// Same as `fail` for operations that hand the message back as a normal result.
fn fail_softly(error: anyhow::Error, context: &str) -> String {
    log::error!("❌ Gemini call failed while {}: {:#}", context, error);
    classify(&error, context)
}

impl Gateway {
    pub fn new(provider: Arc<dyn GenerativeProvider>) -> Self {
        Self { provider }
    }

    pub async fn analyze_meal_image(&self, image: &MealImage, instruction: &str) -> Result<String, GatewayError> {
        self.request_meal_analysis(image, instruction)
            .await
            .map_err(|e| fail(e, "analyzing your meal"))
    }

    async fn request_meal_analysis(&self, image: &MealImage, instruction: &str) -> Result<String> {
        log::debug!("📸 Starting meal analysis ({} bytes, {})", image.len(), image.mime());

        let request = GenerateContentRequest::new(vec![Content::user(vec![
            Part::inline_data(image.mime().as_str(), image.to_base64()),
            Part::text(instruction),
        ])]);

        let response = self
            .provider
            .generate_content(prompts::MEAL_ANALYSIS_MODEL, &request)
            .await?;

        let text = response.text();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse(prompts::EMPTY_ANALYSIS_MESSAGE.to_string()).into());
        }

        log::info!("✅ Meal analysis received ({} chars)", text.len());
        Ok(text)
    }

    pub async fn suggest_meal_prompt(&self, image: &MealImage) -> Result<String, GatewayError> {
        self.request_prompt_suggestion(image)
            .await
            .map_err(|e| fail(e, "suggesting a prompt"))
    }

    async fn request_prompt_suggestion(&self, image: &MealImage) -> Result<String> {
        let request = GenerateContentRequest::new(vec![Content::user(vec![
            Part::inline_data(image.mime().as_str(), image.to_base64()),
            Part::text(prompts::MEAL_SUGGESTION_PROMPT),
        ])]);

        let response = self
            .provider
            .generate_content(prompts::PROMPT_SUGGESTION_MODEL, &request)
            .await?;

        // Models occasionally answer with a couple of lines; the first one is the question
        let text = response.text();
        let suggestion = text.trim().lines().next().unwrap_or("").trim();
        if suggestion.is_empty() {
            return Err(ProviderError::EmptyResponse(prompts::EMPTY_SUGGESTION_MESSAGE.to_string()).into());
        }

        Ok(suggestion.to_string())
    }

    /// Detailed plans go to the larger model with an extended thinking budget.
    pub async fn generate_plan(&self, prompt: &str, detailed: bool) -> Result<String, GatewayError> {
        self.request_plan(prompt, detailed)
            .await
            .map_err(|e| fail(e, "generating your plan"))
    }

    async fn request_plan(&self, prompt: &str, detailed: bool) -> Result<String> {
        let model = prompts::plan_model(detailed);
        let generation_config = detailed.then(|| GenerationConfig {
            thinking_config: Some(ThinkingConfig {
                thinking_budget: prompts::DETAILED_PLAN_THINKING_BUDGET,
            }),
            ..Default::default()
        });

        let request = GenerateContentRequest {
            generation_config,
            ..GenerateContentRequest::from_prompt(prompt)
        };

        log::info!("📝 Generating {} plan with {}", if detailed { "detailed" } else { "quick" }, model);
        let response = self.provider.generate_content(model, &request).await?;
        Ok(response.text())
    }

    /// The classified error text comes back as if it were the coach's reply.
    pub async fn get_chatbot_response(&self, session: &SessionState, message: &str) -> String {
        let chat = session.chat_or_init(|| {
            log::info!("💬 Starting chat session with {}", prompts::CHAT_MODEL);
            self.provider.start_chat(prompts::CHAT_MODEL, prompts::CONCIERGE_PERSONA)
        });

        log::debug!("💬 Chat turn on {} ({} chars)", chat.model(), message.len());
        match chat.send_message(self.provider.as_ref(), message).await {
            Ok(reply) => reply,
            Err(e) => fail_softly(e, "getting a response"),
        }
    }

    pub async fn find_nearby_places(&self, query: &str, location: LatLng) -> AnalysisResult {
        let request = GenerateContentRequest {
            tools: Some(vec![Tool::google_maps()]),
            tool_config: Some(ToolConfig {
                retrieval_config: RetrievalConfig { lat_lng: location },
            }),
            ..GenerateContentRequest::from_prompt(query)
        };

        self.grounded_answer(request, "finding nearby places").await
    }

    pub async fn get_up_to_date_answer(&self, query: &str) -> AnalysisResult {
        let request = GenerateContentRequest {
            tools: Some(vec![Tool::google_search()]),
            ..GenerateContentRequest::from_prompt(query)
        };

        self.grounded_answer(request, "finding an answer").await
    }

    async fn grounded_answer(&self, request: GenerateContentRequest, context: &str) -> AnalysisResult {
        let response = match self
            .provider
            .generate_content(prompts::GROUNDED_MODEL, &request)
            .await
        {
            Ok(response) => response,
            Err(e) => return AnalysisResult::without_sources(fail_softly(e, context)),
        };

        let result = AnalysisResult {
            text: response.text(),
            sources: response.grounding_sources(),
        };

        if result.is_non_answer() {
            log::warn!("⚠️ Grounded search while {} came back empty-handed", context);
        } else {
            log::info!("🔎 Grounded answer with {} sources", result.sources.len());
            for source in &result.sources {
                log::debug!("🔗 {} <{}>", source.title(), source.uri());
            }
        }

        result
    }

    /// Base64 audio, or `None` whenever there is nothing playable.
    pub async fn generate_speech(&self, text: &str) -> Option<String> {
        let request = GenerateContentRequest {
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: prompts::SPEECH_VOICE.to_string(),
                        },
                    },
                }),
                ..Default::default()
            }),
            ..GenerateContentRequest::from_prompt(&format!("{}{}", prompts::SPEECH_PREFIX, text))
        };

        let response = match self.provider.generate_content(prompts::SPEECH_MODEL, &request).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("🔇 Speech generation failed: {:#}", e);
                return None;
            }
        };

        let inline = response.first_inline_data()?;
        if !inline.mime_type.starts_with("audio/") {
            log::warn!("🔇 Speech response carried {} instead of audio", inline.mime_type);
            return None;
        }
        if inline.data.is_empty() || general_purpose::STANDARD.decode(&inline.data).is_err() {
            log::warn!("🔇 Speech response payload is not valid base64 audio");
            return None;
        }

        Some(inline.data.clone())
    }
}
