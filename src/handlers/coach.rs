use std::sync::Arc;
use thiserror::Error;

use crate::models::{AnalysisResult, CachedResult, ChatMessage, LatLng, MealAnalysis, PlanRequest};
use crate::services::errors::GatewayError;
use crate::services::image::{ImageRejection, ImageUpload, MealImage};
use crate::services::{nutrition, prompts, Gateway, SessionState};

#[derive(Debug, Error)]
pub enum CoachError {
    /// Caller input that never reached the provider
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<ImageRejection> for CoachError {
    fn from(rejection: ImageRejection) -> Self {
        CoachError::Invalid(rejection.to_string())
    }
}

/// Longest prompt or message forwarded to the provider, in characters
pub const MAX_TEXT_CHARS: usize = 5000;

fn require(value: &str, message: &str) -> Result<(), CoachError> {
    if value.trim().is_empty() {
        return Err(CoachError::Invalid(message.to_string()));
    }
    if value.chars().count() > MAX_TEXT_CHARS {
        return Err(CoachError::Invalid(format!(
            "That's a bit too long for me. Please keep it under {} characters.",
            MAX_TEXT_CHARS
        )));
    }
    Ok(())
}

/// Drives the gateway the way the coaching screens do: validate input,
/// call the gateway, post-process and remember the result.
pub struct CoachHandler {
    gateway: Arc<Gateway>,
    session: Arc<SessionState>,
}

impl CoachHandler {
    pub fn new(gateway: Arc<Gateway>, session: Arc<SessionState>) -> Self {
        Self { gateway, session }
    }

    pub async fn analyze_meal(&self, upload: ImageUpload, prompt: Option<&str>) -> Result<MealAnalysis, CoachError> {
        let prompt = prompt.unwrap_or(prompts::DEFAULT_MEAL_PROMPT);
        require(prompt, "Please provide a prompt so I know what to look for!")?;

        let image = MealImage::from_upload(upload)?;
        log::info!("📸 Analyzing meal image ({} bytes)", image.len());

        let analysis = self.gateway.analyze_meal_image(&image, prompt).await?;
        let facts = nutrition::extract(&analysis);
        log::debug!("🥗 Extracted facts: {:?}", facts);
        let facts = facts.has_any().then_some(facts);

        self.session.remember(CachedResult::MealAnalysis {
            text: analysis.clone(),
            facts: facts.clone(),
        });

        Ok(MealAnalysis { analysis, facts })
    }

    pub async fn suggest_prompt(&self, upload: ImageUpload) -> Result<String, CoachError> {
        let image = MealImage::from_upload(upload)?;
        Ok(self.gateway.suggest_meal_prompt(&image).await?)
    }

    pub async fn generate_plan(&self, request: &PlanRequest) -> Result<String, CoachError> {
        require(&request.goal, "Please tell me what your goal is.")?;
        require(&request.level, "Please choose your fitness level.")?;
        require(&request.days, "Please choose how many days a week you can train.")?;

        let prompt = prompts::compose_plan_prompt(request);
        let plan = self.gateway.generate_plan(&prompt, request.detailed).await?;

        self.session.remember(CachedResult::Plan {
            text: plan.clone(),
            detailed: request.detailed,
        });

        Ok(plan)
    }

    /// Audio for the last generated plan, `None` if there is no plan or no audio.
    pub async fn narrate_last_plan(&self) -> Option<String> {
        let plan = self.session.last_plan().filter(|plan| !plan.trim().is_empty())?;
        self.gateway.generate_speech(&plan).await
    }

    pub async fn speak(&self, text: &str) -> Result<Option<String>, CoachError> {
        require(text, "Please provide some text to read aloud.")?;
        Ok(self.gateway.generate_speech(text).await)
    }

    pub async fn chat(&self, message: &str) -> Result<ChatMessage, CoachError> {
        require(message, "Please type a message first.")?;

        self.session.push_message(ChatMessage::user(message));
        let reply = self.gateway.get_chatbot_response(&self.session, message).await;

        let bot_message = ChatMessage::bot(reply);
        self.session.push_message(bot_message.clone());
        Ok(bot_message)
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.session.transcript()
    }

    pub fn last_result(&self) -> Option<CachedResult> {
        self.session.last_result()
    }

    pub async fn find_places(&self, query: &str, location: LatLng) -> Result<AnalysisResult, CoachError> {
        require(query, "Please tell me what you're looking for nearby.")?;
        Ok(self.gateway.find_nearby_places(query, location).await)
    }

    pub async fn check_fact(&self, query: &str) -> Result<AnalysisResult, CoachError> {
        require(query, "Please enter a question to get an answer.")?;
        Ok(self.gateway.get_up_to_date_answer(query).await)
    }
}
