use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers::{CoachError, CoachHandler};
use crate::models::{AnalysisResult, CachedResult, ChatMessage, LatLng, MealAnalysis, PlanRequest};
use crate::services::image::ImageUpload;

/// Room for a base64-encoded 4 MiB image plus the JSON around it
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub struct AppState {
    pub coach: Arc<CoachHandler>,
}

#[derive(Debug, Deserialize)]
pub struct MealPayload {
    /// Base64 or data URL
    pub image: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl MealPayload {
    fn into_upload(self) -> Result<(ImageUpload, Option<String>), CoachError> {
        let upload = ImageUpload::from_base64(&self.image, self.content_type, self.file_name)?;
        Ok((upload, self.prompt))
    }
}

#[derive(Debug, Deserialize)]
pub struct SpeechPayload {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PlacesPayload {
    pub query: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct FactPayload {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct AudioResponse {
    pub audio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub non_answer: bool,
}

impl From<AnalysisResult> for SearchResponse {
    fn from(result: AnalysisResult) -> Self {
        let non_answer = result.is_non_answer();
        Self { result, non_answer }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

impl IntoResponse for CoachError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoachError::Invalid(_) => StatusCode::BAD_REQUEST,
            CoachError::Gateway(_) => StatusCode::BAD_GATEWAY,
        };
        error_response(status, self.to_string())
    }
}

/// `Json` whose rejections (bad syntax, missing fields, wrong content type)
/// come back as a 400 `{error}` body like every other validation failure.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                log::warn!("⚠️ Rejected request body ({}): {}", rejection.status(), rejection.body_text());
                Err(error_response(StatusCode::BAD_REQUEST, rejection.body_text()))
            }
        }
    }
}

pub fn create_router(coach: Arc<CoachHandler>) -> Router {
    let state = Arc::new(AppState { coach });

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/meal/analyze", post(analyze_meal))
        .route("/api/meal/suggest-prompt", post(suggest_prompt))
        .route("/api/plan", post(generate_plan))
        .route("/api/plan/speech", post(narrate_plan))
        .route("/api/speech", post(speak))
        .route("/api/chat", get(chat_transcript).post(chat))
        .route("/api/places", post(find_places))
        .route("/api/facts", post(check_fact))
        .route("/api/last-result", get(last_result))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn analyze_meal(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<MealPayload>,
) -> Result<Json<MealAnalysis>, CoachError> {
    let (upload, prompt) = payload.into_upload()?;
    let analysis = state.coach.analyze_meal(upload, prompt.as_deref()).await?;
    Ok(Json(analysis))
}

async fn suggest_prompt(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<MealPayload>,
) -> Result<Json<PromptResponse>, CoachError> {
    let (upload, _) = payload.into_upload()?;
    let prompt = state.coach.suggest_prompt(upload).await?;
    Ok(Json(PromptResponse { prompt }))
}

async fn generate_plan(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<PlanRequest>,
) -> Result<Json<PlanResponse>, CoachError> {
    let plan = state.coach.generate_plan(&request).await?;
    Ok(Json(PlanResponse { plan }))
}

async fn narrate_plan(State(state): State<Arc<AppState>>) -> Json<AudioResponse> {
    Json(AudioResponse {
        audio: state.coach.narrate_last_plan().await,
    })
}

async fn speak(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<SpeechPayload>,
) -> Result<Json<AudioResponse>, CoachError> {
    let audio = state.coach.speak(&payload.text).await?;
    Ok(Json(AudioResponse { audio }))
}

async fn chat_transcript(State(state): State<Arc<AppState>>) -> Json<Vec<ChatMessage>> {
    Json(state.coach.transcript())
}

async fn chat(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ChatPayload>,
) -> Result<Json<ChatMessage>, CoachError> {
    let reply = state.coach.chat(&payload.message).await?;
    Ok(Json(reply))
}

async fn find_places(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<PlacesPayload>,
) -> Result<Json<SearchResponse>, CoachError> {
    let location = LatLng {
        latitude: payload.latitude,
        longitude: payload.longitude,
    };
    let result = state.coach.find_places(&payload.query, location).await?;
    Ok(Json(result.into()))
}

async fn check_fact(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<FactPayload>,
) -> Result<Json<SearchResponse>, CoachError> {
    let result = state.coach.check_fact(&payload.query).await?;
    Ok(Json(result.into()))
}

async fn last_result(State(state): State<Arc<AppState>>) -> Json<Option<CachedResult>> {
    Json(state.coach.last_result())
}

async fn root_handler() -> &'static str {
    "FitAI Coaching Gateway - see /api/* for meal, plan, chat, places, facts and speech endpoints"
}

async fn health_check() -> &'static str {
    "OK"
}
