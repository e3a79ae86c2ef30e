use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,  // Person typing into the chat
    Bot,   // Coach reply
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        };
        write!(f, "{}", s)
    }
}

/// One entry of a chat transcript. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            id: format!("{}-{}", sender, Uuid::new_v4()),
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Sender::Bot, text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSnippet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceAnswerSources {
    pub review_snippets: Vec<ReviewSnippet>,
}

/// Citation returned next to a grounded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GroundingSource {
    Web {
        uri: String,
        title: String,
    },
    Maps {
        uri: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        place_answer_sources: Option<PlaceAnswerSources>,
    },
}

impl GroundingSource {
    pub fn uri(&self) -> &str {
        match self {
            GroundingSource::Web { uri, .. } | GroundingSource::Maps { uri, .. } => uri,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            GroundingSource::Web { title, .. } | GroundingSource::Maps { title, .. } => title,
        }
    }
}

/// Shape shared by the place search and the fact search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

impl AnalysisResult {
    pub fn without_sources(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }

    /// Apologetic text with nothing to cite: callers show it as an error.
    pub fn is_non_answer(&self) -> bool {
        self.sources.is_empty() && self.text.to_lowercase().contains("sorry")
    }
}

/// Macros pulled out of free text. Best-effort, see `services::nutrition`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionalFacts {
    pub calories: Option<String>,
    pub protein: Option<String>,
    pub carbs: Option<String>,
    pub fat: Option<String>,
}

impl NutritionalFacts {
    pub fn has_any(&self) -> bool {
        self.calories.is_some() || self.protein.is_some() || self.carbs.is_some() || self.fat.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealAnalysis {
    pub analysis: String,
    /// `None` when the text named no macros at all
    pub facts: Option<NutritionalFacts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
    pub level: String,
    pub days: String,
    #[serde(default)]
    pub detailed: bool,
}

/// The single remembered result of the last plan or meal analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CachedResult {
    Plan { text: String, detailed: bool },
    MealAnalysis {
        text: String,
        facts: Option<NutritionalFacts>,
    },
}
