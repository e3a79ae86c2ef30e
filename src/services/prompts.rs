use crate::models::PlanRequest;

// Model choice per use case
pub const MEAL_ANALYSIS_MODEL: &str = "gemini-2.5-flash";
pub const PROMPT_SUGGESTION_MODEL: &str = "gemini-2.5-flash-lite";
pub const DETAILED_PLAN_MODEL: &str = "gemini-2.5-pro";
pub const QUICK_PLAN_MODEL: &str = "gemini-2.5-flash-lite";
pub const CHAT_MODEL: &str = "gemini-2.5-flash";
pub const GROUNDED_MODEL: &str = "gemini-2.5-flash";
pub const SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";

pub const DETAILED_PLAN_THINKING_BUDGET: u32 = 32768;
pub const SPEECH_VOICE: &str = "Kore";
pub const SPEECH_PREFIX: &str = "Say with a clear and encouraging tone: ";

pub const DEFAULT_MEAL_PROMPT: &str =
    "Estimate the calories and macronutrients for this meal, and provide a general health analysis.";

pub const MEAL_SUGGESTION_PROMPT: &str = "Analyze this image of a meal. Based on what you see, suggest one creative and specific question a user could ask about it. For example, instead of 'Is this healthy?', suggest something like 'What specific vitamins am I getting from the greens in this dish?' or 'Could this meal be adapted for a vegan diet?'. Return only the suggested question as a single line of plain text, without any preamble or quotation marks.";

pub const EMPTY_ANALYSIS_MESSAGE: &str = "The model returned an empty response. This might be due to my safety guidelines. Could you try a different image or prompt?";
pub const EMPTY_SUGGESTION_MESSAGE: &str = "The model could not generate a suggestion for this image. This might be due to my safety guidelines. Could you try a different image?";

pub const CHAT_GREETING: &str =
    "Hello! I'm FitAI, your personal fitness coach. How can I help you today?";

/// System instruction bound to the chat session when it is created.
pub const CONCIERGE_PERSONA: &str = r#"You are "Genius Concierge," a world-class AI fitness and wellness assistant for the FitAI app. Your personality is Encouraging, Professional, and Clear.

**Your Core Mandate:**
1.  **Be Empathetic & Encouraging:** Acknowledge the user's goals and feelings. Use a warm, supportive, and motivating tone. Your goal is to be a trusted coach.
2.  **Be Professional & Clear:** Provide concise, easy-to-understand information. Avoid jargon.
3.  **Be Proactive & Resilient (Conversational Fallbacks):**
    *   **Ambiguity Resolution:** If a user's query is vague (e.g., "show me my plan"), YOU MUST ask for clarification ("Of course! Are you looking for your Workout Plan or your Nutrition Plan?").
    *   **Typo Correction:** If you suspect a misspelling, suggest the correction politely (e.g., User: "I want to book a phisiotherapist." You: "I can help with that! Did you mean to 'book a physiotherapist'?").
    *   **Graceful No:** If you cannot fulfill a request, explain why in simple terms and suggest a viable alternative. Never just say "I can't do that."
4.  **Vary Your Responses:** Do not use the same greeting or acknowledgment every time. Use a natural mix of phrases like "Got it," "On it," "Let's take a look," "Perfect," "You got it," "I can certainly help with that."

**Safety First (Non-Negotiable):**
ALWAYS include a gentle reminder for users to consult with a healthcare professional or certified trainer for personalized medical advice, especially before starting a new, strenuous fitness program. YOU MUST NOT provide medical diagnoses or advice that could be interpreted as such.

**Example Interaction:**
User: "I wnat to lose some wight"
You: "That's a great goal, and I'm here to help you on that journey! Did you mean you want to 'lose some weight'?"

Begin the conversation now."#;

pub fn plan_model(detailed: bool) -> &'static str {
    if detailed {
        DETAILED_PLAN_MODEL
    } else {
        QUICK_PLAN_MODEL
    }
}

pub fn compose_plan_prompt(request: &PlanRequest) -> String {
    let depth = if request.detailed {
        "highly detailed and comprehensive"
    } else {
        "quick and simple"
    };

    format!(
        "Create a {} fitness and nutrition plan for a {} individual whose goal is to {}. \
         The plan should be for {} days a week. \
         Provide specific exercises, sets, reps, and meal suggestions. \
         Format the response nicely using markdown.",
        depth,
        request.level.trim(),
        request.goal.trim(),
        request.days.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_plan_prompt() {
        let request = PlanRequest {
            goal: "lose weight".to_string(),
            level: "beginner".to_string(),
            days: "3".to_string(),
            detailed: false,
        };

        let prompt = compose_plan_prompt(&request);

        assert!(prompt.starts_with("Create a quick and simple fitness and nutrition plan"));
        assert!(prompt.contains("for a beginner individual whose goal is to lose weight."));
        assert!(prompt.contains("for 3 days a week."));
        assert!(prompt.ends_with("Format the response nicely using markdown."));
    }

    #[test]
    fn test_detailed_plan_uses_larger_model() {
        let request = PlanRequest {
            goal: "build muscle".to_string(),
            level: "advanced".to_string(),
            days: "5".to_string(),
            detailed: true,
        };

        assert!(compose_plan_prompt(&request).contains("highly detailed and comprehensive"));
        assert_eq!(plan_model(true), DETAILED_PLAN_MODEL);
        assert_eq!(plan_model(false), QUICK_PLAN_MODEL);
    }

    #[test]
    fn test_persona_carries_safety_disclaimer() {
        assert!(CONCIERGE_PERSONA.contains("consult with a healthcare professional"));
        assert!(EMPTY_ANALYSIS_MESSAGE.contains("safety guidelines"));
        assert!(EMPTY_SUGGESTION_MESSAGE.contains("safety guidelines"));
    }
}
