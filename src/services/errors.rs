//! Turns any failure on the provider path into a message safe to show a user.
//!
//! Structured provider errors are classified by code first. Anything else is
//! matched on well-known substrings of its message chain, and whatever is left
//! gets the generic fallback naming the action that failed.

use thiserror::Error;

use super::gemini::ProviderError;

const API_KEY_MARKER: &str = "API key not valid";
const CONTENT_RESTRICTIONS_MARKER: &str = "content restrictions";
const TIMEOUT_MARKER: &str = "timed out";

pub const CONFIGURATION_MESSAGE: &str = "There seems to be an issue with our system's configuration. Our team has been notified and is working on a fix.";
pub const POLICY_DECLINED_MESSAGE: &str = "I'm sorry, I can't provide a response for that request due to my safety guidelines. Could you please try a different topic?";
pub const TIMEOUT_MESSAGE: &str = "The request is taking longer than expected. Please check your connection or try simplifying your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    PolicyDeclined,
    Timeout,
    EmptyResponse,
    Unknown,
}

/// A classified failure. `Display` is the user-facing message and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
}

pub fn fallback_message(context: &str) -> String {
    format!(
        "Oops! We had a little trouble {}. Please check your connection and try again in a moment. If the problem continues, please contact our support team.",
        context
    )
}

fn kind_from_message(message: &str) -> ErrorKind {
    if message.contains(API_KEY_MARKER) {
        ErrorKind::Configuration
    } else if message.contains(CONTENT_RESTRICTIONS_MARKER) {
        ErrorKind::PolicyDeclined
    } else if message.contains(TIMEOUT_MARKER) {
        ErrorKind::Timeout
    } else {
        ErrorKind::Unknown
    }
}

pub fn classify_error(error: &anyhow::Error, context: &str) -> GatewayError {
    let provider = error.chain().find_map(|cause| cause.downcast_ref::<ProviderError>());

    if let Some(ProviderError::EmptyResponse(message)) = provider {
        return GatewayError {
            kind: ErrorKind::EmptyResponse,
            message: message.clone(),
        };
    }

    let kind = provider
        .and_then(ProviderError::kind)
        .unwrap_or_else(|| kind_from_message(&format!("{:#}", error)));

    let message = match kind {
        ErrorKind::Configuration => CONFIGURATION_MESSAGE.to_string(),
        ErrorKind::PolicyDeclined => POLICY_DECLINED_MESSAGE.to_string(),
        ErrorKind::Timeout => TIMEOUT_MESSAGE.to_string(),
        // Only reachable through ProviderError::EmptyResponse, handled above
        ErrorKind::EmptyResponse | ErrorKind::Unknown => fallback_message(context),
    };

    GatewayError { kind, message }
}

/// `context` is a short phrase for the attempted action, e.g. "analyzing your meal".
pub fn classify(error: &anyhow::Error, context: &str) -> String {
    classify_error(error, context).message
}
