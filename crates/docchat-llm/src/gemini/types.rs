//! Gemini API request/response types (the subset `generateContent` needs).

use serde::{Deserialize, Serialize};

/// Request body for `models/{model}:generateContent`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns; a single user turn here.
    pub contents: Vec<GeminiContent>,
    /// Sampling parameters.
    pub generation_config: GenerationConfig,
}

/// Content message in Gemini API format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    /// The role (`user` or `model`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts.
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// A text part.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiPart {
    /// Part text. Absent for non-text parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Generation config for the Gemini API.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Temperature.
    pub temperature: f64,
    /// Max output tokens.
    pub max_output_tokens: u32,
}

/// Response body of `generateContent`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Response candidates.
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    /// Error object, present on some failures even with a 200 status.
    #[serde(default)]
    pub error: Option<GeminiApiError>,
}

/// A response candidate.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    /// The content of this candidate.
    #[serde(default)]
    pub content: Option<GeminiContent>,
    /// Finish reason (e.g., `STOP`, `MAX_TOKENS`, `SAFETY`).
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Error object in a Gemini response body.
#[derive(Clone, Debug, Deserialize)]
pub struct GeminiApiError {
    /// Numeric code (mirrors HTTP status).
    #[serde(default)]
    pub code: Option<u16>,
    /// Human readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Symbolic status, e.g. `RESOURCE_EXHAUSTED`.
    #[serde(default)]
    pub status: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}
