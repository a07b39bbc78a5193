//! Query pipeline and answer model settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Context assembly and model-call bounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Hard cap, in characters, on the document context put into a prompt.
    pub context_char_cap: usize,
    /// Deadline for one answer model call.
    pub answer_timeout_ms: u64,
    /// Maximum chunk size used when ingesting uploads.
    pub chunk_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            context_char_cap: 24_000,
            answer_timeout_ms: 60_000,
            chunk_size: 1000,
        }
    }
}

impl PipelineSettings {
    /// Answer deadline as a [`Duration`].
    #[must_use]
    pub fn answer_timeout(&self) -> Duration {
        Duration::from_millis(self.answer_timeout_ms)
    }
}

/// Gemini answer model settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerSettings {
    /// API base URL (without trailing slash).
    pub base_url: String,
    /// Model name used in `models/{model}:generateContent`.
    pub model: String,
    /// API key. Read from the file or environment, never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            temperature: 0.7,
            max_output_tokens: 2048,
        }
    }
}
