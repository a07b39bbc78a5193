//! Gemini `generateContent` client.

mod provider;
pub mod types;

pub use provider::{GeminiAnswerService, GeminiConfig};
