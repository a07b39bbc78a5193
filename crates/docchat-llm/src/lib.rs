//! # docchat-llm
//!
//! The answer service: text prompt in, text answer out.
//!
//! - **[`AnswerService`]**: the collaborator trait the query pipeline calls
//! - **[`AnswerError`]**: typed failures with a metrics-friendly `category()`
//! - **[`gemini`]**: `generateContent` client for the Gemini API

#![deny(unsafe_code)]

pub mod errors;
pub mod gemini;
pub mod service;

pub use errors::{AnswerError, AnswerResult};
pub use gemini::{GeminiAnswerService, GeminiConfig};
pub use service::AnswerService;
