//! The answer service collaborator trait.

use async_trait::async_trait;

use crate::errors::AnswerResult;

/// Stateless `answer(prompt) -> text` call to a language model.
///
/// Implementors must be `Send + Sync`; one instance is shared by every
/// in-flight query. Callers bound each call with their own timeout.
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    /// Generate an answer for `prompt`.
    async fn answer(&self, prompt: &str) -> AnswerResult<String>;
}
