//! [`GeminiAnswerService`]: non-streaming `generateContent` calls.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use super::types::{
    GeminiContent, GeminiPart, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
};
use crate::errors::{AnswerError, AnswerResult};
use crate::service::AnswerService;

/// Header carrying the API key. Keeps the key out of request URLs.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection and sampling settings for [`GeminiAnswerService`].
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API base URL (no trailing slash).
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// API key; calls fail with [`AnswerError::Auth`] when absent.
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            temperature: 0.7,
            max_output_tokens: 2048,
        }
    }
}

/// Answer service backed by the Gemini API.
pub struct GeminiAnswerService {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiAnswerService {
    /// Create a service with a default HTTP client.
    pub fn new(config: GeminiConfig) -> AnswerResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(config, client))
    }

    /// Create a service with a caller-supplied HTTP client.
    pub fn with_client(config: GeminiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl AnswerService for GeminiAnswerService {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn answer(&self, prompt: &str) -> AnswerResult<String> {
        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(AnswerError::Auth {
                message: "no Gemini API key configured".to_string(),
            });
        };

        debug!(model = %self.config.model, prompt_chars = prompt.chars().count(), "calling generateContent");

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = parse_api_error(&body, status.as_u16());
            error!(status = status.as_u16(), %message, "Gemini API error");
            return Err(AnswerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        if let Some(err) = parsed.error.as_ref() {
            return Err(AnswerError::Api {
                status: err.code.unwrap_or(status.as_u16()),
                message: err
                    .message
                    .clone()
                    .unwrap_or_else(|| "unknown Gemini error".to_string()),
            });
        }

        parsed
            .first_text()
            .map(ToOwned::to_owned)
            .ok_or(AnswerError::EmptyResponse)
    }
}

/// Pull the message out of an error body, falling back to the raw text.
fn parse_api_error(body: &str, status: u16) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| format!("HTTP {status}: {body}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(base_url: &str, api_key: Option<&str>) -> GeminiAnswerService {
        GeminiAnswerService::new(GeminiConfig {
            base_url: base_url.to_string(),
            model: "gemini-test".to_string(),
            api_key: api_key.map(String::from),
            ..GeminiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn returns_first_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "k-123"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "What is the capital?"}]}],
                "generationConfig": {"temperature": 0.7, "maxOutputTokens": 2048}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Paris."}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = service(&server.uri(), Some("k-123"))
            .answer("What is the capital?")
            .await
            .unwrap();
        assert_eq!(answer, "Paris.");
    }

    #[tokio::test]
    async fn non_success_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let err = service(&server.uri(), Some("k")).answer("q").await.unwrap_err();
        assert_matches!(err, AnswerError::Api { status: 429, ref message } if message == "Quota exceeded");
        assert_eq!(err.category(), "rate_limit");
    }

    #[tokio::test]
    async fn no_candidates_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = service(&server.uri(), Some("k")).answer("q").await.unwrap_err();
        assert_matches!(err, AnswerError::EmptyResponse);
    }

    #[tokio::test]
    async fn error_object_in_ok_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": 400, "message": "bad prompt"}
            })))
            .mount(&server)
            .await;

        let err = service(&server.uri(), Some("k")).answer("q").await.unwrap_err();
        assert_matches!(err, AnswerError::Api { status: 400, .. });
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = service(&server.uri(), None).answer("q").await.unwrap_err();
        assert_matches!(err, AnswerError::Auth { .. });
    }

    #[tokio::test]
    async fn unreachable_host_error_hides_api_key() {
        let err = service("http://127.0.0.1:1", Some("SECRETKEY123"))
            .answer("q")
            .await
            .unwrap_err();
        assert_matches!(err, AnswerError::Http(_));
        assert!(!err.to_string().contains("SECRETKEY123"), "{err}");
        assert!(!format!("{err:?}").contains("SECRETKEY123"));
    }

    #[tokio::test]
    async fn api_key_is_not_sent_in_query_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
            })))
            .mount(&server)
            .await;

        let _ = service(&server.uri(), Some("k-123")).answer("q").await.unwrap();
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.query().is_none());
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let svc = service("http://example.test/v1beta/", Some("k"));
        assert_eq!(
            svc.endpoint(),
            "http://example.test/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(svc.model(), "gemini-test");
    }

    #[test]
    fn parse_error_falls_back_to_body() {
        assert_eq!(parse_api_error("oops", 502), "HTTP 502: oops");
        assert_eq!(
            parse_api_error(r#"{"error":{"message":"nope"}}"#, 400),
            "nope"
        );
    }
}
