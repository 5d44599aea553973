//! [`ContentGenerator`] backed by the Gemini `generateContent` REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompts;
use super::{ContentGenerator, GenerationInput, GeneratorError};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the Gemini API.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct GeminiGenerator {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    /// Send one prompt and return the concatenated text of the first
    /// candidate.
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        debug!(model = %self.config.model, prompt_len = prompt.len(), "sending generateContent request");
        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| GeneratorError::Decode(e.to_string()))?;

        let output: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if output.trim().is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }
        Ok(output)
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_plan(&self, input: &GenerationInput) -> Result<String, GeneratorError> {
        self.generate(&prompts::plan_prompt(input)).await
    }

    async fn generate_summary(&self, plan_markdown: &str) -> Result<String, GeneratorError> {
        self.generate(&prompts::summary_prompt(plan_markdown)).await
    }

    async fn generate_analysis(&self, plan_markdown: &str) -> Result<String, GeneratorError> {
        self.generate(&prompts::analysis_prompt(plan_markdown)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{AnalysisOutcome, ContentCollaborator};
    use mockito::Matcher;
    use std::sync::Arc;

    const PATH: &str = "/models/gemini-2.5-flash:generateContent";

    fn generator(server: &mockito::ServerGuard) -> GeminiGenerator {
        let config = GeminiConfig {
            base_url: server.url(),
            ..GeminiConfig::new("test-key")
        };
        GeminiGenerator::new(config).unwrap()
    }

    fn reply(text: &str) -> String {
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn returns_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::Regex("BUSINESS PLAN:\\\\n# Plan".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply("A concise summary."))
            .create_async()
            .await;

        let text = generator(&server).generate_summary("# Plan").await.unwrap();
        assert_eq!(text, "A concise summary.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn joins_multiple_parts() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "# Plan\n"}, {"text": "More"}]}}]
        });
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let text = generator(&server).generate_analysis("x").await.unwrap();
        assert_eq!(text, "# Plan\nMore");
    }

    #[tokio::test]
    async fn api_error_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(400)
            .with_body(r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#)
            .create_async()
            .await;

        let err = generator(&server).generate_summary("x").await.unwrap_err();
        match err {
            GeneratorError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid.");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_is_kept_verbatim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let err = generator(&server).generate_summary("x").await.unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::Api { status: 503, ref message } if message == "upstream unavailable"
        ));
    }

    #[tokio::test]
    async fn empty_candidates_are_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let err = generator(&server).generate_summary("x").await.unwrap_err();
        assert!(matches!(err, GeneratorError::EmptyResponse));
    }

    #[tokio::test]
    async fn whitespace_analysis_reply_becomes_failed_outcome() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(reply("  "))
            .create_async()
            .await;

        let collaborator =
            ContentCollaborator::configured(Arc::new(generator(&server)), Duration::from_secs(5));
        let outcome = collaborator.analysis("# plan").await.unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn garbage_success_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let err = generator(&server).generate_summary("x").await.unwrap_err();
        assert!(matches!(err, GeneratorError::Decode(_)));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let config = GeminiConfig {
            base_url: "http://localhost:1234/v1beta/".into(),
            ..GeminiConfig::new("k")
        };
        assert_eq!(
            config.endpoint(),
            "http://localhost:1234/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", GeminiConfig::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }
}
