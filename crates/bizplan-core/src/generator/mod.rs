//! The content-generation collaborator.
//!
//! [`ContentGenerator`] is the capability a language-model backend
//! implements; [`ContentCollaborator`] is what the generation engine holds,
//! with "no backend configured" as a typed state rather than a missing
//! handle.

pub mod analysis;
pub mod gemini;
pub mod prompts;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bizplan_db::models::{OnboardingAnswer, Project};

pub use analysis::{AnalysisOutcome, PlanAnalysis, SectionAnalysis, parse_analysis};
pub use gemini::{GeminiConfig, GeminiGenerator};

/// Placeholder plan stored when no backend is configured.
pub const UNCONFIGURED_PLAN: &str =
    "# Plan Generation Unavailable\n\nNo content generator is configured (missing Gemini API key).";

/// Placeholder summary stored when no backend is configured.
pub const UNCONFIGURED_SUMMARY: &str = "Summary unavailable: no content generator is configured.";

/// Analysis error marker recorded when no backend is configured.
pub const UNCONFIGURED_ANALYSIS: &str = "content generator is not configured";

/// Everything the plan prompt is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationInput {
    pub name: String,
    pub description: String,
    pub sector: String,
    pub business_model: String,
    /// Concatenated `Q:`/`A:` pairs in canonical question order.
    pub answers: String,
}

impl GenerationInput {
    pub fn from_project(project: &Project, answers: &[OnboardingAnswer]) -> Self {
        let answers = answers
            .iter()
            .map(|a| format!("Q: {}\nA: {}\n", a.question, a.answer))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            name: project.name.clone(),
            description: project.description.clone(),
            sector: project.main_sector.clone(),
            business_model: project.business_model.clone(),
            answers,
        }
    }
}

/// Errors from a content-generation backend.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("request to content generator failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("content generator returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("content generator returned no text")]
    EmptyResponse,

    #[error("{call} call timed out after {after:?}")]
    Timeout { call: &'static str, after: Duration },

    #[error("unexpected response from content generator: {0}")]
    Decode(String),
}

/// A language-model backend able to produce the three generation outputs.
///
/// Object-safe so the engine can hold it as `Arc<dyn ContentGenerator>`.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Human-readable backend name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Produce the full plan document in Markdown.
    async fn generate_plan(&self, input: &GenerationInput) -> Result<String, GeneratorError>;

    /// Produce a short executive summary of `plan_markdown`.
    async fn generate_summary(&self, plan_markdown: &str) -> Result<String, GeneratorError>;

    /// Produce the raw structured analysis of `plan_markdown`, expected to
    /// be JSON (possibly fenced). Parsing happens in the collaborator.
    async fn generate_analysis(&self, plan_markdown: &str) -> Result<String, GeneratorError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ContentGenerator) {}
};

/// The collaborator handed to the generation engine.
#[derive(Clone)]
pub enum ContentCollaborator {
    Configured {
        generator: Arc<dyn ContentGenerator>,
        /// Upper bound on each individual call.
        timeout: Duration,
    },
    Unconfigured,
}

impl fmt::Debug for ContentCollaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configured { generator, timeout } => f
                .debug_struct("Configured")
                .field("generator", &generator.name())
                .field("timeout", timeout)
                .finish(),
            Self::Unconfigured => f.write_str("Unconfigured"),
        }
    }
}

impl ContentCollaborator {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn configured(generator: Arc<dyn ContentGenerator>, timeout: Duration) -> Self {
        Self::Configured { generator, timeout }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured { .. })
    }

    pub async fn plan(&self, input: &GenerationInput) -> Result<String, GeneratorError> {
        match self {
            Self::Unconfigured => Ok(UNCONFIGURED_PLAN.to_string()),
            Self::Configured { generator, timeout } => {
                bounded("plan", *timeout, generator.generate_plan(input)).await
            }
        }
    }

    pub async fn summary(&self, plan_markdown: &str) -> Result<String, GeneratorError> {
        match self {
            Self::Unconfigured => Ok(UNCONFIGURED_SUMMARY.to_string()),
            Self::Configured { generator, timeout } => {
                bounded("summary", *timeout, generator.generate_summary(plan_markdown)).await
            }
        }
    }

    /// Request and parse the structured analysis. Unusable output (blank,
    /// undecodable or malformed) is not an error: it comes back as
    /// [`AnalysisOutcome::Failed`]. Transport, API and timeout errors are.
    pub async fn analysis(&self, plan_markdown: &str) -> Result<AnalysisOutcome, GeneratorError> {
        match self {
            Self::Unconfigured => Ok(AnalysisOutcome::Failed {
                error: UNCONFIGURED_ANALYSIS.to_string(),
            }),
            Self::Configured { generator, timeout } => {
                match bounded("analysis", *timeout, generator.generate_analysis(plan_markdown))
                    .await
                {
                    Ok(raw) => Ok(parse_analysis(&raw)),
                    Err(e @ (GeneratorError::EmptyResponse | GeneratorError::Decode(_))) => {
                        tracing::warn!(error = %e, "analysis output unusable");
                        Ok(AnalysisOutcome::Failed {
                            error: e.to_string(),
                        })
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }
}

async fn bounded<F>(call: &'static str, after: Duration, fut: F) -> Result<String, GeneratorError>
where
    F: Future<Output = Result<String, GeneratorError>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| GeneratorError::Timeout { call, after })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizplan_db::models::ProjectStatus;
    use chrono::Utc;
    use uuid::Uuid;

    struct EchoGenerator {
        delay: Duration,
    }

    #[async_trait]
    impl ContentGenerator for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate_plan(&self, input: &GenerationInput) -> Result<String, GeneratorError> {
            tokio::time::sleep(self.delay).await;
            Ok(format!("# {}", input.name))
        }

        async fn generate_summary(&self, plan_markdown: &str) -> Result<String, GeneratorError> {
            Ok(format!("summary of {plan_markdown}"))
        }

        async fn generate_analysis(&self, _plan_markdown: &str) -> Result<String, GeneratorError> {
            Ok("not json".to_string())
        }
    }

    fn project() -> Project {
        Project {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Acme".into(),
            description: "Rockets".into(),
            main_sector: "aerospace".into(),
            business_model: "b2c".into(),
            status: ProjectStatus::Generating,
            generation_attempt: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn answer(question: &str, text: &str) -> OnboardingAnswer {
        OnboardingAnswer {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            question: question.into(),
            answer: text.into(),
            position: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn input_concatenates_answers_in_order() {
        let input = GenerationInput::from_project(
            &project(),
            &[answer("problem", "No rockets"), answer("location", "Lisbon")],
        );
        assert_eq!(input.name, "Acme");
        assert_eq!(input.sector, "aerospace");
        assert_eq!(input.answers, "Q: problem\nA: No rockets\n\nQ: location\nA: Lisbon\n");
    }

    #[test]
    fn input_with_no_answers_is_empty() {
        let input = GenerationInput::from_project(&project(), &[]);
        assert!(input.answers.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_substitutes_placeholders() {
        let collaborator = ContentCollaborator::Unconfigured;
        let input = GenerationInput::from_project(&project(), &[]);

        assert_eq!(collaborator.plan(&input).await.unwrap(), UNCONFIGURED_PLAN);
        assert_eq!(collaborator.summary("x").await.unwrap(), UNCONFIGURED_SUMMARY);
        match collaborator.analysis("x").await.unwrap() {
            AnalysisOutcome::Failed { error } => assert_eq!(error, UNCONFIGURED_ANALYSIS),
            other => panic!("expected failed analysis, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn configured_delegates_and_parses() {
        let collaborator = ContentCollaborator::configured(
            Arc::new(EchoGenerator {
                delay: Duration::ZERO,
            }),
            Duration::from_secs(5),
        );
        let input = GenerationInput::from_project(&project(), &[]);

        let plan = collaborator.plan(&input).await.unwrap();
        assert_eq!(plan, "# Acme");
        assert_eq!(collaborator.summary(&plan).await.unwrap(), "summary of # Acme");
        assert!(matches!(
            collaborator.analysis(&plan).await.unwrap(),
            AnalysisOutcome::Failed { .. }
        ));
    }

    struct BlankAnalysis;

    #[async_trait]
    impl ContentGenerator for BlankAnalysis {
        fn name(&self) -> &str {
            "blank"
        }

        async fn generate_plan(&self, _input: &GenerationInput) -> Result<String, GeneratorError> {
            Ok("# Plan".into())
        }

        async fn generate_summary(&self, _plan_markdown: &str) -> Result<String, GeneratorError> {
            Ok("Summary".into())
        }

        async fn generate_analysis(&self, _plan_markdown: &str) -> Result<String, GeneratorError> {
            Err(GeneratorError::EmptyResponse)
        }
    }

    #[tokio::test]
    async fn blank_analysis_is_a_failed_outcome() {
        let collaborator =
            ContentCollaborator::configured(Arc::new(BlankAnalysis), Duration::from_secs(5));

        match collaborator.analysis("# Plan").await.unwrap() {
            AnalysisOutcome::Failed { error } => assert!(error.contains("no text")),
            other => panic!("expected failed analysis, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let collaborator = ContentCollaborator::configured(
            Arc::new(EchoGenerator {
                delay: Duration::from_secs(30),
            }),
            Duration::from_millis(50),
        );
        let input = GenerationInput::from_project(&project(), &[]);

        let err = collaborator.plan(&input).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Timeout { call: "plan", .. }));
        assert!(err.to_string().starts_with("plan call timed out"));
    }

    #[test]
    fn debug_names_backend() {
        let collaborator = ContentCollaborator::configured(
            Arc::new(EchoGenerator {
                delay: Duration::ZERO,
            }),
            Duration::from_secs(5),
        );
        assert!(format!("{collaborator:?}").contains("echo"));
        assert!(collaborator.is_configured());
        assert!(!ContentCollaborator::Unconfigured.is_configured());
    }
}
