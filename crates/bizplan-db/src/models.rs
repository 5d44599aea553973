use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// The ten fixed onboarding question labels, in presentation order.
///
/// Every project is created with one (empty) answer row per label.
pub const ONBOARDING_QUESTIONS: [&str; 10] = [
    "problem",
    "proposed_solution",
    "product_stage",
    "value_proposition",
    "competitive_advantage",
    "team_structure",
    "key_roles",
    "location",
    "available_capital",
    "cost_structure",
];

/// Position of a canonical label within [`ONBOARDING_QUESTIONS`].
pub fn onboarding_question_position(label: &str) -> Option<i32> {
    ONBOARDING_QUESTIONS
        .iter()
        .position(|q| *q == label)
        .map(|p| p as i32)
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Onboarding,
    Generating,
    Ready,
}

impl ProjectStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ProjectStatus; 3] = [Self::Onboarding, Self::Generating, Self::Ready];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onboarding => "onboarding",
            Self::Generating => "generating",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = ProjectStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onboarding" => Ok(Self::Onboarding),
            "generating" => Ok(Self::Generating),
            "ready" => Ok(Self::Ready),
            other => Err(ProjectStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ProjectStatus`] string.
#[derive(Debug, Clone)]
pub struct ProjectStatusParseError(pub String);

impl fmt::Display for ProjectStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid project status: {:?}", self.0)
    }
}

impl std::error::Error for ProjectStatusParseError {}

// ---------------------------------------------------------------------------

/// Access tier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Free,
    Premium,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Free => "free",
            Self::Premium => "premium",
        };
        f.write_str(s)
    }
}

impl FromStr for AccessLevel {
    type Err = AccessLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => Err(AccessLevelParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`AccessLevel`] string.
#[derive(Debug, Clone)]
pub struct AccessLevelParseError(pub String);

impl fmt::Display for AccessLevelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid access level: {:?}", self.0)
    }
}

impl std::error::Error for AccessLevelParseError {}

// ---------------------------------------------------------------------------

/// Status of a consulting request. Only `pending` exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConsultingStatus {
    Pending,
}

impl fmt::Display for ConsultingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
        }
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub access_level: AccessLevel,
    pub created_at: DateTime<Utc>,
}

/// A business venture owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub main_sector: String,
    pub business_model: String,
    pub status: ProjectStatus,
    /// Incremented on every entry into `generating`; a generation run only
    /// commits while its attempt is still the current one.
    #[serde(skip_serializing)]
    pub generation_attempt: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One answer to a canonical onboarding question.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OnboardingAnswer {
    pub id: Uuid,
    pub project_id: Uuid,
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing)]
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The generated plan for a project (at most one per project).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessPlan {
    pub id: Uuid,
    pub project_id: Uuid,
    pub content_markdown: String,
    pub executive_summary: String,
    pub overall_score: Option<i32>,
    /// Set when the structured analysis could not be produced.
    pub analysis_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scored evaluation of one plan section.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanSectionAnalysis {
    pub id: Uuid,
    pub business_plan_id: Uuid,
    pub position: i32,
    pub section_name: String,
    pub score: Option<i32>,
    pub suggestions: Vec<String>,
}

/// A request to schedule a consulting session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsultingRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    #[serde(rename = "type")]
    pub request_type: String,
    pub objective: String,
    pub meeting_link: Option<String>,
    pub status: ConsultingStatus,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
