//! Request-path services, one per resource.
//!
//! Every project-scoped operation resolves the project through
//! [`projects::ProjectService::require_owned`] first, so a project that
//! exists but belongs to someone else is reported exactly like a missing
//! one.

pub mod auth;
pub mod consulting;
pub mod onboarding;
pub mod plans;
pub mod projects;

pub use auth::{AccessToken, AuthService};
pub use consulting::ConsultingService;
pub use onboarding::{AnswerInput, OnboardingService};
pub use plans::{PlanService, PlanWithSections};
pub use projects::ProjectService;
