//! Project lifecycle state machine.
//!
//! ```text
//! onboarding -> generating   (complete onboarding)
//! ready      -> generating   (regenerate)
//! generating -> ready        (generation committed)
//! generating -> onboarding   (generation failed)
//! ```
//!
//! Every entry into `generating` bumps the project's generation attempt.
//! Leaving `generating` is guarded by that attempt, so a superseded run can
//! neither publish its results nor revert a newer run's status.

use anyhow::{Context, Result, bail};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use bizplan_db::models::ProjectStatus;
use bizplan_db::queries::projects as db;

use crate::error::ServiceError;

/// Identifies one generation run: the project and the attempt that
/// entered `generating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    pub project_id: Uuid,
    pub attempt: i32,
}

pub struct ProjectLifecycle;

impl ProjectLifecycle {
    /// Check whether `from -> to` is an edge in the lifecycle graph.
    pub fn is_valid_transition(from: ProjectStatus, to: ProjectStatus) -> bool {
        matches!(
            (from, to),
            (ProjectStatus::Onboarding, ProjectStatus::Generating)
                | (ProjectStatus::Ready, ProjectStatus::Generating)
                | (ProjectStatus::Generating, ProjectStatus::Ready)
                | (ProjectStatus::Generating, ProjectStatus::Onboarding)
        )
    }

    /// Every status with an edge into `to`.
    pub fn sources_of(to: ProjectStatus) -> Vec<ProjectStatus> {
        ProjectStatus::ALL
            .into_iter()
            .filter(|from| Self::is_valid_transition(*from, to))
            .collect()
    }

    /// Move an owned project into `generating` and return the ticket of the
    /// new run. The transition is committed before this returns.
    ///
    /// Fails with `NotFound` when the project is missing or not owned by
    /// `user_id`, and with `Conflict` when a run is already in progress.
    pub async fn begin_generation(
        pool: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<GenerationTicket, ServiceError> {
        let sources = Self::sources_of(ProjectStatus::Generating);
        if let Some(project) = db::begin_generation(pool, project_id, user_id, &sources).await? {
            return Ok(GenerationTicket {
                project_id,
                attempt: project.generation_attempt,
            });
        }

        match db::get_owned_project(pool, project_id, user_id).await? {
            None => Err(ServiceError::NotFound("project")),
            Some(project) => Err(ServiceError::Conflict(format!(
                "project is {}, plan generation cannot start",
                project.status
            ))),
        }
    }

    /// Leave `generating` for `to` if `ticket` is still the current run.
    /// Returns `false` when the run was superseded.
    pub async fn finish_generation(
        conn: &mut PgConnection,
        ticket: GenerationTicket,
        to: ProjectStatus,
    ) -> Result<bool> {
        if !Self::is_valid_transition(ProjectStatus::Generating, to) {
            bail!(
                "invalid state transition: {} -> {} for project {}",
                ProjectStatus::Generating,
                to,
                ticket.project_id
            );
        }

        let rows = db::finish_generation(conn, ticket.project_id, ticket.attempt, to)
            .await
            .with_context(|| {
                format!(
                    "failed to move project {} from generating to {}",
                    ticket.project_id, to
                )
            })?;

        Ok(rows > 0)
    }

    /// Whether `ticket` is still the current run of its project. Locks the
    /// project row until the caller's transaction ends.
    pub async fn lock_current(conn: &mut PgConnection, ticket: GenerationTicket) -> Result<bool> {
        let state = db::lock_generation_state(conn, ticket.project_id).await?;
        Ok(matches!(
            state,
            Some((ProjectStatus::Generating, attempt)) if attempt == ticket.attempt
        ))
    }
}
