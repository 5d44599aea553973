//! Plan generation engine.
//!
//! A run is started by [`PlanGenerationEngine::complete_onboarding`], which
//! commits the `generating` transition and returns immediately. The run
//! itself executes on its own task with its own database connections:
//!
//! 1. Reload the project and its ordered onboarding answers.
//! 2. Ask the collaborator for the plan, then the summary and analysis of it.
//! 3. In one transaction: confirm the run is still current, upsert the plan,
//!    replace its sections, flip the project to `ready`.
//! 4. Enqueue a "plan ready" notification.
//!
//! Any failure in steps 1-3 reverts the project to `onboarding` (if the run
//! is still current) and is logged; it never reaches a caller.

use anyhow::Context;
use sqlx::PgPool;
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use bizplan_db::models::ProjectStatus;
use bizplan_db::queries::business_plans::{self, NewPlanContent, NewSection};
use bizplan_db::queries::{onboarding, projects, users};

use crate::error::ServiceError;
use crate::generator::{AnalysisOutcome, ContentCollaborator, GenerationInput, GeneratorError};
use crate::lifecycle::{GenerationTicket, ProjectLifecycle};
use crate::notify::{Notification, NotificationDispatcher};

/// Failure inside a generation run. Contained by the worker.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("project {0} no longer exists")]
    ProjectMissing(Uuid),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// How a generation run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Results were committed and the project is `ready`.
    Ready { plan_id: Uuid, sections: usize },
    /// A newer run took over; this run's results were discarded.
    Superseded,
    /// The run failed and the project was returned to `onboarding`.
    Reverted { error: String },
}

/// Handle to a spawned generation run.
#[derive(Debug)]
pub struct GenerationHandle {
    pub ticket: GenerationTicket,
    join: JoinHandle<GenerationOutcome>,
}

impl GenerationHandle {
    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<GenerationOutcome, JoinError> {
        self.join.await
    }
}

struct StoredPlan {
    plan_id: Uuid,
    sections: usize,
    user_id: Uuid,
    project_name: String,
}

#[derive(Debug, Clone)]
pub struct PlanGenerationEngine {
    pool: PgPool,
    collaborator: ContentCollaborator,
    notifier: NotificationDispatcher,
}

impl PlanGenerationEngine {
    pub fn new(
        pool: PgPool,
        collaborator: ContentCollaborator,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            pool,
            collaborator,
            notifier,
        }
    }

    /// Commit the `generating` transition for an owned project and start a
    /// run in the background.
    pub async fn complete_onboarding(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<GenerationHandle, ServiceError> {
        let ticket = ProjectLifecycle::begin_generation(&self.pool, project_id, user_id).await?;
        tracing::info!(
            project_id = %project_id,
            attempt = ticket.attempt,
            "plan generation started"
        );
        Ok(self.spawn_generation(ticket))
    }

    /// Run generation for `ticket` on a new task.
    pub fn spawn_generation(&self, ticket: GenerationTicket) -> GenerationHandle {
        let engine = self.clone();
        let join = tokio::spawn(async move { engine.run_generation(ticket).await });
        GenerationHandle { ticket, join }
    }

    /// Execute one generation run to completion, containing every failure.
    pub async fn run_generation(&self, ticket: GenerationTicket) -> GenerationOutcome {
        let project_id = ticket.project_id;

        let error = match self.generate_and_store(ticket).await {
            Ok(Some(stored)) => {
                tracing::info!(
                    project_id = %project_id,
                    attempt = ticket.attempt,
                    plan_id = %stored.plan_id,
                    sections = stored.sections,
                    "plan generation finished, project ready"
                );
                self.notify_ready(project_id, &stored).await;
                return GenerationOutcome::Ready {
                    plan_id: stored.plan_id,
                    sections: stored.sections,
                };
            }
            Ok(None) => {
                tracing::info!(
                    project_id = %project_id,
                    attempt = ticket.attempt,
                    "generation attempt superseded, discarding results"
                );
                return GenerationOutcome::Superseded;
            }
            Err(e) => e,
        };

        tracing::error!(
            project_id = %project_id,
            attempt = ticket.attempt,
            error = %error,
            "plan generation failed"
        );

        match self.revert(ticket).await {
            Ok(true) => {
                tracing::warn!(project_id = %project_id, "project returned to onboarding");
                GenerationOutcome::Reverted {
                    error: error.to_string(),
                }
            }
            Ok(false) => {
                tracing::info!(
                    project_id = %project_id,
                    attempt = ticket.attempt,
                    "failed attempt already superseded, leaving status alone"
                );
                GenerationOutcome::Superseded
            }
            Err(revert_err) => {
                tracing::error!(
                    project_id = %project_id,
                    error = %revert_err,
                    "failed to revert project status after generation failure"
                );
                GenerationOutcome::Reverted {
                    error: error.to_string(),
                }
            }
        }
    }

    async fn generate_and_store(
        &self,
        ticket: GenerationTicket,
    ) -> Result<Option<StoredPlan>, GenerationError> {
        let project_id = ticket.project_id;

        let project = projects::get_project(&self.pool, project_id)
            .await?
            .ok_or(GenerationError::ProjectMissing(project_id))?;
        let answers = onboarding::list_answers(&self.pool, project_id).await?;
        let input = GenerationInput::from_project(&project, &answers);

        tracing::info!(project_id = %project_id, answers = answers.len(), "requesting plan");
        let markdown = self.collaborator.plan(&input).await?;

        tracing::info!(project_id = %project_id, "requesting executive summary");
        let summary = self.collaborator.summary(&markdown).await?;

        tracing::info!(project_id = %project_id, "requesting analysis");
        let analysis = self.collaborator.analysis(&markdown).await?;
        if let AnalysisOutcome::Failed { error } = &analysis {
            tracing::warn!(
                project_id = %project_id,
                error = %error,
                "analysis unavailable, storing plan without sections"
            );
        }

        let sections: Vec<NewSection> = analysis
            .sections()
            .iter()
            .map(|s| NewSection {
                section_name: s.section_name.clone(),
                score: s.score,
                suggestions: s.suggestions.clone(),
            })
            .collect();

        tracing::info!(project_id = %project_id, sections = sections.len(), "saving plan");
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin plan transaction")?;

        if !ProjectLifecycle::lock_current(&mut *tx, ticket).await? {
            tx.rollback()
                .await
                .context("failed to roll back superseded plan transaction")?;
            return Ok(None);
        }

        let plan = business_plans::upsert_plan(
            &mut *tx,
            project_id,
            &NewPlanContent {
                content_markdown: &markdown,
                executive_summary: &summary,
                overall_score: analysis.overall_score(),
                analysis_error: analysis.error(),
            },
        )
        .await?;
        business_plans::replace_sections(&mut *tx, plan.id, &sections).await?;

        if !ProjectLifecycle::finish_generation(&mut *tx, ticket, ProjectStatus::Ready).await? {
            return Err(anyhow::anyhow!(
                "project {project_id} left generating while its row was locked"
            )
            .into());
        }

        tx.commit().await.context("failed to commit plan")?;

        Ok(Some(StoredPlan {
            plan_id: plan.id,
            sections: sections.len(),
            user_id: project.user_id,
            project_name: project.name,
        }))
    }

    async fn revert(&self, ticket: GenerationTicket) -> anyhow::Result<bool> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection for status revert")?;
        ProjectLifecycle::finish_generation(&mut *conn, ticket, ProjectStatus::Onboarding).await
    }

    async fn notify_ready(&self, project_id: Uuid, stored: &StoredPlan) {
        match users::get_user(&self.pool, stored.user_id).await {
            Ok(Some(owner)) => {
                tracing::info!(project_id = %project_id, user_id = %owner.id, "enqueueing plan-ready email");
                self.notifier.dispatch(Notification::PlanReady {
                    email: owner.email,
                    project_id,
                    project_name: stored.project_name.clone(),
                });
            }
            Ok(None) => {
                tracing::warn!(project_id = %project_id, "project owner vanished, no notification sent");
            }
            Err(e) => {
                tracing::warn!(
                    project_id = %project_id,
                    error = %e,
                    "failed to load project owner, no notification sent"
                );
            }
        }
    }
}
