use anyhow::Context;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use bizplan_db::models::{ONBOARDING_QUESTIONS, OnboardingAnswer, onboarding_question_position};
use bizplan_db::queries::onboarding as db;

use super::projects::ProjectService;
use crate::error::ServiceError;

/// One submitted answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnswerInput {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone)]
pub struct OnboardingService {
    pool: PgPool,
    projects: ProjectService,
}

impl OnboardingService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            projects: ProjectService::new(pool.clone()),
            pool,
        }
    }

    /// The canonical question labels, in presentation order.
    pub fn questions() -> &'static [&'static str] {
        &ONBOARDING_QUESTIONS
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<OnboardingAnswer>, ServiceError> {
        self.projects.require_owned(user_id, project_id).await?;
        Ok(db::list_answers(&self.pool, project_id).await?)
    }

    /// Write each submitted answer over its label. Labels not in the
    /// payload keep their current answer. Returns the rows written.
    pub async fn submit(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        answers: &[AnswerInput],
    ) -> Result<Vec<OnboardingAnswer>, ServiceError> {
        self.projects.require_owned(user_id, project_id).await?;
        let positions = canonical_positions(answers)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        let mut written = Vec::with_capacity(answers.len());
        for (input, position) in answers.iter().zip(positions) {
            let row =
                db::upsert_answer(&mut *tx, project_id, &input.question, &input.answer, position)
                    .await?;
            written.push(row);
        }
        tx.commit().await.context("failed to commit answers")?;

        tracing::info!(project_id = %project_id, count = written.len(), "onboarding answers submitted");
        Ok(written)
    }

    /// Blank every answer, then apply the payload, atomically. Returns the
    /// full answer set afterwards.
    pub async fn replace(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        answers: &[AnswerInput],
    ) -> Result<Vec<OnboardingAnswer>, ServiceError> {
        self.projects.require_owned(user_id, project_id).await?;
        let positions = canonical_positions(answers)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        db::reset_answers(&mut *tx, project_id).await?;
        for (input, position) in answers.iter().zip(positions) {
            db::upsert_answer(&mut *tx, project_id, &input.question, &input.answer, position)
                .await?;
        }
        tx.commit().await.context("failed to commit answers")?;

        tracing::info!(project_id = %project_id, count = answers.len(), "onboarding answers replaced");
        Ok(db::list_answers(&self.pool, project_id).await?)
    }

    /// Overwrite the answer to one existing label. Never creates a row.
    pub async fn update_answer(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        label: &str,
        answer: &str,
    ) -> Result<OnboardingAnswer, ServiceError> {
        self.projects.require_owned(user_id, project_id).await?;
        db::update_answer(&self.pool, project_id, label, answer)
            .await?
            .ok_or(ServiceError::NotFound("onboarding answer"))
    }
}

fn canonical_positions(answers: &[AnswerInput]) -> Result<Vec<i32>, ServiceError> {
    answers
        .iter()
        .map(|a| {
            onboarding_question_position(&a.question).ok_or_else(|| {
                ServiceError::Validation(format!("unknown onboarding question: {:?}", a.question))
            })
        })
        .collect()
}
