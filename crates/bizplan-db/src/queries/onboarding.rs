//! Database query functions for the `onboarding_answers` table.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::OnboardingAnswer;

/// List all answers for a project in canonical question order.
pub async fn list_answers(pool: &PgPool, project_id: Uuid) -> Result<Vec<OnboardingAnswer>> {
    let answers = sqlx::query_as::<_, OnboardingAnswer>(
        "SELECT * FROM onboarding_answers \
         WHERE project_id = $1 \
         ORDER BY position ASC, question ASC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .context("failed to list onboarding answers")?;

    Ok(answers)
}

/// Insert or overwrite the answer for `(project_id, question)`.
pub async fn upsert_answer(
    conn: &mut PgConnection,
    project_id: Uuid,
    question: &str,
    answer: &str,
    position: i32,
) -> Result<OnboardingAnswer> {
    let row = sqlx::query_as::<_, OnboardingAnswer>(
        "INSERT INTO onboarding_answers (project_id, question, answer, position) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (project_id, question) \
         DO UPDATE SET answer = EXCLUDED.answer, updated_at = now() \
         RETURNING *",
    )
    .bind(project_id)
    .bind(question)
    .bind(answer)
    .bind(position)
    .fetch_one(conn)
    .await
    .context("failed to upsert onboarding answer")?;

    Ok(row)
}

/// Overwrite the answer for an existing `(project_id, question)` row.
///
/// This is a strict update: returns `None` when no such row exists rather
/// than creating one.
pub async fn update_answer(
    pool: &PgPool,
    project_id: Uuid,
    question: &str,
    answer: &str,
) -> Result<Option<OnboardingAnswer>> {
    let row = sqlx::query_as::<_, OnboardingAnswer>(
        "UPDATE onboarding_answers \
         SET answer = $1, updated_at = now() \
         WHERE project_id = $2 AND question = $3 \
         RETURNING *",
    )
    .bind(answer)
    .bind(project_id)
    .bind(question)
    .fetch_optional(pool)
    .await
    .context("failed to update onboarding answer")?;

    Ok(row)
}

/// Blank every answer of a project, keeping the rows.
pub async fn reset_answers(conn: &mut PgConnection, project_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE onboarding_answers SET answer = '', updated_at = now() WHERE project_id = $1",
    )
    .bind(project_id)
    .execute(conn)
    .await
    .context("failed to reset onboarding answers")?;

    Ok(result.rows_affected())
}
