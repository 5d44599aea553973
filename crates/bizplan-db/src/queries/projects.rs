//! Database query functions for the `projects` table, including the status
//! transitions used by plan generation.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{ONBOARDING_QUESTIONS, Project, ProjectStatus};

/// Fields supplied when creating a project.
#[derive(Debug, Clone)]
pub struct NewProject<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub main_sector: &'a str,
    pub business_model: &'a str,
}

/// Partial update of a project's descriptive fields. `None` leaves the
/// column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProjectChanges<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub main_sector: Option<&'a str>,
    pub business_model: Option<&'a str>,
}

/// Insert a project in `onboarding` status together with one empty answer
/// row per canonical onboarding question, in a single transaction.
///
/// A duplicate `(user_id, name)` surfaces as a unique violation.
pub async fn insert_project_with_answers(
    pool: &PgPool,
    user_id: Uuid,
    project: &NewProject<'_>,
) -> Result<Project> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let row = sqlx::query_as::<_, Project>(
        "INSERT INTO projects (user_id, name, description, main_sector, business_model) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(project.name)
    .bind(project.description)
    .bind(project.main_sector)
    .bind(project.business_model)
    .fetch_one(&mut *tx)
    .await
    .context("failed to insert project")?;

    let questions: Vec<String> = ONBOARDING_QUESTIONS.iter().map(|q| q.to_string()).collect();
    let positions: Vec<i32> = (0..questions.len() as i32).collect();
    sqlx::query(
        "INSERT INTO onboarding_answers (project_id, question, answer, position) \
         SELECT $1, q, '', p FROM UNNEST($2::text[], $3::int[]) AS t(q, p)",
    )
    .bind(row.id)
    .bind(&questions)
    .bind(&positions)
    .execute(&mut *tx)
    .await
    .context("failed to seed onboarding answers")?;

    tx.commit().await.context("failed to commit project")?;
    Ok(row)
}

/// Fetch a project by ID regardless of owner.
pub async fn get_project(pool: &PgPool, id: Uuid) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch project")?;

    Ok(project)
}

/// Fetch a project only if it belongs to `user_id`.
pub async fn get_owned_project(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Project>> {
    let project =
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch project")?;

    Ok(project)
}

/// List a user's projects, newest first.
pub async fn list_projects_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Project>> {
    let projects = sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list projects")?;

    Ok(projects)
}

/// Apply descriptive changes to an owned project. Returns `None` if the
/// project does not exist or is not owned by `user_id`.
pub async fn update_project_details(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    changes: &ProjectChanges<'_>,
) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>(
        "UPDATE projects \
         SET name = COALESCE($1, name), \
             description = COALESCE($2, description), \
             main_sector = COALESCE($3, main_sector), \
             business_model = COALESCE($4, business_model), \
             updated_at = now() \
         WHERE id = $5 AND user_id = $6 \
         RETURNING *",
    )
    .bind(changes.name)
    .bind(changes.description)
    .bind(changes.main_sector)
    .bind(changes.business_model)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to update project")?;

    Ok(project)
}

/// Delete an owned project (answers, plan and sections cascade). Returns
/// `true` if a row was removed.
pub async fn delete_project(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("failed to delete project")?;

    Ok(result.rows_affected() > 0)
}

// -----------------------------------------------------------------------
// Generation lifecycle
// -----------------------------------------------------------------------

/// Move an owned project into `generating` and bump its generation attempt,
/// provided its current status is one of `from`.
///
/// Returns the updated project, or `None` when the project is missing, not
/// owned by `user_id`, or in a status outside `from`.
pub async fn begin_generation(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    from: &[ProjectStatus],
) -> Result<Option<Project>> {
    let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
    let project = sqlx::query_as::<_, Project>(
        "UPDATE projects \
         SET status = 'generating', \
             generation_attempt = generation_attempt + 1, \
             updated_at = now() \
         WHERE id = $1 AND user_id = $2 AND status = ANY($3) \
         RETURNING *",
    )
    .bind(id)
    .bind(user_id)
    .bind(&from)
    .fetch_optional(pool)
    .await
    .context("failed to begin generation")?;

    Ok(project)
}

/// Lock a project row for the rest of the caller's transaction and return
/// its current status and generation attempt.
pub async fn lock_generation_state(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<(ProjectStatus, i32)>> {
    let row: Option<(ProjectStatus, i32)> = sqlx::query_as(
        "SELECT status, generation_attempt FROM projects WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
    .context("failed to lock project")?;

    Ok(row)
}

/// Flip a project from `generating` to `to`, but only while `attempt` is
/// still its current generation attempt. Returns the number of rows
/// affected (0 means the attempt was superseded or the status moved on).
pub async fn finish_generation(
    conn: &mut PgConnection,
    id: Uuid,
    attempt: i32,
    to: ProjectStatus,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE projects \
         SET status = $1, updated_at = now() \
         WHERE id = $2 AND generation_attempt = $3 AND status = 'generating'",
    )
    .bind(to)
    .bind(id)
    .bind(attempt)
    .execute(conn)
    .await
    .context("failed to finish generation")?;

    Ok(result.rows_affected())
}

/// Return every project left in `generating` by a previous process to
/// `onboarding`, bumping its attempt so any straggling run is discarded.
/// Returns the IDs of the projects that were reset.
pub async fn reset_orphaned_generations(pool: &PgPool) -> Result<Vec<Uuid>> {
    let ids: Vec<(Uuid,)> = sqlx::query_as(
        "UPDATE projects \
         SET status = 'onboarding', \
             generation_attempt = generation_attempt + 1, \
             updated_at = now() \
         WHERE status = 'generating' \
         RETURNING id",
    )
    .fetch_all(pool)
    .await
    .context("failed to reset orphaned generations")?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}
