//! Database query functions for the `consulting_requests` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ConsultingRequest;

/// Fields supplied when recording a consulting request.
#[derive(Debug, Clone)]
pub struct NewConsultingRequest<'a> {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub request_type: &'a str,
    pub objective: &'a str,
    pub meeting_link: Option<&'a str>,
}

/// Insert a consulting request in `pending` status.
pub async fn insert_request(
    pool: &PgPool,
    request: &NewConsultingRequest<'_>,
) -> Result<ConsultingRequest> {
    let row = sqlx::query_as::<_, ConsultingRequest>(
        "INSERT INTO consulting_requests (user_id, project_id, request_type, objective, meeting_link) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(request.user_id)
    .bind(request.project_id)
    .bind(request.request_type)
    .bind(request.objective)
    .bind(request.meeting_link)
    .fetch_one(pool)
    .await
    .context("failed to insert consulting request")?;

    Ok(row)
}

/// List a user's consulting requests, newest first.
pub async fn list_requests_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<ConsultingRequest>> {
    let rows = sqlx::query_as::<_, ConsultingRequest>(
        "SELECT * FROM consulting_requests WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list consulting requests")?;

    Ok(rows)
}

/// Delete a consulting request owned by `user_id`. Returns `true` if a row
/// was removed.
pub async fn delete_request(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM consulting_requests WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("failed to delete consulting request")?;

    Ok(result.rows_affected() > 0)
}
