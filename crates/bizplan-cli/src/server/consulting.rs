use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use bizplan_db::models::ConsultingRequest;

use super::AppState;
use super::error::AppError;
use super::extract::{AppJson, CurrentUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/consulting", get(list_requests).post(create_request))
        .route("/consulting/{id}", delete(delete_request))
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    project_id: Uuid,
    #[serde(rename = "type")]
    request_type: String,
    objective: String,
}

async fn create_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(body): AppJson<CreateRequest>,
) -> Result<Json<ConsultingRequest>, AppError> {
    let request = state
        .consulting
        .create(user.id, body.project_id, &body.request_type, &body.objective)
        .await?;
    Ok(Json(request))
}

async fn list_requests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ConsultingRequest>>, AppError> {
    Ok(Json(state.consulting.list(user.id).await?))
}

async fn delete_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.consulting.delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
