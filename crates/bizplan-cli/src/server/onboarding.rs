use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use bizplan_core::services::{AnswerInput, OnboardingService};
use bizplan_db::models::OnboardingAnswer;

use super::AppState;
use super::error::AppError;
use super::extract::{AppJson, CurrentUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/onboarding/questions", get(questions))
        .route(
            "/projects/{id}/onboarding",
            get(list_answers).post(submit_answers).put(replace_answers),
        )
        .route("/projects/{id}/onboarding/{label}", put(update_answer))
        .route("/projects/{id}/complete", post(complete_onboarding))
}

#[derive(Debug, Deserialize)]
struct AnswerUpdate {
    answer: String,
}

async fn questions() -> Json<&'static [&'static str]> {
    Json(OnboardingService::questions())
}

async fn list_answers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<OnboardingAnswer>>, AppError> {
    Ok(Json(state.onboarding.list(user.id, id).await?))
}

async fn submit_answers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    AppJson(answers): AppJson<Vec<AnswerInput>>,
) -> Result<Json<Vec<OnboardingAnswer>>, AppError> {
    Ok(Json(state.onboarding.submit(user.id, id, &answers).await?))
}

async fn replace_answers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    AppJson(answers): AppJson<Vec<AnswerInput>>,
) -> Result<Json<Vec<OnboardingAnswer>>, AppError> {
    Ok(Json(state.onboarding.replace(user.id, id, &answers).await?))
}

async fn update_answer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, label)): Path<(Uuid, String)>,
    AppJson(body): AppJson<AnswerUpdate>,
) -> Result<Json<OnboardingAnswer>, AppError> {
    let answer = state
        .onboarding
        .update_answer(user.id, id, &label, &body.answer)
        .await?;
    Ok(Json(answer))
}

/// Start plan generation and return before it finishes.
async fn complete_onboarding(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let handle = state.engine.complete_onboarding(user.id, id).await?;
    tracing::debug!(project_id = %id, attempt = handle.ticket.attempt, "generation detached");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Plan generation started", "status": "generating" })),
    ))
}
