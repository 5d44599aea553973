use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use bizplan_core::services::AccessToken;
use bizplan_core::services::auth::FORGOT_PASSWORD_MESSAGE;
use bizplan_db::models::User;

use super::AppState;
use super::error::AppError;
use super::extract::{AppJson, CurrentUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me).patch(update_me).delete(delete_me))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

/// OAuth2 password-flow form; `username` carries the email.
#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ProfileUpdate {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
struct ResetPasswordRequest {
    token: String,
    new_password: String,
}

async fn register(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .auth
        .register(&body.name, &body.email, &body.password)
        .await?;
    Ok(Json(user))
}

async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<AccessToken>, AppError> {
    let Form(form) = form?;
    let token = state.auth.login(&form.username, &form.password).await?;
    Ok(Json(token))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(body): AppJson<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    let user = state.auth.update_profile(user.id, &body.name).await?;
    Ok(Json(user))
}

async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, AppError> {
    state.auth.delete_account(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn forgot_password(
    State(state): State<AppState>,
    AppJson(body): AppJson<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    state.auth.request_password_reset(&body.email).await?;
    Ok(Json(json!({ "message": FORGOT_PASSWORD_MESSAGE })))
}

async fn reset_password(
    State(state): State<AppState>,
    AppJson(body): AppJson<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .auth
        .reset_password(&body.token, &body.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password updated" })))
}
