use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use bizplan_db::models::Project;
use bizplan_db::queries::projects::{NewProject, ProjectChanges};

use super::AppState;
use super::error::AppError;
use super::extract::{AppJson, CurrentUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
}

#[derive(Debug, Deserialize)]
struct CreateProject {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    main_sector: String,
    #[serde(default)]
    business_model: String,
}

/// Descriptive fields only. A `status` key in the body is ignored.
#[derive(Debug, Default, Deserialize)]
struct UpdateProject {
    name: Option<String>,
    description: Option<String>,
    main_sector: Option<String>,
    business_model: Option<String>,
}

async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(body): AppJson<CreateProject>,
) -> Result<Json<Project>, AppError> {
    let project = state
        .projects
        .create(
            user.id,
            &NewProject {
                name: &body.name,
                description: &body.description,
                main_sector: &body.main_sector,
                business_model: &body.business_model,
            },
        )
        .await?;
    Ok(Json(project))
}

async fn list_projects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(state.projects.list(user.id).await?))
}

async fn get_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(state.projects.require_owned(user.id, id).await?))
}

async fn update_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    AppJson(body): AppJson<UpdateProject>,
) -> Result<Json<Project>, AppError> {
    let changes = ProjectChanges {
        name: body.name.as_deref(),
        description: body.description.as_deref(),
        main_sector: body.main_sector.as_deref(),
        business_model: body.business_model.as_deref(),
    };
    Ok(Json(state.projects.update(user.id, id, &changes).await?))
}

async fn delete_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.projects.delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
