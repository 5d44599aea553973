use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use bizplan_core::services::PlanWithSections;
use bizplan_db::models::PlanSectionAnalysis;

use super::AppState;
use super::error::AppError;
use super::extract::CurrentUser;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects/{id}/plan", get(get_plan))
        .route("/projects/{id}/plan/analysis", get(get_analysis))
}

/// The evaluation view of a plan, without its markdown body.
#[derive(Debug, Serialize)]
struct PlanAnalysisResponse {
    project_id: Uuid,
    executive_summary: String,
    overall_score: Option<i32>,
    analysis_error: Option<String>,
    sections: Vec<PlanSectionAnalysis>,
}

impl From<PlanWithSections> for PlanAnalysisResponse {
    fn from(p: PlanWithSections) -> Self {
        Self {
            project_id: p.plan.project_id,
            executive_summary: p.plan.executive_summary,
            overall_score: p.plan.overall_score,
            analysis_error: p.plan.analysis_error,
            sections: p.sections,
        }
    }
}

async fn get_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PlanWithSections>, AppError> {
    Ok(Json(state.plans.get_plan(user.id, id).await?))
}

async fn get_analysis(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PlanAnalysisResponse>, AppError> {
    let plan = state.plans.get_plan(user.id, id).await?;
    Ok(Json(plan.into()))
}
