use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use bizplan_db::models::{BusinessPlan, PlanSectionAnalysis};
use bizplan_db::queries::business_plans as db;

use super::projects::ProjectService;
use crate::error::ServiceError;

/// A plan together with its section analyses, in evaluation order.
#[derive(Debug, Clone, Serialize)]
pub struct PlanWithSections {
    #[serde(flatten)]
    pub plan: BusinessPlan,
    pub sections: Vec<PlanSectionAnalysis>,
}

#[derive(Debug, Clone)]
pub struct PlanService {
    pool: PgPool,
    projects: ProjectService,
}

impl PlanService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            projects: ProjectService::new(pool.clone()),
            pool,
        }
    }

    /// Fetch the generated plan of an owned project. `NotFound` if the
    /// project is not the caller's or no plan has been generated yet.
    pub async fn get_plan(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<PlanWithSections, ServiceError> {
        self.projects.require_owned(user_id, project_id).await?;
        let plan = db::get_plan_for_project(&self.pool, project_id)
            .await?
            .ok_or(ServiceError::NotFound("business plan"))?;
        let sections = db::list_sections(&self.pool, plan.id).await?;
        Ok(PlanWithSections { plan, sections })
    }
}
