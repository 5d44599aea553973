//! Database query functions for the `business_plans` and
//! `plan_section_analyses` tables.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{BusinessPlan, PlanSectionAnalysis};

/// Scalar content written to a plan on every generation run.
#[derive(Debug, Clone)]
pub struct NewPlanContent<'a> {
    pub content_markdown: &'a str,
    pub executive_summary: &'a str,
    pub overall_score: Option<i32>,
    pub analysis_error: Option<&'a str>,
}

/// One section row to be written under a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSection {
    pub section_name: String,
    pub score: Option<i32>,
    pub suggestions: Vec<String>,
}

/// Fetch the plan for a project, if one has been generated.
pub async fn get_plan_for_project(pool: &PgPool, project_id: Uuid) -> Result<Option<BusinessPlan>> {
    let plan =
        sqlx::query_as::<_, BusinessPlan>("SELECT * FROM business_plans WHERE project_id = $1")
            .bind(project_id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch business plan")?;

    Ok(plan)
}

/// List the section analyses of a plan in evaluation order.
pub async fn list_sections(pool: &PgPool, plan_id: Uuid) -> Result<Vec<PlanSectionAnalysis>> {
    let sections = sqlx::query_as::<_, PlanSectionAnalysis>(
        "SELECT * FROM plan_section_analyses \
         WHERE business_plan_id = $1 \
         ORDER BY position ASC",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await
    .context("failed to list plan sections")?;

    Ok(sections)
}

/// Insert the project's plan, or overwrite the scalar fields of the
/// existing one. Either way the returned row carries a durable ID that
/// sections can reference.
pub async fn upsert_plan(
    conn: &mut PgConnection,
    project_id: Uuid,
    content: &NewPlanContent<'_>,
) -> Result<BusinessPlan> {
    let plan = sqlx::query_as::<_, BusinessPlan>(
        "INSERT INTO business_plans \
             (project_id, content_markdown, executive_summary, overall_score, analysis_error) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (project_id) DO UPDATE SET \
             content_markdown = EXCLUDED.content_markdown, \
             executive_summary = EXCLUDED.executive_summary, \
             overall_score = EXCLUDED.overall_score, \
             analysis_error = EXCLUDED.analysis_error, \
             updated_at = now() \
         RETURNING *",
    )
    .bind(project_id)
    .bind(content.content_markdown)
    .bind(content.executive_summary)
    .bind(content.overall_score)
    .bind(content.analysis_error)
    .fetch_one(conn)
    .await
    .context("failed to upsert business plan")?;

    Ok(plan)
}

/// Replace every section row of a plan with `sections`, preserving their
/// order. Returns the number of rows inserted.
pub async fn replace_sections(
    conn: &mut PgConnection,
    plan_id: Uuid,
    sections: &[NewSection],
) -> Result<u64> {
    sqlx::query("DELETE FROM plan_section_analyses WHERE business_plan_id = $1")
        .bind(plan_id)
        .execute(&mut *conn)
        .await
        .context("failed to delete previous plan sections")?;

    let mut inserted = 0;
    for (position, section) in sections.iter().enumerate() {
        sqlx::query(
            "INSERT INTO plan_section_analyses \
                 (business_plan_id, position, section_name, score, suggestions) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(plan_id)
        .bind(position as i32)
        .bind(&section.section_name)
        .bind(section.score)
        .bind(&section.suggestions)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to insert plan section {:?}", section.section_name))?;
        inserted += 1;
    }

    Ok(inserted)
}
