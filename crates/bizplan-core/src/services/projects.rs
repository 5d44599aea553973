use sqlx::PgPool;
use uuid::Uuid;

use bizplan_db::models::Project;
use bizplan_db::queries::projects::{self as db, NewProject, ProjectChanges};

use crate::error::{ServiceError, require_non_blank};

const DUPLICATE_NAME: &str = "a project with this name already exists";

#[derive(Debug, Clone)]
pub struct ProjectService {
    pool: PgPool,
}

impl ProjectService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a project in `onboarding` with its ten empty answers.
    pub async fn create(
        &self,
        user_id: Uuid,
        project: &NewProject<'_>,
    ) -> Result<Project, ServiceError> {
        require_non_blank("name", project.name)?;
        let project = NewProject {
            name: project.name.trim(),
            ..project.clone()
        };

        let created = db::insert_project_with_answers(&self.pool, user_id, &project)
            .await
            .map_err(|e| ServiceError::conflict_or_internal(e, DUPLICATE_NAME))?;

        tracing::info!(project_id = %created.id, user_id = %user_id, "project created");
        Ok(created)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Project>, ServiceError> {
        Ok(db::list_projects_for_user(&self.pool, user_id).await?)
    }

    /// Fetch a project owned by `user_id`, or `NotFound`.
    pub async fn require_owned(&self, user_id: Uuid, project_id: Uuid) -> Result<Project, ServiceError> {
        db::get_owned_project(&self.pool, project_id, user_id)
            .await?
            .ok_or(ServiceError::NotFound("project"))
    }

    /// Apply descriptive changes. Status is not part of [`ProjectChanges`]
    /// and cannot be changed here.
    pub async fn update(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        changes: &ProjectChanges<'_>,
    ) -> Result<Project, ServiceError> {
        let mut changes = changes.clone();
        if let Some(name) = changes.name {
            require_non_blank("name", name)?;
            changes.name = Some(name.trim());
        }

        db::update_project_details(&self.pool, project_id, user_id, &changes)
            .await
            .map_err(|e| ServiceError::conflict_or_internal(e, DUPLICATE_NAME))?
            .ok_or(ServiceError::NotFound("project"))
    }

    /// Delete a project with its answers, plan and consulting requests.
    pub async fn delete(&self, user_id: Uuid, project_id: Uuid) -> Result<(), ServiceError> {
        if !db::delete_project(&self.pool, project_id, user_id).await? {
            return Err(ServiceError::NotFound("project"));
        }
        tracing::info!(project_id = %project_id, "project deleted");
        Ok(())
    }
}
