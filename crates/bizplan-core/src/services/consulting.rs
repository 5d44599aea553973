use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use bizplan_db::models::ConsultingRequest;
use bizplan_db::queries::consulting::{self as db, NewConsultingRequest};
use bizplan_db::queries::users;

use super::projects::ProjectService;
use crate::error::{ServiceError, require_non_blank};
use crate::notify::{Notification, NotificationDispatcher};

const MEET_BASE: &str = "https://meet.google.com";

#[derive(Debug, Clone)]
pub struct ConsultingService {
    pool: PgPool,
    projects: ProjectService,
    notifier: NotificationDispatcher,
}

impl ConsultingService {
    pub fn new(pool: PgPool, notifier: NotificationDispatcher) -> Self {
        Self {
            projects: ProjectService::new(pool.clone()),
            pool,
            notifier,
        }
    }

    /// Record a consulting request for an owned project, attach a meeting
    /// link and enqueue the confirmation email.
    pub async fn create(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        request_type: &str,
        objective: &str,
    ) -> Result<ConsultingRequest, ServiceError> {
        require_non_blank("type", request_type)?;
        require_non_blank("objective", objective)?;
        self.projects.require_owned(user_id, project_id).await?;

        let meeting_link = meeting_link();
        let request = db::insert_request(
            &self.pool,
            &NewConsultingRequest {
                user_id,
                project_id,
                request_type,
                objective,
                meeting_link: Some(&meeting_link),
            },
        )
        .await?;
        tracing::info!(request_id = %request.id, project_id = %project_id, "consulting request created");

        let owner = users::get_user(&self.pool, user_id)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;
        self.notifier.dispatch(Notification::ConsultingScheduled {
            email: owner.email,
            objective: objective.to_string(),
            meeting_link,
        });

        Ok(request)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<ConsultingRequest>, ServiceError> {
        Ok(db::list_requests_for_user(&self.pool, user_id).await?)
    }

    pub async fn delete(&self, user_id: Uuid, request_id: Uuid) -> Result<(), ServiceError> {
        if !db::delete_request(&self.pool, request_id, user_id).await? {
            return Err(ServiceError::NotFound("consulting request"));
        }
        Ok(())
    }
}

/// A meeting link of the form `https://meet.google.com/abc-def-ghi`.
fn meeting_link() -> String {
    let mut rng = rand::rng();
    let code = (0..3)
        .map(|_| {
            (0..3)
                .map(|_| rng.random_range(b'a'..=b'z') as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-");
    format!("{MEET_BASE}/{code}")
}
