use axum::{extract::Path, response::Json, Extension};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::Application;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::application_service::ReviewAction;
use crate::services::{ApplicationService, InstitutionService};

/// POST /api/application/create - submit the caller's application; the
/// eligibility gate runs inside the service.
pub async fn create_post(Extension(user): Extension<AuthUser>) -> ApiResult<Application> {
    user.require_institution()?;

    let pool = DatabaseManager::pool().await?;
    let institution = InstitutionService::new(pool.clone())
        .get_by_user(user.user_id)
        .await?;
    let application = ApplicationService::new(pool)
        .create(institution.id, user.user_id)
        .await?;
    Ok(ApiResponse::created(application))
}

/// GET /api/application - the caller's latest application.
pub async fn my_get(Extension(user): Extension<AuthUser>) -> ApiResult<Application> {
    user.require_institution()?;

    let pool = DatabaseManager::pool().await?;
    let institution = InstitutionService::new(pool.clone())
        .get_by_user(user.user_id)
        .await?;
    let application = ApplicationService::new(pool)
        .get_by_institution(institution.id)
        .await?;
    Ok(ApiResponse::success(application))
}

/// GET /api/application/all - role-scoped listing for reviewers.
pub async fn all_get(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Application>> {
    let pool = DatabaseManager::pool().await?;
    let applications = ApplicationService::new(pool).list_for_role(user.role).await?;
    Ok(ApiResponse::success(applications))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub action: ReviewAction,
    pub remarks: Option<String>,
}

/// POST /api/application/:id - approve or reject; terminal once decided.
pub async fn review_post(
    Extension(user): Extension<AuthUser>,
    Path(application_id): Path<Uuid>,
    Json(body): Json<ReviewRequest>,
) -> ApiResult<Application> {
    let pool = DatabaseManager::pool().await?;
    let application = ApplicationService::new(pool)
        .review(application_id, user.user_id, user.role, body.action, body.remarks)
        .await?;
    Ok(ApiResponse::success(application))
}
