use axum::{response::Json, Extension};
use serde_json::Value;

use crate::database::manager::DatabaseManager;
use crate::database::models::Institution;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::institution_service::{InstitutionProfile, InstitutionUpdate};
use crate::services::InstitutionService;

/// POST /api/institution/create - register the caller's institution profile.
pub async fn create_post(
    Extension(user): Extension<AuthUser>,
    Json(profile): Json<InstitutionProfile>,
) -> ApiResult<Institution> {
    user.require_institution()?;

    let pool = DatabaseManager::pool().await?;
    let institution = InstitutionService::new(pool)
        .create(user.user_id, profile)
        .await?;
    Ok(ApiResponse::created(institution))
}

/// PUT /api/institution/update - partial update of the caller's profile.
pub async fn update_put(
    Extension(user): Extension<AuthUser>,
    Json(update): Json<InstitutionUpdate>,
) -> ApiResult<Institution> {
    user.require_institution()?;

    let pool = DatabaseManager::pool().await?;
    let institution = InstitutionService::new(pool)
        .update_for_user(user.user_id, update)
        .await?;
    Ok(ApiResponse::success(institution))
}

/// GET /api/institution/my - caller's profile with parameters, documents
/// and applications.
pub async fn my_get(Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    user.require_institution()?;

    let pool = DatabaseManager::pool().await?;
    let service = InstitutionService::new(pool);
    let institution = service.get_by_user(user.user_id).await?;
    let nested = service.with_children(&institution).await?;
    Ok(ApiResponse::success(nested))
}

/// GET /api/institution/all - every institution with nested data
/// (regulator view).
pub async fn all_get(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Value>> {
    user.require_reviewer()?;

    let pool = DatabaseManager::pool().await?;
    let service = InstitutionService::new(pool);
    let institutions = service.list_all().await?;

    let mut nested = Vec::with_capacity(institutions.len());
    for institution in &institutions {
        nested.push(service.with_children(institution).await?);
    }
    Ok(ApiResponse::success(nested))
}
