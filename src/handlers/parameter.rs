use axum::{response::Json, Extension};
use serde::Deserialize;

use crate::database::manager::DatabaseManager;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::parameter_service::{MergedParameter, ParameterEntry, SaveOutcome};
use crate::services::{InstitutionService, ParameterService};

#[derive(Debug, Deserialize)]
pub struct ParameterBatch {
    pub parameters: Vec<ParameterEntry>,
}

/// GET /api/institutionparameter - merge view: every active template with
/// the caller's value, defaulted where absent.
pub async fn merged_get(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<MergedParameter>> {
    user.require_institution()?;

    let pool = DatabaseManager::pool().await?;
    let institution = InstitutionService::new(pool.clone())
        .get_by_user(user.user_id)
        .await?;
    let merged = ParameterService::new(pool)
        .merged_view(institution.id)
        .await?;
    Ok(ApiResponse::success(merged))
}

/// POST /api/institutionparameter/create - initial batch; rejected when the
/// institution already has parameter rows.
pub async fn create_post(
    Extension(user): Extension<AuthUser>,
    Json(batch): Json<ParameterBatch>,
) -> ApiResult<SaveOutcome> {
    user.require_institution()?;

    let pool = DatabaseManager::pool().await?;
    let institution = InstitutionService::new(pool.clone())
        .get_by_user(user.user_id)
        .await?;
    let outcome = ParameterService::new(pool)
        .create_initial(institution.id, batch.parameters)
        .await?;
    Ok(ApiResponse::created(outcome))
}

/// PUT /api/institutionparameter/updates - update existing rows only.
pub async fn updates_put(
    Extension(user): Extension<AuthUser>,
    Json(batch): Json<ParameterBatch>,
) -> ApiResult<SaveOutcome> {
    user.require_institution()?;

    let pool = DatabaseManager::pool().await?;
    let institution = InstitutionService::new(pool.clone())
        .get_by_user(user.user_id)
        .await?;
    let outcome = ParameterService::new(pool)
        .update_existing(institution.id, batch.parameters)
        .await?;
    Ok(ApiResponse::success(outcome))
}

/// PUT /api/institutionparameter/save - upsert batch (create or update).
pub async fn save_put(
    Extension(user): Extension<AuthUser>,
    Json(batch): Json<ParameterBatch>,
) -> ApiResult<SaveOutcome> {
    user.require_institution()?;

    let pool = DatabaseManager::pool().await?;
    let institution = InstitutionService::new(pool.clone())
        .get_by_user(user.user_id)
        .await?;
    let outcome = ParameterService::new(pool)
        .save_batch(institution.id, batch.parameters)
        .await?;
    Ok(ApiResponse::success(outcome))
}
