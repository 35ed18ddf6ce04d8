use axum::{extract::Path, Extension};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::AiAnalysis;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::AiService;

/// POST /api/ai-analysis/process/:application_id - run a fresh scoring pass.
/// Failures come back as 500 with the analysis id for retry.
pub async fn process_post(
    Extension(user): Extension<AuthUser>,
    Path(application_id): Path<Uuid>,
) -> ApiResult<Value> {
    user.require_reviewer()?;

    let pool = DatabaseManager::pool().await?;
    let outcome = AiService::new(pool).process(application_id).await?;
    Ok(ApiResponse::success(json!({
        "analysis": outcome.analysis,
        "report": outcome.report,
    })))
}

/// POST /api/ai-analysis/retry/:analysis_id - re-run with the stored
/// snapshot; run_count increments.
pub async fn retry_post(
    Extension(user): Extension<AuthUser>,
    Path(analysis_id): Path<Uuid>,
) -> ApiResult<Value> {
    user.require_reviewer()?;

    let pool = DatabaseManager::pool().await?;
    let outcome = AiService::new(pool).retry(analysis_id).await?;
    Ok(ApiResponse::success(json!({
        "analysis": outcome.analysis,
        "report": outcome.report,
    })))
}

/// GET /api/ai-analysis/application/:application_id - analyses for one
/// application, newest first.
pub async fn by_application_get(
    Extension(user): Extension<AuthUser>,
    Path(application_id): Path<Uuid>,
) -> ApiResult<Vec<AiAnalysis>> {
    user.require_reviewer()?;

    let pool = DatabaseManager::pool().await?;
    let analyses = AiService::new(pool).list_by_application(application_id).await?;
    Ok(ApiResponse::success(analyses))
}

/// GET /api/ai-analysis/:id
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path(analysis_id): Path<Uuid>,
) -> ApiResult<AiAnalysis> {
    user.require_reviewer()?;

    let pool = DatabaseManager::pool().await?;
    let analysis = AiService::new(pool).get(analysis_id).await?;
    Ok(ApiResponse::success(analysis))
}
