//! Central repository read surface: permission-gated institution data for
//! external services, regulators and the public. All routes sit behind the
//! identity resolver in `middleware::central_repo`.

use axum::{
    extract::{Path, Query},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::permissions::Permission;
use crate::database::manager::DatabaseManager;
use crate::database::models::{AiAnalysis, Application, Document, Institution};
use crate::error::ApiError;
use crate::middleware::central_repo::RepoIdentity;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::{ParameterService, StatsService};

#[derive(Debug, Deserialize)]
pub struct InstitutionListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(rename = "type")]
    pub institution_type: Option<String>,
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

/// GET /api/central-repo/institutions - paginated basic listing.
pub async fn institutions_get(
    Extension(identity): Extension<RepoIdentity>,
    Query(query): Query<InstitutionListQuery>,
) -> ApiResult<Value> {
    identity.require(Permission::ReadInstitutions)?;

    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    let pattern = query.search.as_ref().map(|s| format!("%{}%", s));

    // Own-data identities only ever see their bound institution.
    let scope = if identity.permissions.own_data_only {
        identity.institution_id
    } else {
        None
    };

    let pool = DatabaseManager::pool().await?;
    let institutions: Vec<Institution> = sqlx::query_as(
        "SELECT * FROM institutions \
         WHERE ($1::uuid IS NULL OR id = $1) \
           AND ($2::text IS NULL OR institution_type = $2) \
           AND ($3::text IS NULL OR name ILIKE $3 OR state ILIKE $3 OR district ILIKE $3) \
         ORDER BY name \
         LIMIT $4 OFFSET $5",
    )
    .bind(scope)
    .bind(&query.institution_type)
    .bind(&pattern)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(&pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM institutions \
         WHERE ($1::uuid IS NULL OR id = $1) \
           AND ($2::text IS NULL OR institution_type = $2) \
           AND ($3::text IS NULL OR name ILIKE $3 OR state ILIKE $3 OR district ILIKE $3)",
    )
    .bind(scope)
    .bind(&query.institution_type)
    .bind(&pattern)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(json!({
        "institutions": institutions,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
        },
    })))
}

#[derive(Debug, Deserialize, Default)]
pub struct InstitutionDetailQuery {
    #[serde(rename = "includeParameters", default)]
    pub include_parameters: bool,
    #[serde(rename = "includeApplications", default)]
    pub include_applications: bool,
    #[serde(rename = "includeAIData", default)]
    pub include_ai_data: bool,
    #[serde(rename = "includeDocuments", default)]
    pub include_documents: bool,
}

/// GET /api/central-repo/institutions/:id - details with opt-in sections.
/// Each requested section is silently omitted when the identity lacks the
/// matching permission.
pub async fn institution_get(
    Extension(identity): Extension<RepoIdentity>,
    Path(institution_id): Path<Uuid>,
    Query(query): Query<InstitutionDetailQuery>,
) -> ApiResult<Value> {
    if identity.permissions.own_data_only {
        identity.check_institution_access(institution_id)?;
    } else {
        identity.require(Permission::ReadInstitutions)?;
    }

    let pool = DatabaseManager::pool().await?;
    let institution: Option<Institution> =
        sqlx::query_as("SELECT * FROM institutions WHERE id = $1")
            .bind(institution_id)
            .fetch_optional(&pool)
            .await?;
    let institution =
        institution.ok_or_else(|| ApiError::not_found("Institution not found"))?;

    let mut detail = json!({ "institution": institution });

    if query.include_parameters && identity.permissions.allows(Permission::ReadParameters) {
        let merged = ParameterService::new(pool.clone())
            .merged_view(institution_id)
            .await?;
        detail["parameters"] = json!(merged);
    }

    if query.include_applications && identity.permissions.allows(Permission::ReadApplications) {
        let applications: Vec<Application> = sqlx::query_as(
            "SELECT * FROM applications WHERE institution_id = $1 ORDER BY submitted_at DESC",
        )
        .bind(institution_id)
        .fetch_all(&pool)
        .await?;
        detail["applications"] = json!(applications);
    }

    if query.include_ai_data && identity.permissions.allows(Permission::ReadAiData) {
        let analyses: Vec<AiAnalysis> = sqlx::query_as(
            "SELECT * FROM ai_analyses WHERE institution_id = $1 ORDER BY created_at DESC",
        )
        .bind(institution_id)
        .fetch_all(&pool)
        .await?;
        detail["ai_analyses"] = json!(analyses);
    }

    if query.include_documents && identity.permissions.allows(Permission::ReadDocuments) {
        let documents: Vec<Document> = sqlx::query_as(
            "SELECT * FROM documents WHERE institution_id = $1 ORDER BY uploaded_at DESC",
        )
        .bind(institution_id)
        .fetch_all(&pool)
        .await?;
        detail["documents"] = json!(documents);
    }

    Ok(ApiResponse::success(detail))
}

/// GET /api/central-repo/applications/:institution_id - status plus the
/// latest analysis when AI data is readable.
pub async fn application_status_get(
    Extension(identity): Extension<RepoIdentity>,
    Path(institution_id): Path<Uuid>,
) -> ApiResult<Value> {
    identity.require(Permission::ReadApplications)?;
    identity.check_institution_access(institution_id)?;

    let pool = DatabaseManager::pool().await?;
    let application: Option<Application> = sqlx::query_as(
        "SELECT * FROM applications WHERE institution_id = $1 \
         ORDER BY submitted_at DESC LIMIT 1",
    )
    .bind(institution_id)
    .fetch_optional(&pool)
    .await?;
    let application =
        application.ok_or_else(|| ApiError::not_found("No application found for this institution"))?;

    let application_id = application.id;
    let mut detail = json!({ "application": application });

    if identity.permissions.allows(Permission::ReadAiData) {
        let analysis: Option<AiAnalysis> = sqlx::query_as(
            "SELECT * FROM ai_analyses WHERE application_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(application_id)
        .fetch_optional(&pool)
        .await?;
        detail["latest_analysis"] = json!(analysis);
    }

    Ok(ApiResponse::success(detail))
}

/// GET /api/central-repo/statistics - aggregate counts.
pub async fn statistics_get(
    Extension(identity): Extension<RepoIdentity>,
) -> ApiResult<Value> {
    identity.require(Permission::ReadStatistics)?;

    let pool = DatabaseManager::pool().await?;
    let summary = StatsService::new(pool).public_summary().await?;
    Ok(ApiResponse::success(summary))
}
