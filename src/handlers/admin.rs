//! Super-admin management surface: users, parameter templates, API keys,
//! dashboard statistics.

use axum::{
    extract::{Path, Query},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::Role;
use crate::database::manager::DatabaseManager;
use crate::database::models::{ApiKey, ParameterTemplate, User};
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::api_key_service::NewApiKey;
use crate::services::stats_service::DashboardStats;
use crate::services::template_service::{NewTemplate, TemplateUpdate};
use crate::services::{ApiKeyService, StatsService, TemplateService, UserService};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub search: Option<String>,
}

pub async fn users_get(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Vec<User>> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let users = UserService::new(pool)
        .list(query.role.as_deref(), query.search.as_deref())
        .await?;
    Ok(ApiResponse::success(users))
}

pub async fn user_get(
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<User> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let found = UserService::new(pool).get(user_id).await?;
    Ok(ApiResponse::success(found))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

pub async fn users_post(
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<User> {
    user.require_super_admin()?;

    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let pool = DatabaseManager::pool().await?;
    let created = UserService::new(pool)
        .create(body.name.trim(), body.email.trim(), &body.password, body.role)
        .await?;
    Ok(ApiResponse::created(created))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

pub async fn user_put(
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<User> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let updated = UserService::new(pool)
        .update(
            user_id,
            body.name.as_deref(),
            body.email.as_deref(),
            body.role,
            body.password.as_deref(),
        )
        .await?;
    Ok(ApiResponse::success(updated))
}

pub async fn user_delete(
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<()> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    UserService::new(pool).delete(user_id, user.user_id).await?;
    Ok(ApiResponse::with_message((), "User deleted"))
}

#[derive(Debug, Deserialize)]
pub struct TemplateListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn templates_get(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TemplateListQuery>,
) -> ApiResult<Vec<ParameterTemplate>> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let templates = TemplateService::new(pool)
        .list(query.category.as_deref(), query.search.as_deref(), query.is_active)
        .await?;
    Ok(ApiResponse::success(templates))
}

pub async fn template_get(
    Extension(user): Extension<AuthUser>,
    Path(template_id): Path<Uuid>,
) -> ApiResult<ParameterTemplate> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let template = TemplateService::new(pool).get(template_id).await?;
    Ok(ApiResponse::success(template))
}

pub async fn templates_post(
    Extension(user): Extension<AuthUser>,
    Json(body): Json<NewTemplate>,
) -> ApiResult<ParameterTemplate> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let created = TemplateService::new(pool).create(body).await?;
    Ok(ApiResponse::created(created))
}

#[derive(Debug, Deserialize)]
pub struct BulkTemplateRequest {
    pub templates: Vec<NewTemplate>,
}

pub async fn templates_bulk_post(
    Extension(user): Extension<AuthUser>,
    Json(body): Json<BulkTemplateRequest>,
) -> ApiResult<Vec<ParameterTemplate>> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let created = TemplateService::new(pool).create_many(body.templates).await?;
    Ok(ApiResponse::created(created))
}

pub async fn template_put(
    Extension(user): Extension<AuthUser>,
    Path(template_id): Path<Uuid>,
    Json(body): Json<TemplateUpdate>,
) -> ApiResult<ParameterTemplate> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let updated = TemplateService::new(pool).update(template_id, body).await?;
    Ok(ApiResponse::success(updated))
}

pub async fn template_toggle_post(
    Extension(user): Extension<AuthUser>,
    Path(template_id): Path<Uuid>,
) -> ApiResult<ParameterTemplate> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let toggled = TemplateService::new(pool).toggle_active(template_id).await?;
    Ok(ApiResponse::success(toggled))
}

pub async fn template_delete(
    Extension(user): Extension<AuthUser>,
    Path(template_id): Path<Uuid>,
) -> ApiResult<()> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    TemplateService::new(pool).delete(template_id).await?;
    Ok(ApiResponse::with_message((), "Parameter template deleted"))
}

pub async fn api_keys_get(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Value>> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let keys = ApiKeyService::new(pool).list().await?;

    // Listings show a truncated key; the full value only appears at creation.
    let masked = keys
        .iter()
        .map(|key| {
            let mut value = serde_json::to_value(key).unwrap_or(Value::Null);
            value["key"] = Value::String(key.display_key());
            value
        })
        .collect();
    Ok(ApiResponse::success(masked))
}

pub async fn api_keys_post(
    Extension(user): Extension<AuthUser>,
    Json(body): Json<NewApiKey>,
) -> ApiResult<ApiKey> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let created = ApiKeyService::new(pool).create(user.user_id, body).await?;
    Ok(ApiResponse::created(created))
}

pub async fn api_key_delete(
    Extension(user): Extension<AuthUser>,
    Path(key_id): Path<Uuid>,
) -> ApiResult<ApiKey> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let revoked = ApiKeyService::new(pool).revoke(key_id).await?;
    Ok(ApiResponse::with_message(revoked, "API key revoked"))
}

pub async fn dashboard_get(Extension(user): Extension<AuthUser>) -> ApiResult<DashboardStats> {
    user.require_super_admin()?;

    let pool = DatabaseManager::pool().await?;
    let stats = StatsService::new(pool).dashboard().await?;
    Ok(ApiResponse::success(stats))
}
