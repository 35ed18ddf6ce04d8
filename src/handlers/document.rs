use axum::{
    extract::{Multipart, Query},
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Role;
use crate::database::manager::DatabaseManager;
use crate::database::models::Document;
use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::{DocumentService, InstitutionService};

/// POST /api/document/upload - multipart upload. Replaces every existing
/// document for the institution.
pub async fn upload_post(
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<Document> {
    let mut institution_id: Option<Uuid> = None;
    let mut application_id: Option<Uuid> = None;
    let mut title: Option<String> = None;
    let mut category: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
                bytes = Some(data.to_vec());
            }
            "institution_id" => {
                let text = read_text(field).await?;
                institution_id =
                    Some(Uuid::parse_str(&text).map_err(|_| {
                        ApiError::bad_request("institution_id must be a UUID")
                    })?);
            }
            "application_id" => {
                let text = read_text(field).await?;
                application_id =
                    Some(Uuid::parse_str(&text).map_err(|_| {
                        ApiError::bad_request("application_id must be a UUID")
                    })?);
            }
            "title" => title = Some(read_text(field).await?),
            "category" => category = Some(read_text(field).await?),
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let filename = filename.unwrap_or_else(|| "document".to_string());

    let pool = DatabaseManager::pool().await?;

    // Institution callers always target their own profile.
    let institution_id = if user.role == Role::Institution {
        InstitutionService::new(pool.clone())
            .get_by_user(user.user_id)
            .await?
            .id
    } else {
        institution_id.ok_or_else(|| ApiError::bad_request("institution_id is required"))?
    };

    let document = DocumentService::new(pool)
        .upload(crate::services::document_service::UploadRequest {
            institution_id,
            application_id,
            title,
            category,
            uploaded_by: Some(user.user_id),
            filename,
            bytes,
        })
        .await?;
    Ok(ApiResponse::created(document))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart field: {}", e)))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Uuid,
}

/// DELETE /api/document/delete?id= - remove one document; external storage
/// deletion happens first.
pub async fn delete_delete(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<()> {
    let pool = DatabaseManager::pool().await?;
    let service = DocumentService::new(pool.clone());

    if user.role == Role::Institution {
        let institution = InstitutionService::new(pool)
            .get_by_user(user.user_id)
            .await?;
        let owned = service
            .list_by_institution(institution.id)
            .await?
            .iter()
            .any(|d| d.id == query.id);
        if !owned {
            return Err(ApiError::forbidden(
                "You can only delete your own institution's documents",
            ));
        }
    }

    service.delete(query.id).await?;
    Ok(ApiResponse::with_message((), "Document deleted"))
}

/// GET /api/document/my - the caller's documents.
pub async fn my_get(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Document>> {
    user.require_institution()?;

    let pool = DatabaseManager::pool().await?;
    let institution = InstitutionService::new(pool.clone())
        .get_by_user(user.user_id)
        .await?;
    let documents = DocumentService::new(pool)
        .list_by_institution(institution.id)
        .await?;
    Ok(ApiResponse::success(documents))
}

/// GET /api/document/all - every document (reviewer view).
pub async fn all_get(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<Document>> {
    user.require_reviewer()?;

    let pool = DatabaseManager::pool().await?;
    let documents = DocumentService::new(pool).list_all().await?;
    Ok(ApiResponse::success(documents))
}
