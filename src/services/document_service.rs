use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::{Document, Institution};
use crate::error::ApiError;
use crate::services::storage::StorageClient;

/// Documents model the institution's *current* set, not a history: an upload
/// replaces every prior row for that institution.
pub struct DocumentService {
    pool: PgPool,
    storage: StorageClient,
}

pub struct UploadRequest {
    pub institution_id: Uuid,
    pub application_id: Option<Uuid>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// External objects to remove when a new upload replaces the institution's
/// current set. Rows without a stored object are skipped.
pub fn stale_storage_ids(previous: &[Document]) -> Vec<&str> {
    previous
        .iter()
        .map(|document| document.storage_id.as_str())
        .filter(|storage_id| !storage_id.is_empty())
        .collect()
}

impl DocumentService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            storage: StorageClient::from_config(),
        }
    }

    /// Upload: wipe the institution's prior document rows (best-effort
    /// external deletion for each), store the new file, insert its record.
    pub async fn upload(&self, request: UploadRequest) -> Result<Document, ApiError> {
        if request.bytes.is_empty() {
            return Err(ApiError::bad_request("No file uploaded"));
        }

        let institution: Option<Institution> =
            sqlx::query_as("SELECT * FROM institutions WHERE id = $1")
                .bind(request.institution_id)
                .fetch_optional(&self.pool)
                .await?;
        if institution.is_none() {
            return Err(ApiError::not_found("Institution not found"));
        }

        let previous: Vec<Document> =
            sqlx::query_as("SELECT * FROM documents WHERE institution_id = $1")
                .bind(request.institution_id)
                .fetch_all(&self.pool)
                .await?;

        for storage_id in stale_storage_ids(&previous) {
            if let Err(e) = self.storage.delete(storage_id).await {
                // The local replacement still proceeds.
                tracing::warn!(
                    storage_id,
                    "external storage deletion failed during replace: {}",
                    e
                );
            }
        }

        let stored = self
            .storage
            .upload(request.institution_id, &request.filename, request.bytes)
            .await
            .map_err(|e| ApiError::internal_server_error(e.to_string()))?;

        let title = request
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| request.filename.clone());
        let category = request.category.unwrap_or_else(|| "general".to_string());

        // The local replace is atomic: old rows and the new one never
        // coexist, and a failed insert keeps the old rows.
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM documents WHERE institution_id = $1")
            .bind(request.institution_id)
            .execute(&mut *tx)
            .await?;
        let document: Document = sqlx::query_as(
            "INSERT INTO documents \
             (institution_id, application_id, title, category, file_url, storage_id, uploaded_by, uploaded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING *",
        )
        .bind(request.institution_id)
        .bind(request.application_id)
        .bind(title)
        .bind(category)
        .bind(&stored.url)
        .bind(&stored.storage_id)
        .bind(request.uploaded_by)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            document_id = %document.id,
            institution_id = %request.institution_id,
            replaced = previous.len(),
            "document uploaded"
        );
        Ok(document)
    }

    /// Delete: external deletion is attempted first and its failure
    /// surfaces to the caller; the local row is removed only when it worked.
    pub async fn delete(&self, document_id: Uuid) -> Result<(), ApiError> {
        let document: Option<Document> =
            sqlx::query_as("SELECT * FROM documents WHERE id = $1")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?;
        let document = document.ok_or_else(|| ApiError::not_found("Document not found"))?;

        if !document.storage_id.is_empty() {
            if let Err(e) = self.storage.delete(&document.storage_id).await {
                return Err(ApiError::not_found(format!(
                    "External storage deletion failed: {}",
                    e
                )));
            }
        }

        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_by_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<Document>, ApiError> {
        let documents = sqlx::query_as(
            "SELECT * FROM documents WHERE institution_id = $1 ORDER BY uploaded_at DESC",
        )
        .bind(institution_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(documents)
    }

    pub async fn list_all(&self) -> Result<Vec<Document>, ApiError> {
        let documents = sqlx::query_as("SELECT * FROM documents ORDER BY uploaded_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_document(storage_id: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            institution_id: Uuid::new_v4(),
            application_id: None,
            title: "AICTE approval letter".to_string(),
            category: "general".to_string(),
            file_url: format!("https://files.example/{}", storage_id),
            storage_id: storage_id.to_string(),
            uploaded_by: None,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn second_upload_targets_every_prior_storage_object() {
        let previous = vec![stored_document("obj-1"), stored_document("obj-2")];
        assert_eq!(stale_storage_ids(&previous), vec!["obj-1", "obj-2"]);
    }

    #[test]
    fn first_upload_has_nothing_to_replace() {
        assert!(stale_storage_ids(&[]).is_empty());
    }

    #[test]
    fn rows_without_a_stored_object_are_not_deleted_externally() {
        let previous = vec![stored_document(""), stored_document("obj-3")];
        assert_eq!(stale_storage_ids(&previous), vec!["obj-3"]);
    }
}
