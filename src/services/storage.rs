//! HTTP boundary to the external object store holding uploaded files.
//! Only the metadata (URL + storage id) is kept locally.

use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::config;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage upload failed: {0}")]
    UploadFailed(String),
    #[error("Storage deletion failed: {0}")]
    DeleteFailed(String),
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub url: String,
    pub storage_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: Option<String>,
    storage_id: Option<String>,
}

pub struct StorageClient {
    client: reqwest::Client,
    base_url: String,
}

impl StorageClient {
    pub fn from_config() -> Self {
        let storage = &config::config().storage;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(storage.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: storage.base_url.clone(),
        }
    }

    /// Upload a file under a per-institution folder. Returns the public URL
    /// and the store's object id.
    pub async fn upload(
        &self,
        institution_id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, StorageError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("folder", format!("institution/{}", institution_id))
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/api/objects", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::UploadFailed(format!(
                "storage returned {}",
                response.status()
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        match (body.url, body.storage_id) {
            (Some(url), Some(storage_id)) => Ok(StoredObject { url, storage_id }),
            _ => Err(StorageError::UploadFailed(
                "storage response missing url or storage_id".to_string(),
            )),
        }
    }

    pub async fn delete(&self, storage_id: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(format!("{}/api/objects/{}", self.base_url, storage_id))
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::DeleteFailed(format!(
                "storage returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
