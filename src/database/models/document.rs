use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for a file held in the external object store. The system models
/// the "current document set" per institution: re-upload replaces prior rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub institution_id: Uuid,
    pub application_id: Option<Uuid>,
    pub title: String,
    pub category: String,
    pub file_url: String,
    pub storage_id: String,
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}
