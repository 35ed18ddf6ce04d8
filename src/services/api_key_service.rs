use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::ApiKey;
use crate::error::ApiError;

/// Generate an opaque key with the `key_` prefix the lookup index expects.
pub fn generate_key() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(40)
        .map(char::from)
        .collect();
    format!("key_{}", suffix)
}

#[derive(Debug, Deserialize)]
pub struct NewApiKey {
    pub service: String,
    pub role: Option<String>,
    pub permissions: Option<Value>,
    pub institution_id: Option<Uuid>,
    pub expires_in_days: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct ApiKeyService {
    pool: PgPool,
}

impl ApiKeyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a presented key to a usable credential. Inactive, unknown and
    /// expired keys all resolve to `None` rather than distinct errors.
    pub async fn find_active(&self, key: &str) -> Result<Option<ApiKey>, ApiError> {
        let found: Option<ApiKey> =
            sqlx::query_as("SELECT * FROM api_keys WHERE key = $1 AND is_active = TRUE")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.filter(|k| !k.is_expired(Utc::now())))
    }

    /// Bump usage stats off the request path. Failure is logged and never
    /// surfaces to the caller.
    pub fn record_usage(&self, key_id: Uuid) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let result = sqlx::query(
                "UPDATE api_keys SET last_used = $2, usage_count = usage_count + 1 WHERE id = $1",
            )
            .bind(key_id)
            .bind(Utc::now())
            .execute(&pool)
            .await;
            if let Err(e) = result {
                tracing::warn!(key_id = %key_id, "failed to record API key usage: {}", e);
            }
        });
    }

    pub async fn create(&self, created_by: Uuid, new_key: NewApiKey) -> Result<ApiKey, ApiError> {
        if new_key.service.trim().is_empty() {
            return Err(ApiError::bad_request("Service name is required"));
        }

        let role = new_key.role.unwrap_or_else(|| "external_service".to_string());
        let expires_at = new_key.expires_in_days.map(|days| Utc::now() + Duration::days(days));

        let key: ApiKey = sqlx::query_as(
            "INSERT INTO api_keys \
             (key, service, role, permissions, institution_id, created_by, expires_at, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING *",
        )
        .bind(generate_key())
        .bind(new_key.service.trim())
        .bind(role)
        .bind(new_key.permissions.unwrap_or_else(|| serde_json::json!({})))
        .bind(new_key.institution_id)
        .bind(created_by)
        .bind(expires_at)
        .bind(new_key.notes.unwrap_or_default())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(key_id = %key.id, service = %key.service, "API key issued");
        Ok(key)
    }

    pub async fn revoke(&self, key_id: Uuid) -> Result<ApiKey, ApiError> {
        let key: Option<ApiKey> = sqlx::query_as(
            "UPDATE api_keys SET is_active = FALSE WHERE id = $1 RETURNING *",
        )
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await?;
        key.ok_or_else(|| ApiError::not_found("API key not found"))
    }

    pub async fn list(&self) -> Result<Vec<ApiKey>, ApiError> {
        let keys = sqlx::query_as("SELECT * FROM api_keys ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_carry_prefix_and_are_distinct() {
        let a = generate_key();
        let b = generate_key();
        assert!(a.starts_with("key_"));
        assert_eq!(a.len(), 44);
        assert_ne!(a, b);
    }
}
