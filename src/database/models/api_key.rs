use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::permissions::{AccessRole, PermissionOverrides, PermissionSet};

/// Credential issued to an external service for the central repository.
/// Permissions are stored per key so a role's defaults can be overridden.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub key: String,
    pub service: String,
    pub role: String,
    pub permissions: Value,
    pub institution_id: Option<Uuid>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub usage_count: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub notes: String,
}

impl ApiKey {
    pub fn access_role(&self) -> AccessRole {
        AccessRole::parse(&self.role).unwrap_or(AccessRole::Public)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }

    /// Role defaults with the key's stored overrides applied on top. A field
    /// absent from the stored JSON keeps the default; JSON that does not
    /// deserialize leaves the defaults untouched.
    pub fn permission_set(&self) -> PermissionSet {
        let defaults =
            crate::auth::permissions::permission_table().for_role(self.access_role());
        match serde_json::from_value::<PermissionOverrides>(self.permissions.clone()) {
            Ok(overrides) => defaults.with_overrides(&overrides),
            Err(_) => defaults,
        }
    }

    /// Truncated form for listings; never expose the full key in bulk output.
    pub fn display_key(&self) -> String {
        if self.key.len() > 12 {
            format!("{}...", &self.key[..12])
        } else {
            self.key.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key_with_expiry(expires_at: Option<DateTime<Utc>>) -> ApiKey {
        ApiKey {
            id: Uuid::new_v4(),
            key: "key_abcdefghijklmnop".to_string(),
            service: "ranking-portal".to_string(),
            role: "external_service".to_string(),
            permissions: serde_json::json!({}),
            institution_id: None,
            is_active: true,
            created_by: None,
            created_at: Utc::now(),
            last_used: None,
            usage_count: 0,
            expires_at,
            notes: String::new(),
        }
    }

    #[test]
    fn key_without_expiry_never_expires() {
        let key = key_with_expiry(None);
        assert!(!key.is_expired(Utc::now()));
    }

    #[test]
    fn expired_timestamp_is_detected() {
        let now = Utc::now();
        let key = key_with_expiry(Some(now - Duration::hours(1)));
        assert!(key.is_expired(now));

        let key = key_with_expiry(Some(now + Duration::hours(1)));
        assert!(!key.is_expired(now));
    }

    #[test]
    fn malformed_permissions_fall_back_to_role_defaults() {
        let mut key = key_with_expiry(None);
        key.permissions = serde_json::json!("not an object");
        let set = key.permission_set();
        // external_service defaults: institutions yes, AI data no
        assert!(set.can_read_institutions);
        assert!(!set.can_read_ai_data);
    }

    #[test]
    fn partial_override_flips_one_flag_and_keeps_defaults() {
        let mut key = key_with_expiry(None);
        key.permissions = serde_json::json!({ "can_read_ai_data": true });

        let set = key.permission_set();
        assert!(set.can_read_ai_data);
        assert!(set.can_read_institutions);
        assert!(set.can_read_statistics);
        assert!(!set.can_read_documents);
    }

    #[test]
    fn display_key_is_truncated() {
        let key = key_with_expiry(None);
        assert_eq!(key.display_key(), "key_abcdefgh...");
    }
}
