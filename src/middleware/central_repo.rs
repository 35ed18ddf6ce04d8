//! Identity resolution for the central repository read surface.
//!
//! Requests authenticate three ways, tried in order: an `X-API-Key` header
//! (or `apiKey` query parameter), a session JWT from the bearer header or
//! `accessToken` cookie, or nothing at all. A malformed or expired JWT does
//! not fail the request here; it downgrades the caller to the public role and
//! lets the permission check decide. Unknown API keys are rejected outright.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{
    self,
    permissions::{permission_table, AccessRole, Permission, PermissionSet},
};
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::auth::extract_session_token;
use crate::services::ApiKeyService;

/// Resolved caller identity carried through central-repository handlers.
#[derive(Clone, Debug)]
pub struct RepoIdentity {
    pub role: AccessRole,
    pub permissions: PermissionSet,
    /// Set when the identity is bound to a single institution.
    pub institution_id: Option<Uuid>,
    /// External service name when authenticated by API key.
    pub service: Option<String>,
}

impl RepoIdentity {
    fn public() -> Self {
        Self {
            role: AccessRole::Public,
            permissions: permission_table().for_role(AccessRole::Public),
            institution_id: None,
            service: None,
        }
    }

    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if !self.permissions.allows(permission) {
            return Err(ApiError::forbidden(format!(
                "Access denied. Missing permission: {}",
                permission.as_str()
            )));
        }
        Ok(())
    }

    /// Own-data scoping: identities marked `own_data_only` may only touch
    /// their bound institution.
    pub fn check_institution_access(&self, institution_id: Uuid) -> Result<(), ApiError> {
        if self.permissions.own_data_only && self.institution_id != Some(institution_id) {
            return Err(ApiError::forbidden(
                "Access denied. You can only access your own institution's data",
            ));
        }
        Ok(())
    }
}

pub async fn identity_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let query = request.uri().query().map(str::to_string);
    let identity = resolve_identity(&headers, query.as_deref()).await?;

    tracing::info!(
        role = identity.role.as_str(),
        service = identity.service.as_deref().unwrap_or("-"),
        path = %request.uri().path(),
        "central repository access"
    );

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

async fn resolve_identity(
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<RepoIdentity, ApiError> {
    if let Some(key_header) = headers.get("x-api-key") {
        let key = key_header
            .to_str()
            .map_err(|_| ApiError::forbidden("Invalid API key format"))?;
        return resolve_api_key(key).await;
    }
    if let Some(key) = query.and_then(api_key_from_query) {
        return resolve_api_key(&key).await;
    }

    if let Ok(token) = extract_session_token(headers) {
        match auth::verify_jwt(&token) {
            Ok(claims) => return resolve_jwt(claims).await,
            Err(e) => {
                // Bad tokens fall through to the public role.
                tracing::warn!("central repository JWT rejected, treating as public: {}", e);
            }
        }
    }

    Ok(RepoIdentity::public())
}

fn api_key_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == "apiKey" && !value.is_empty()).then(|| value.to_string())
    })
}

async fn resolve_api_key(key: &str) -> Result<RepoIdentity, ApiError> {
    let pool = DatabaseManager::pool().await?;
    let service = ApiKeyService::new(pool);

    let api_key = service
        .find_active(key)
        .await?
        .ok_or_else(|| ApiError::forbidden("Invalid or expired API key"))?;

    service.record_usage(api_key.id);

    Ok(RepoIdentity {
        role: api_key.access_role(),
        permissions: api_key.permission_set(),
        institution_id: api_key.institution_id,
        service: Some(api_key.service.clone()),
    })
}

async fn resolve_jwt(claims: auth::Claims) -> Result<RepoIdentity, ApiError> {
    let pool = DatabaseManager::pool().await?;

    // Valid token for a deleted user is a hard 401, not a downgrade.
    let user: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&pool)
        .await?;
    if user.is_none() {
        return Err(ApiError::unauthorized("User not found"));
    }

    let role = AccessRole::from(claims.role);
    let permissions = permission_table().for_role(role);

    // Institution identities are scoped to their own profile.
    let institution_id = if role == AccessRole::Institution {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM institutions WHERE user_id = $1")
                .bind(claims.sub)
                .fetch_optional(&pool)
                .await?;
        row.map(|(id,)| id)
    } else {
        None
    };

    Ok(RepoIdentity {
        role,
        permissions,
        institution_id,
        service: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_identity_reads_institutions_only() {
        let identity = RepoIdentity::public();
        assert!(identity.require(Permission::ReadInstitutions).is_ok());
        assert!(identity.require(Permission::ReadStatistics).is_ok());
        assert!(identity.require(Permission::ReadParameters).is_err());
        assert!(identity.require(Permission::ReadAiData).is_err());
    }

    #[test]
    fn own_data_scope_blocks_other_institutions() {
        let own = Uuid::new_v4();
        let identity = RepoIdentity {
            role: AccessRole::Institution,
            permissions: permission_table().for_role(AccessRole::Institution),
            institution_id: Some(own),
            service: None,
        };
        assert!(identity.check_institution_access(own).is_ok());
        assert!(identity.check_institution_access(Uuid::new_v4()).is_err());
    }

    #[test]
    fn api_key_is_read_from_query_string() {
        assert_eq!(
            api_key_from_query("page=2&apiKey=key_abc123"),
            Some("key_abc123".to_string())
        );
        assert_eq!(api_key_from_query("apiKey="), None);
        assert_eq!(api_key_from_query("page=2"), None);
    }

    #[test]
    fn unscoped_roles_access_any_institution() {
        let identity = RepoIdentity {
            role: AccessRole::ExternalService,
            permissions: permission_table().for_role(AccessRole::ExternalService),
            institution_id: None,
            service: Some("ranking-portal".to_string()),
        };
        assert!(identity.check_institution_access(Uuid::new_v4()).is_ok());
    }
}
