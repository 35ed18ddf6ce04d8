use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::auth::{self, Claims, Role};
use crate::error::ApiError;

/// Cookie holding the session JWT, set at login.
pub const SESSION_COOKIE: &str = "accessToken";

/// Authenticated user context extracted from a verified JWT.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
        }
    }
}

impl AuthUser {
    pub fn require_super_admin(&self) -> Result<(), ApiError> {
        if self.role != Role::SuperAdmin {
            return Err(ApiError::forbidden("Super admin access required"));
        }
        Ok(())
    }

    pub fn require_reviewer(&self) -> Result<(), ApiError> {
        if !self.role.can_review() {
            return Err(ApiError::forbidden("Reviewer access required"));
        }
        Ok(())
    }

    pub fn require_institution(&self) -> Result<(), ApiError> {
        if self.role != Role::Institution {
            return Err(ApiError::forbidden("Institution access required"));
        }
        Ok(())
    }
}

/// JWT authentication middleware; rejects the request outright when the
/// token is missing or invalid and injects [`AuthUser`] otherwise.
pub async fn jwt_auth_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(&headers).map_err(ApiError::unauthorized)?;
    let claims = auth::verify_jwt(&token).map_err(|e| ApiError::unauthorized(e.to_string()))?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Session token from the `Authorization` header, falling back to the
/// `accessToken` cookie when no header is present.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Result<String, String> {
    if headers.contains_key("authorization") {
        return extract_bearer_token(headers);
    }

    let jar = CookieJar::from_headers(headers);
    match jar.get(SESSION_COOKIE) {
        Some(cookie) if !cookie.value().trim().is_empty() => Ok(cookie.value().to_string()),
        _ => Err("Missing Authorization header or session cookie".to_string()),
    }
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
        Some(_) => Err("Empty JWT token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_and_malformed_headers_are_rejected() {
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert!(extract_bearer_token(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn session_token_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; accessToken=abc.def.ghi"),
        );
        assert_eq!(extract_session_token(&headers).unwrap(), "abc.def.ghi");

        assert!(extract_session_token(&HeaderMap::new()).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("accessToken="));
        assert!(extract_session_token(&headers).is_err());
    }

    #[test]
    fn bearer_header_takes_precedence_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer from.header"));
        headers.insert("cookie", HeaderValue::from_static("accessToken=from.cookie"));
        assert_eq!(extract_session_token(&headers).unwrap(), "from.header");
    }

    #[test]
    fn role_guards() {
        let admin = AuthUser { user_id: Uuid::new_v4(), role: Role::SuperAdmin };
        assert!(admin.require_super_admin().is_ok());
        assert!(admin.require_reviewer().is_ok());

        let ugc = AuthUser { user_id: Uuid::new_v4(), role: Role::Ugc };
        assert!(ugc.require_super_admin().is_err());
        assert!(ugc.require_reviewer().is_ok());

        let institution = AuthUser { user_id: Uuid::new_v4(), role: Role::Institution };
        assert!(institution.require_reviewer().is_err());
        assert!(institution.require_institution().is_ok());
    }
}
