use axum::{response::Json, Extension};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::manager::DatabaseManager;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::auth::{AuthUser, SESSION_COOKIE};
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::UserService;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login - authenticate or auto-provision by email domain.
/// The token comes back in the body and as an `accessToken` session cookie.
pub async fn login_post(
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let pool = DatabaseManager::pool().await?;
    let outcome = UserService::new(pool)
        .login(body.email.trim(), &body.password)
        .await?;

    let mut cookie = Cookie::new(SESSION_COOKIE, outcome.token.clone());
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);

    Ok((
        jar.add(cookie),
        ApiResponse::success(json!({
            "token": outcome.token,
            "role": outcome.role,
        })),
    ))
}

/// GET /api/auth/whoami - current authenticated user.
pub async fn whoami_get(Extension(user): Extension<AuthUser>) -> ApiResult<User> {
    let pool = DatabaseManager::pool().await?;
    let current = UserService::new(pool).get(user.user_id).await?;
    Ok(ApiResponse::success(current))
}
