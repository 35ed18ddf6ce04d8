use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{self, Claims, Role};
use crate::database::models::User;
use crate::error::ApiError;

/// Salted SHA-256 digest, stored as `salt$hex`.
pub fn hash_password(password: &str) -> String {
    let salt: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    format!("{}${}", salt, digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => digest(salt, password) == expected,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub role: Role,
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Login: role comes from the email domain; first login provisions
    /// the user, later logins verify the stored digest.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let role = auth::role_for_email(email)
            .ok_or_else(|| ApiError::forbidden("Email domain not authorized"))?;

        let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        let user = match existing {
            Some(user) => {
                if !verify_password(password, &user.password_hash) {
                    return Err(ApiError::unauthorized("Invalid credentials"));
                }
                user
            }
            None => {
                let now = Utc::now();
                let user: User = sqlx::query_as(
                    "INSERT INTO users (name, email, password_hash, role, created_at, updated_at) \
                     VALUES ('', $1, $2, $3, $4, $4) \
                     RETURNING *",
                )
                .bind(email)
                .bind(hash_password(password))
                .bind(role.as_str())
                .bind(now)
                .fetch_one(&self.pool)
                .await?;
                tracing::info!(user_id = %user.id, role = role.as_str(), "user auto-provisioned");
                user
            }
        };

        let role = user
            .role()
            .ok_or_else(|| ApiError::internal_server_error("User has an unknown role"))?;
        let token = auth::generate_jwt(Claims::new(user.id, role))
            .map_err(|e| ApiError::internal_server_error(e.to_string()))?;

        Ok(LoginOutcome { token, role })
    }

    pub async fn get(&self, user_id: Uuid) -> Result<User, ApiError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        user.ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list(
        &self,
        role: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<User>, ApiError> {
        let role_filter = role.filter(|r| *r != "all");
        let pattern = search.map(|s| format!("%{}%", s));
        let users = sqlx::query_as(
            "SELECT * FROM users \
             WHERE ($1::text IS NULL OR role = $1) \
               AND ($2::text IS NULL OR name ILIKE $2 OR email ILIKE $2) \
             ORDER BY created_at DESC",
        )
        .bind(role_filter)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, ApiError> {
        if self.get_by_email(email).await?.is_some() {
            return Err(ApiError::bad_request(
                "User with this email already exists",
            ));
        }

        let now = Utc::now();
        let user: User = sqlx::query_as(
            "INSERT INTO users (name, email, password_hash, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             RETURNING *",
        )
        .bind(name)
        .bind(email)
        .bind(hash_password(password))
        .bind(role.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        role: Option<Role>,
        password: Option<&str>,
    ) -> Result<User, ApiError> {
        let user = self.get(user_id).await?;

        if let Some(new_email) = email {
            let taken: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id <> $2")
                    .bind(new_email)
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if taken.is_some() {
                return Err(ApiError::bad_request("Email already in use"));
            }
        }

        let password_hash = password.map(hash_password);
        let updated: User = sqlx::query_as(
            "UPDATE users SET \
               name = COALESCE($2, name), \
               email = COALESCE($3, email), \
               role = COALESCE($4, role), \
               password_hash = COALESCE($5, password_hash), \
               updated_at = $6 \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(user.id)
        .bind(name)
        .bind(email)
        .bind(role.map(|r| r.as_str()))
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    /// Delete a user; an institution user's owned data cascades.
    pub async fn delete(&self, user_id: Uuid, acting_user: Uuid) -> Result<(), ApiError> {
        if user_id == acting_user {
            return Err(ApiError::bad_request("Cannot delete your own account"));
        }

        let user = self.get(user_id).await?;

        if user.role() == Some(Role::Institution) {
            let institutions: Vec<(Uuid,)> =
                sqlx::query_as("SELECT id FROM institutions WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?;
            for (institution_id,) in institutions {
                self.delete_institution_data(institution_id).await?;
            }
        }

        // Detach rows that merely reference the user before removing it.
        sqlx::query("UPDATE applications SET approved_by_user = NULL WHERE approved_by_user = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE documents SET uploaded_by = NULL WHERE uploaded_by = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE api_keys SET created_by = NULL WHERE created_by = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_institution_data(&self, institution_id: Uuid) -> Result<(), ApiError> {
        // Child rows first to satisfy foreign keys.
        sqlx::query("DELETE FROM ai_reports WHERE application_id IN (SELECT id FROM applications WHERE institution_id = $1)")
            .bind(institution_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM ai_analyses WHERE institution_id = $1")
            .bind(institution_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM documents WHERE institution_id = $1")
            .bind(institution_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM institution_parameters WHERE institution_id = $1")
            .bind(institution_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM applications WHERE institution_id = $1")
            .bind(institution_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE api_keys SET institution_id = NULL WHERE institution_id = $1")
            .bind(institution_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM institutions WHERE id = $1")
            .bind(institution_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let stored = hash_password("s3cret");
        assert!(verify_password("s3cret", &stored));
        assert!(!verify_password("wrong", &stored));
    }

    #[test]
    fn stored_digest_is_salted() {
        let a = hash_password("same");
        let b = hash_password("same");
        assert_ne!(a, b);
        assert!(verify_password("same", &a));
        assert!(verify_password("same", &b));
    }

    #[test]
    fn malformed_stored_hash_rejects() {
        assert!(!verify_password("anything", "no-salt-separator"));
    }
}
