pub mod permissions;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;

/// Closed role set. Resolved once at the access layer boundary; handlers
/// match on the variant instead of comparing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Institution,
    Ugc,
    Aicte,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Institution => "institution",
            Role::Ugc => "ugc",
            Role::Aicte => "aicte",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "institution" => Some(Role::Institution),
            "ugc" => Some(Role::Ugc),
            "aicte" => Some(Role::Aicte),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    pub fn is_regulator(&self) -> bool {
        matches!(self, Role::Ugc | Role::Aicte)
    }

    pub fn can_review(&self) -> bool {
        self.is_regulator() || matches!(self, Role::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the role for a login email from its domain. None means the
/// domain is not authorized to log in at all.
pub fn role_for_email(email: &str) -> Option<Role> {
    let security = &config::config().security;

    if email == security.super_admin_email {
        return Some(Role::SuperAdmin);
    }
    if email.ends_with("@ugc.gov.in") {
        return Some(Role::Ugc);
    }
    if email.ends_with("@aicte.gov.in") {
        return Some(Role::Aicte);
    }
    if security
        .institution_domains
        .iter()
        .any(|domain| email.ends_with(domain.as_str()))
    {
        return Some(Role::Institution);
    }
    None
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        let now = Utc::now();
        let expiry_days = config::config().security.jwt_expiry_days;
        Self {
            sub: user_id,
            role,
            exp: (now + Duration::days(expiry_days)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
}

pub fn generate_jwt(claims: Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn verify_jwt(token: &str) -> Result<Claims, JwtError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Institution, Role::Ugc, Role::Aicte, Role::SuperAdmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("regulator"), None);
    }

    #[test]
    fn regulator_roles_can_review() {
        assert!(Role::Ugc.can_review());
        assert!(Role::Aicte.can_review());
        assert!(Role::SuperAdmin.can_review());
        assert!(!Role::Institution.can_review());
    }

    #[test]
    fn email_domain_maps_to_role() {
        assert_eq!(role_for_email("officer@ugc.gov.in"), Some(Role::Ugc));
        assert_eq!(role_for_email("officer@aicte.gov.in"), Some(Role::Aicte));
        assert_eq!(role_for_email("dean@iit.ac.in"), Some(Role::Institution));
        assert_eq!(role_for_email("someone@gmail.com"), None);
    }

    #[test]
    fn jwt_round_trip() {
        // Development profile always carries a secret
        let user_id = Uuid::new_v4();
        let token = generate_jwt(Claims::new(user_id, Role::Ugc)).expect("token");
        let claims = verify_jwt(&token).expect("claims");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Ugc);
    }
}
