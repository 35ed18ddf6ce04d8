use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub ai: AiConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_days: i64,
    /// Email address granted the super_admin role on first login.
    pub super_admin_email: String,
    /// Domain suffixes that map to the institution role.
    pub institution_domains: Vec<String>,
    pub enable_cors: bool,
}

/// External AI scoring service. Primary host is tried first, then fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub primary_url: Option<String>,
    pub fallback_url: String,
    pub request_timeout_secs: u64,
}

/// External object store holding uploaded documents and generated reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout_secs =
                v.parse().unwrap_or(self.database.connection_timeout_secs);
        }

        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_DAYS") {
            self.security.jwt_expiry_days = v.parse().unwrap_or(self.security.jwt_expiry_days);
        }
        if let Ok(v) = env::var("SUPER_ADMIN_EMAIL") {
            self.security.super_admin_email = v;
        }
        if let Ok(v) = env::var("INSTITUTION_DOMAINS") {
            self.security.institution_domains =
                v.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(v) = env::var("AI_SERVER_URL") {
            self.ai.primary_url = Some(v);
        }
        if let Ok(v) = env::var("AI_LOCAL_URL") {
            self.ai.fallback_url = v;
        }
        if let Ok(v) = env::var("AI_REQUEST_TIMEOUT_SECS") {
            self.ai.request_timeout_secs = v.parse().unwrap_or(self.ai.request_timeout_secs);
        }

        if let Ok(v) = env::var("STORAGE_BASE_URL") {
            self.storage.base_url = v;
        }
        if let Ok(v) = env::var("STORAGE_REQUEST_TIMEOUT_SECS") {
            self.storage.request_timeout_secs =
                v.parse().unwrap_or(self.storage.request_timeout_secs);
        }

        self
    }

    fn base_security() -> SecurityConfig {
        SecurityConfig {
            jwt_secret: String::new(),
            jwt_expiry_days: 10,
            super_admin_email: "admin@accreditation.gov.in".to_string(),
            institution_domains: vec![
                ".edu".to_string(),
                ".ac.in".to_string(),
                ".college.edu".to_string(),
                ".university.in".to_string(),
            ],
            enable_cors: true,
        }
    }

    fn base_ai() -> AiConfig {
        AiConfig {
            primary_url: None,
            fallback_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 30,
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout_secs: 30,
            },
            security: SecurityConfig {
                jwt_secret: "dev-only-secret".to_string(),
                ..Self::base_security()
            },
            ai: Self::base_ai(),
            storage: StorageConfig {
                base_url: "http://127.0.0.1:9000".to_string(),
                request_timeout_secs: 30,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout_secs: 10,
            },
            security: Self::base_security(),
            ai: Self::base_ai(),
            storage: StorageConfig {
                base_url: "http://127.0.0.1:9000".to_string(),
                request_timeout_secs: 30,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout_secs: 5,
            },
            security: Self::base_security(),
            ai: Self::base_ai(),
            storage: StorageConfig {
                base_url: "http://127.0.0.1:9000".to_string(),
                request_timeout_secs: 10,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.security.jwt_expiry_days, 10);
        assert_eq!(config.ai.request_timeout_secs, 30);
        assert!(config.ai.primary_url.is_none());
    }

    #[test]
    fn institution_domains_present_in_all_profiles() {
        for config in [
            AppConfig::development(),
            AppConfig::staging(),
            AppConfig::production(),
        ] {
            assert!(config
                .security
                .institution_domains
                .contains(&".ac.in".to_string()));
        }
    }
}
