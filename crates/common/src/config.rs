//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection URL (PostgreSQL)
    pub database_url: String,

    /// Identity provider token verification
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,

    /// External question/passage provider
    pub content_provider: String,
    pub content_api_url: Option<String>,
    pub content_api_key: Option<String>,

    /// Store bounds
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,

    /// Runtime configuration
    pub cors_allowed_origins: Option<String>,
    pub rust_log: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?,

            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET is required"))?,
            jwt_issuer: env::var("JWT_ISSUER").ok(),
            jwt_audience: env::var("JWT_AUDIENCE").ok(),

            content_provider: env::var("CONTENT_PROVIDER").unwrap_or_else(|_| "mock".to_string()),
            content_api_url: env::var("CONTENT_API_URL").ok(),
            content_api_key: env::var("CONTENT_API_KEY").ok(),

            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            db_acquire_timeout_secs: parse_or("DB_ACQUIRE_TIMEOUT_SECS", 5),
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 15),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "skillgate=debug".to_string()),
            port: parse_or("PORT", 3000),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would only fail later at request time
    pub fn validate(&self) -> Result<()> {
        if self.content_provider == "http" && self.content_api_url.is_none() {
            anyhow::bail!("CONTENT_API_URL is required when CONTENT_PROVIDER=http");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn db_acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.db_acquire_timeout_secs)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
