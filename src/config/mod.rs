//! Configuration management for Toolhub Core

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Session token verification
    pub session: SessionConfig,
    /// Authorization resolver tuning
    pub authz: AuthzConfig,
    /// Logging and metrics
    pub telemetry: TelemetryConfig,
    /// Apply pending migrations before serving
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Settings for verifying session tokens minted by the identity provider.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Shared HS256 secret
    pub secret: String,
    /// Expected `iss` claim
    pub issuer: String,
    /// Name of the cookie carrying the session token
    pub cookie_name: String,
    /// Lifetime of tokens minted by `JwtManager::create_session_token`
    pub token_ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Upper bound for any single store call made while resolving a decision
    pub store_timeout_ms: u64,
}

impl AuthzConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "pretty"
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_enabled: false,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },
            session: SessionConfig {
                secret: env::var("SESSION_JWT_SECRET").context("SESSION_JWT_SECRET is required")?,
                issuer: env::var("SESSION_JWT_ISSUER")
                    .unwrap_or_else(|_| "https://id.toolhub.local".to_string()),
                cookie_name: env::var("SESSION_COOKIE_NAME")
                    .unwrap_or_else(|_| "toolhub_session".to_string()),
                token_ttl_secs: env::var("SESSION_TOKEN_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
            },
            authz: AuthzConfig {
                store_timeout_ms: env::var("AUTHZ_STORE_TIMEOUT_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()
                    .context("Invalid AUTHZ_STORE_TIMEOUT_MS")?,
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                metrics_enabled: env_flag("METRICS_ENABLED", false),
            },
            run_migrations: env_flag("RUN_MIGRATIONS", false),
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
