//! Configuration loading and representation.
//!
//! Sources, lowest to highest precedence:
//! 1. built-in defaults
//! 2. environment variables prefixed `SABUESO_` (e.g. `SABUESO_DATABASE_URL`)

use config::{Config, Environment};
use serde::Deserialize;
use thiserror::Error;

pub const DEV_JWT_SECRET: &str = "dev-secret";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SESSION_TTL_MINUTES: i64 = 60 * 12;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres connection string. `None` runs on in-memory stores.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// HS256 signing secret for session tokens.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: i64,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL used to build links in outgoing mail.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            jwt_secret: None,
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(env_source())
    }

    fn from_source(env: Environment) -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .set_default("bind_addr", DEFAULT_BIND_ADDR)?
            .set_default("public_base_url", DEFAULT_PUBLIC_BASE_URL)?
            .set_default("session_ttl_minutes", DEFAULT_SESSION_TTL_MINUTES)?
            .set_default("db_max_connections", i64::from(DEFAULT_DB_MAX_CONNECTIONS))?
            .set_default("log_format", "json")?
            .add_source(env.try_parsing(true))
            .build()?;

        let mut app: AppConfig = cfg.try_deserialize()?;
        app.database_url = app.database_url.filter(|u| !u.trim().is_empty());
        app.jwt_secret = app.jwt_secret.filter(|s| !s.is_empty());
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "session_ttl_minutes must be positive".to_string(),
            ));
        }
        if self.db_max_connections == 0 {
            return Err(ConfigError::Invalid(
                "db_max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Signing secret, or the insecure development default.
    pub fn jwt_secret_or_dev(&self) -> &str {
        self.jwt_secret.as_deref().unwrap_or(DEV_JWT_SECRET)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes)
    }
}

/// `SABUESO_DATABASE_URL` maps to `database_url`.
fn env_source() -> Environment {
    Environment::with_prefix("SABUESO")
        .prefix_separator("_")
        .separator("__")
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_public_base_url() -> String {
    DEFAULT_PUBLIC_BASE_URL.to_string()
}

fn default_session_ttl_minutes() -> i64 {
    DEFAULT_SESSION_TTL_MINUTES
}

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}
