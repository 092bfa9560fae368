//! Environment-driven server configuration.

use std::env;

use stash_engine::DEFAULT_IDENTITY_KEY;

/// Default cap on the combined size of one user's serialized snapshots.
/// The engine pushes wholesale, so without a cap a runaway local store
/// grows the user_data row without bound.
pub const DEFAULT_MAX_SNAPSHOT_BYTES: usize = 1024 * 1024;

/// Runtime configuration for the account server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Connection pool size.
    pub database_max_connections: u32,
    /// Bearer secret; when unset the server runs open, which matches
    /// local development against an engine without a token.
    pub auth_secret: Option<String>,
    /// Reserved key for the client-side identity record. Snapshots
    /// carrying it are rejected on upsert.
    pub identity_key: String,
    /// Upper bound on the combined serialized size of both snapshots in
    /// one upsert.
    pub max_snapshot_bytes: usize,
}

impl Config {
    /// Load configuration from the environment. Only `DATABASE_URL` is
    /// required; everything else has a development default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 3000)?,
            database_url: env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            auth_secret: env::var("AUTH_SECRET").ok(),
            identity_key: env::var("IDENTITY_KEY")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_KEY.to_string()),
            max_snapshot_bytes: parse_var("MAX_SNAPSHOT_BYTES", DEFAULT_MAX_SNAPSHOT_BYTES)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("{0} must be a valid number")]
    InvalidNumber(&'static str),
}
