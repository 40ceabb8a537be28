mod cors;
mod database;
mod server;

pub use cors::{CorsConfig, DEFAULT_FRONTEND_ORIGIN};
pub use database::DatabaseConfig;
pub use server::ServerConfig;

use crate::error::{AppError, AppResult};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated the same as missing ones.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_host = var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let server_port = parse_or(var("PORT"), "PORT", 3000u16)?;

        let allowed_origins = CorsConfig::parse_origins(var("FRONTEND_URLS").as_deref());

        let db_max_connections = parse_or(var("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 10u32)?;
        let db_min_connections = parse_or(var("DB_MIN_CONNECTIONS"), "DB_MIN_CONNECTIONS", 0u32)?;
        let db_acquire_timeout = parse_or(
            var("DB_ACQUIRE_TIMEOUT_SECONDS"),
            "DB_ACQUIRE_TIMEOUT_SECONDS",
            30u64,
        )?;

        let config = Config {
            server: ServerConfig {
                host: server_host,
                port: server_port,
            },
            cors: CorsConfig { allowed_origins },
            database: DatabaseConfig {
                url: var("DATABASE_URL"),
                max_connections: db_max_connections,
                min_connections: db_min_connections,
                acquire_timeout_seconds: db_acquire_timeout,
            },
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> AppResult<()> {
        self.server.validate().map_err(AppError::Configuration)?;
        self.cors.validate().map_err(AppError::Configuration)?;
        self.database.validate().map_err(AppError::Configuration)?;
        Ok(())
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> AppResult<T> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}", key))),
        None => Ok(default),
    }
}
