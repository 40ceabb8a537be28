use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    ConnectOptions, PgPool,
};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Establishes the database connection pool.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> AppResult<PgPool>;
}

/// Connector backed by a PostgreSQL connection pool
pub struct PgConnector {
    config: DatabaseConfig,
}

impl PgConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> AppResult<PgPool> {
        let url = self
            .config
            .url
            .as_deref()
            .ok_or_else(|| AppError::Configuration("DATABASE_URL is not set".to_string()))?;

        let options = PgConnectOptions::from_str(url)
            .map_err(|e| AppError::Configuration(format!("Invalid database URL: {}", e)))?
            .disable_statement_logging();

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .min_connections(self.config.min_connections)
            .acquire_timeout(Duration::from_secs(self.config.acquire_timeout_seconds))
            .connect_with(options)
            .await?;

        Ok(pool)
    }
}

/// Shared handle to the database pool.
///
/// The pool is filled in at most once, by the background connect task.
/// Until then every [`Database::pool`] call fails with
/// [`AppError::DatabaseUnavailable`].
#[derive(Clone, Default)]
pub struct Database {
    pool: Arc<OnceLock<PgPool>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the pool, or fail if the connection has not been established
    pub fn pool(&self) -> AppResult<&PgPool> {
        self.pool.get().ok_or(AppError::DatabaseUnavailable)
    }

    pub fn is_connected(&self) -> bool {
        self.pool.get().is_some()
    }

    /// Connect using `connector` and store the resulting pool
    pub async fn connect_with(&self, connector: &dyn Connector) -> AppResult<()> {
        let pool = connector.connect().await?;
        self.pool
            .set(pool)
            .map_err(|_| AppError::Internal("database pool already initialized".to_string()))
    }
}

/// Spawn the one-shot background connect attempt.
///
/// Failures are logged and otherwise ignored; there is no retry here.
pub fn spawn_connect(database: Database, connector: Arc<dyn Connector>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Connecting to database...");
        match database.connect_with(connector.as_ref()).await {
            Ok(()) => info!("Database connected"),
            Err(e) => error!(error = %e, "Database connection error"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingConnector;

    #[async_trait]
    impl Connector for FailingConnector {
        async fn connect(&self) -> AppResult<PgPool> {
            Err(AppError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    struct LazyConnector;

    #[async_trait]
    impl Connector for LazyConnector {
        async fn connect(&self) -> AppResult<PgPool> {
            Ok(PgPoolOptions::new().connect_lazy("postgres://localhost/blossom")?)
        }
    }

    #[test]
    fn test_new_database_is_disconnected() {
        let database = Database::new();
        assert!(!database.is_connected());
        assert!(matches!(database.pool(), Err(AppError::DatabaseUnavailable)));
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_database_disconnected() {
        let database = Database::new();
        spawn_connect(database.clone(), Arc::new(FailingConnector))
            .await
            .unwrap();

        assert!(!database.is_connected());
    }

    #[tokio::test]
    async fn test_successful_connect_is_visible_to_clones() {
        let database = Database::new();
        let handle = database.clone();
        spawn_connect(database, Arc::new(LazyConnector)).await.unwrap();

        assert!(handle.is_connected());
        assert!(handle.pool().is_ok());
    }

    #[tokio::test]
    async fn test_connect_only_once() {
        let database = Database::new();
        database.connect_with(&LazyConnector).await.unwrap();

        let second = database.connect_with(&LazyConnector).await;
        assert!(matches!(second, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_missing_url_is_configuration_error() {
        let connector = PgConnector::new(DatabaseConfig {
            url: None,
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_seconds: 30,
        });

        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
