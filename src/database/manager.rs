use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config;

/// Errors raised by the store layer: naming, provisioning, migration and queries
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    /// Rejected identifier or tenant id; never reaches SQL
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Tenant-scoped uniqueness violation, e.g. agent_number or email already taken
    #[error("Duplicate {field}: {value}")]
    Duplicate { field: String, value: String },

    #[error("Migration step '{step}' failed: {reason}")]
    MigrationStepFailed { step: &'static str, reason: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map a unique violation to `Duplicate`, naming the column from the constraint name.
    /// Any other error passes through unchanged.
    pub fn from_unique_violation(err: sqlx::Error, candidates: &[(&str, &str)]) -> Self {
        let constraint = err
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .map(|db| db.constraint().unwrap_or_default().to_string());

        match constraint {
            Some(constraint) => {
                let (field, value) = candidates
                    .iter()
                    .find(|(field, _)| constraint.contains(field))
                    .or_else(|| candidates.first())
                    .map(|(f, v)| (f.to_string(), v.to_string()))
                    .unwrap_or_else(|| (constraint.clone(), String::new()));
                DatabaseError::Duplicate { field, value }
            }
            None => DatabaseError::Sqlx(err),
        }
    }
}

/// Process-wide connection pool for the single application database.
/// Shared tables (companies, users, master_users, legacy agents/calls/breaks)
/// and every per-tenant table live in the same database.
pub struct DatabaseManager;

static POOL: OnceCell<PgPool> = OnceCell::const_new();

impl DatabaseManager {
    /// Get the application pool, connecting lazily on first use
    pub async fn pool() -> Result<PgPool, DatabaseError> {
        let pool = POOL
            .get_or_try_init(|| async {
                let url = std::env::var("DATABASE_URL")
                    .map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
                Self::connect(&url).await
            })
            .await?;
        Ok(pool.clone())
    }

    /// Open a new pool using the configured limits
    pub async fn connect(database_url: &str) -> Result<PgPool, DatabaseError> {
        let redacted = Self::redact_url(database_url)?;
        let settings = &config::config().database;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.connection_timeout))
            .connect(database_url)
            .await?;

        info!("Created database pool for: {}", redacted);
        Ok(pool)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Close the shared pool (e.g., on shutdown)
    pub async fn close() {
        if let Some(pool) = POOL.get() {
            pool.close().await;
            info!("Closed database pool");
        }
    }

    /// Strip credentials so the URL can be logged
    pub fn redact_url(database_url: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !url.username().is_empty() {
            url.set_username("***").map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        if url.password().is_some() {
            url.set_password(Some("***")).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(url.into())
    }

    /// Quote SQL identifier to prevent injection
    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
