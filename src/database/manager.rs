use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// SQLSTATE raised by Postgres when statement_timeout or a cancel request stops a query
const QUERY_CANCELED: &str = "57014";

/// Errors from the relational store
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Query cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                DatabaseError::Cancelled("timed out waiting for a pooled connection".to_string())
            }
            sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
                DatabaseError::Cancelled(db.message().to_string())
            }
            other => DatabaseError::Sqlx(other),
        }
    }
}

/// Build the connection string: DATABASE_URL verbatim when present,
/// otherwise assembled from the discrete PG_* settings.
pub fn build_connection_string(config: &DatabaseConfig) -> Result<String, DatabaseError> {
    if let Some(raw) = &config.url {
        url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        return Ok(raw.clone());
    }

    let mut url = url::Url::parse("postgres://localhost").map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    url.set_host(Some(&config.host))
        .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    url.set_port(Some(config.port))
        .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    url.set_username(&config.user)
        .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    if !config.password.is_empty() {
        url.set_password(Some(&config.password))
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    }
    url.set_path(&format!("/{}", config.database));
    Ok(url.into())
}

/// Create the shared pool. Connections are opened on first use, so the
/// service can start (and answer health checks) before the store is reachable.
pub fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let connection_string = build_connection_string(config)?;
    let statement_timeout = format!("{}s", config.statement_timeout_secs);
    let options = PgConnectOptions::from_str(&connection_string)?
        .options([("statement_timeout", statement_timeout.as_str())]);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_lazy_with(options);

    info!(
        host = %config.host,
        database = %config.database,
        max_connections = config.max_connections,
        "Created database pool"
    );
    Ok(pool)
}
