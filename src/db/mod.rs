use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use crate::models::job::JobStatus;

/// Initialize the SQLite connection pool.
///
/// WAL journaling keeps job-status reads from blocking behind the writers
/// that drive the lifecycle.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(10));

    SqlitePoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Errors surfaced by the job store and ledger.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The durable backend could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// The requested status change is not a legal edge of the job state
    /// machine. Indicates a logic error in the caller, not a data problem.
    #[error("invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// The queried job does not exist.
    #[error("job not found")]
    NotFound,

    /// A result payload could not be serialized for storage.
    #[error("failed to encode result payload: {0}")]
    Encode(#[from] serde_json::Error),
}

pub mod queries;
