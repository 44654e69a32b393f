use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::runner::JobRunner;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub runner: Arc<JobRunner>,
}

impl AppState {
    pub fn new(db: SqlitePool, runner: JobRunner) -> Self {
        Self {
            db,
            runner: Arc::new(runner),
        }
    }
}
