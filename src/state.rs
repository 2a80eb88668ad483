//! Application state for the dashboard service.
//!
//! Contains the shared state that is passed to all handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::{GitLabService, MetricsService, TaskTrackerService, TimeTrackerService};
use crate::Result;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (transaction log).
    pub db: DbPool,
    /// Metrics aggregation over the three provider clients.
    pub metrics: MetricsService,
}

impl AppState {
    /// Create a new application state, connecting the database and
    /// initializing all services.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::init_pool(&config.database.path).await?;
        crate::db::initialize_schema(&db).await?;

        Self::with_pool(db, config)
    }

    /// Build the services around an existing pool.
    pub fn with_pool(db: DbPool, config: &Config) -> Result<Self> {
        let gitlab = Arc::new(GitLabService::new(&config.gitlab)?);
        let tasks = Arc::new(TaskTrackerService::new(
            &config.task_tracker,
            &config.metrics,
        )?);
        let time = Arc::new(TimeTrackerService::new(&config.time_tracker)?);

        let metrics = MetricsService::new(gitlab, tasks, time, config.metrics.clone());

        Ok(Self { db, metrics })
    }
}
