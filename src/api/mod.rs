//! API Routes for Release Radar
//!
//! This module combines all API routes into a single router.

mod dashboard;
mod monitoring;
pub mod status;

use axum::Router;

use crate::AppState;

/// Build the complete API router.
///
/// Route structure:
/// - /dashboard/* - Release, task and bug metrics (read-only)
/// - /monitoring/* - Transaction log and frontend error reports
/// - /health/* - Health checks
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(status::routes())
        .nest("/dashboard", dashboard::routes())
        .nest("/monitoring", monitoring::routes())
}
