//! Release Radar - delivery metrics dashboard
//!
//! Aggregates GitLab releases, task-tracker work items and time-tracker
//! durations into release comparisons and task/bug rollups.
//!
//! Library exports for testing and external use.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use config::config;
pub use error::{Error, Result};
pub use state::AppState;
