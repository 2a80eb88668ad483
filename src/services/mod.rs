//! Business logic services.
//!
//! - Provider clients for GitLab, the task tracker and the time tracker
//! - Request spacing shared by the rate-limited clients
//! - The metrics aggregator joining all three

pub mod gitlab;
pub mod metrics;
pub mod rate_limit;
pub mod task_tracker;
pub mod time_tracker;

pub use gitlab::{GitLabService, UNKNOWN_BRANCH};
pub use metrics::MetricsService;
pub use rate_limit::RequestSpacer;
pub use task_tracker::TaskTrackerService;
pub use time_tracker::{classify_duration, parse_duration, TimeTrackerService};
