//! Configuration management for the dashboard service.
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present) covering:
//! - HTTP server and SQLite store locations
//! - Credentials for the GitLab, task-tracker and time-tracker APIs
//! - Workflow and task-type identifiers used by the metrics aggregator

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gitlab: GitLabConfig,
    pub task_tracker: TaskTrackerConfig,
    pub time_tracker: TimeTrackerConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Source-control host credentials.
#[derive(Debug, Clone)]
pub struct GitLabConfig {
    /// Instance root, e.g. `https://gitlab.com`. The `/api/v4` suffix is appended by the client.
    pub url: String,
    /// Default project (numeric id or `group/name` path).
    pub project_id: String,
    pub private_token: String,
}

#[derive(Debug, Clone)]
pub struct TaskTrackerConfig {
    pub api_url: String,
    pub api_key: String,
    /// Minimum spacing between two outgoing requests.
    pub min_request_interval: Duration,
    /// Fixed wait before retrying a 429 response.
    pub retry_delay: Duration,
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    /// Custom field holding the time-tracker task id.
    pub time_task_field: String,
    /// Custom field holding the time-tracker project id.
    pub time_project_field: String,
}

#[derive(Debug, Clone)]
pub struct TimeTrackerConfig {
    pub api_url: String,
    pub api_key: String,
    pub workspace_id: String,
    pub min_request_interval: Duration,
}

/// Identifiers that only have meaning inside the task tracker's configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub in_progress_stage_id: i64,
    pub completed_stage_id: i64,
    pub bug_type_id: i64,
    /// Bugs estimated above this many hours count as critical.
    pub critical_bug_estimate_hours: f64,
    /// Task-tracker project shown on the overview dashboard.
    pub dashboard_project_id: i64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            in_progress_stage_id: 9,
            completed_stage_id: 10,
            bug_type_id: 2,
            critical_bug_estimate_hours: 8.0,
            dashboard_project_id: 0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let metrics_defaults = MetricsConfig::default();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_parse("PORT", 8080),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/release-radar.db"),
            },
            gitlab: GitLabConfig {
                url: env_or("GITLAB_URL", "https://gitlab.com"),
                project_id: env_or("GITLAB_PROJECT_ID", ""),
                private_token: env_or("GITLAB_PRIVATE_TOKEN", ""),
            },
            task_tracker: TaskTrackerConfig {
                api_url: env_or("TASK_TRACKER_API_URL", "http://localhost:9000/api"),
                api_key: env_or("TASK_TRACKER_API_KEY", ""),
                min_request_interval: Duration::from_millis(env_parse(
                    "TASK_TRACKER_MIN_INTERVAL_MS",
                    1000,
                )),
                retry_delay: Duration::from_millis(env_parse("TASK_TRACKER_RETRY_DELAY_MS", 2000)),
                max_attempts: env_parse("TASK_TRACKER_MAX_ATTEMPTS", 3),
                time_task_field: env_or("TASK_TRACKER_TIME_TASK_FIELD", "time_task_id"),
                time_project_field: env_or("TASK_TRACKER_TIME_PROJECT_FIELD", "time_project_id"),
            },
            time_tracker: TimeTrackerConfig {
                api_url: env_or("TIME_TRACKER_API_URL", "https://api.clockify.me/api/v1"),
                api_key: env_or("TIME_TRACKER_API_KEY", ""),
                workspace_id: env_or("TIME_TRACKER_WORKSPACE_ID", ""),
                min_request_interval: Duration::from_millis(env_parse(
                    "TIME_TRACKER_MIN_INTERVAL_MS",
                    1000,
                )),
            },
            metrics: MetricsConfig {
                in_progress_stage_id: env_parse(
                    "METRICS_IN_PROGRESS_STAGE_ID",
                    metrics_defaults.in_progress_stage_id,
                ),
                completed_stage_id: env_parse(
                    "METRICS_COMPLETED_STAGE_ID",
                    metrics_defaults.completed_stage_id,
                ),
                bug_type_id: env_parse("METRICS_BUG_TYPE_ID", metrics_defaults.bug_type_id),
                critical_bug_estimate_hours: env_parse(
                    "METRICS_CRITICAL_BUG_HOURS",
                    metrics_defaults.critical_bug_estimate_hours,
                ),
                dashboard_project_id: env_parse(
                    "DASHBOARD_PROJECT_ID",
                    metrics_defaults.dashboard_project_id,
                ),
            },
        }
    }

    /// Environment variables whose values are missing; the service still
    /// starts, but requests that need them will fail upstream.
    pub fn unset_settings(&self) -> Vec<&'static str> {
        let blank = [
            ("GITLAB_PROJECT_ID", &self.gitlab.project_id),
            ("GITLAB_PRIVATE_TOKEN", &self.gitlab.private_token),
            ("TASK_TRACKER_API_KEY", &self.task_tracker.api_key),
            ("TIME_TRACKER_API_KEY", &self.time_tracker.api_key),
            ("TIME_TRACKER_WORKSPACE_ID", &self.time_tracker.workspace_id),
        ];

        let mut unset: Vec<&'static str> = blank
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| key)
            .collect();

        if self.metrics.dashboard_project_id <= 0 {
            unset.push("DASHBOARD_PROJECT_ID");
        }

        unset
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset or malformed.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring malformed configuration value");
            default
        }),
        Err(_) => default,
    }
}
