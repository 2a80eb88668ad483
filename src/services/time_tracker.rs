//! Time-tracker service.
//!
//! Fetches the tracked duration of a task and classifies it against the
//! task's estimate.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::gitlab::upstream_message;
use super::rate_limit::RequestSpacer;
use crate::config::TimeTrackerConfig;
use crate::error::{Error, Result};
use crate::models::DurationStatus;

const PROVIDER: &str = "Time tracker";

/// Service for time-tracker API operations.
#[derive(Clone)]
pub struct TimeTrackerService {
    client: Client,
    base_url: String,
    api_key: String,
    workspace_id: String,
    spacer: Arc<RequestSpacer>,
}

#[derive(Debug, Clone, Deserialize)]
struct TimeTrackerTask {
    #[serde(default)]
    duration: Option<String>,
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:\d+(?:\.\d+)?S)?$")
            .expect("duration pattern is a valid regex")
    })
}

/// Parse a `PT{h}H{m}M` duration into hours.
///
/// Hour and minute digits are joined as the decimal literal `"{h}.{m}"`:
/// `PT2H45M` is `2.45`, and `PT1H5M` and `PT1H50M` are both `1.5`. Seconds are
/// ignored. Anything unparseable is `0.0`.
pub fn parse_duration(raw: &str) -> f64 {
    let Some(captures) = duration_pattern().captures(raw.trim()) else {
        return 0.0;
    };

    let hours = captures.get(1).map(|m| m.as_str());
    let minutes = captures.get(2).map(|m| m.as_str());
    if hours.is_none() && minutes.is_none() {
        return 0.0;
    }

    format!("{}.{}", hours.unwrap_or("0"), minutes.unwrap_or("0"))
        .parse()
        .unwrap_or(0.0)
}

/// Classify tracked time against an estimate.
///
/// A missing or non-positive estimate counts as not set.
pub fn classify_duration(estimate: Option<f64>, actual: f64) -> DurationStatus {
    match estimate {
        None => DurationStatus::EstimateNotSet,
        Some(e) if e <= 0.0 => DurationStatus::EstimateNotSet,
        Some(_) if actual == 0.0 => DurationStatus::TaskNotStarted,
        Some(e) if actual > e => DurationStatus::Overdue,
        Some(_) => DurationStatus::OnTime,
    }
}

impl TimeTrackerService {
    /// Create a new time-tracker service.
    pub fn new(config: &TimeTrackerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("release-radar/0.1")
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            workspace_id: config.workspace_id.clone(),
            spacer: Arc::new(RequestSpacer::new(config.min_request_interval)),
        })
    }

    /// Hours tracked against a task, as produced by [`parse_duration`].
    pub async fn get_actual_duration(&self, task_ref: &str, project_ref: &str) -> Result<f64> {
        let url = format!(
            "{}/workspaces/{}/projects/{}/tasks/{}",
            self.base_url,
            urlencoding::encode(&self.workspace_id),
            urlencoding::encode(project_ref),
            urlencoding::encode(task_ref)
        );

        self.spacer.wait().await;
        debug!(url = %url, "Time tracker request");

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::upstream(PROVIDER, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                PROVIDER,
                format!("{}: {}", status, upstream_message(&text)),
            ));
        }

        let task: TimeTrackerTask = response
            .json()
            .await
            .map_err(|e| Error::upstream(PROVIDER, format!("Failed to parse response: {}", e)))?;

        Ok(task.duration.as_deref().map(parse_duration).unwrap_or(0.0))
    }
}
