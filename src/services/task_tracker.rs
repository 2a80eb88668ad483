//! Task-tracker service.
//!
//! Provides API access to the task tracker for:
//! - Project listing and client-side project search
//! - User listing
//! - Task listing per project, restricted to the tracked workflow stages
//!
//! Every call waits on the client's [`RequestSpacer`] first, and HTTP 429
//! responses are retried with a fixed backoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::gitlab::upstream_message;
use super::rate_limit::RequestSpacer;
use crate::config::{MetricsConfig, TaskTrackerConfig};
use crate::error::{Error, Result};
use crate::models::{Project, ProjectSummary, Task, TimeTrackingRefs, TrackerUser};

const PROVIDER: &str = "Task tracker";

/// Service for task-tracker API operations.
#[derive(Clone)]
pub struct TaskTrackerService {
    client: Client,
    base_url: String,
    api_key: String,
    spacer: Arc<RequestSpacer>,
    retry_delay: Duration,
    max_attempts: u32,
    time_task_field: String,
    time_project_field: String,
    in_progress_stage_id: i64,
    completed_stage_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct TrackerProject {
    id: i64,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct TrackerUserRecord {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TrackerTask {
    id: Value,
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    workflow_stage_id: i64,
    type_id: i64,
    #[serde(default)]
    estimated_hours: Option<f64>,
    #[serde(default)]
    custom_fields: Vec<CustomField>,
}

#[derive(Debug, Clone, Deserialize)]
struct CustomField {
    name: String,
    #[serde(default)]
    value: Option<Value>,
}

/// Render a scalar JSON value as a plain string; empty values become `None`.
fn scalar_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

impl TrackerTask {
    fn custom_field(&self, name: &str) -> Option<String> {
        self.custom_fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_ref())
            .and_then(scalar_to_string)
    }

    fn into_task(self, time_task_field: &str, time_project_field: &str) -> Task {
        let time_tracking = match (
            self.custom_field(time_task_field),
            self.custom_field(time_project_field),
        ) {
            (Some(task_ref), Some(project_ref)) => Some(TimeTrackingRefs {
                task_ref,
                project_ref,
            }),
            _ => None,
        };

        Task {
            id: scalar_to_string(&self.id).unwrap_or_default(),
            name: self.name,
            status: self.status.unwrap_or_default(),
            priority: self.priority.as_ref().and_then(scalar_to_string),
            created_at: self.created_at,
            updated_at: self.updated_at,
            workflow_stage_id: self.workflow_stage_id,
            type_id: self.type_id,
            estimate_hours: self.estimated_hours,
            time_tracking,
        }
    }
}

impl TaskTrackerService {
    /// Create a new task-tracker service.
    pub fn new(config: &TaskTrackerConfig, metrics: &MetricsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("release-radar/0.1")
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            spacer: Arc::new(RequestSpacer::new(config.min_request_interval)),
            retry_delay: config.retry_delay,
            max_attempts: config.max_attempts.max(1),
            time_task_field: config.time_task_field.clone(),
            time_project_field: config.time_project_field.clone(),
            in_progress_stage_id: metrics.in_progress_stage_id,
            completed_stage_id: metrics.completed_stage_id,
        })
    }

    /// GET a JSON resource, honouring request spacing and retrying on 429.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.spacer.wait().await;
            debug!(url = %url, attempt, "Task tracker request");

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_key)
                .query(query)
                .send()
                .await
                .map_err(|e| Error::upstream(PROVIDER, format!("Request failed: {}", e)))?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < self.max_attempts {
                    warn!(
                        url = %url,
                        attempt,
                        delay_ms = self.retry_delay.as_millis() as u64,
                        "Rate limited by task tracker, retrying"
                    );
                    sleep(self.retry_delay).await;
                    continue;
                }
                return Err(Error::upstream(
                    PROVIDER,
                    format!("Rate limit exceeded after {} attempts", attempt),
                ));
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(Error::upstream(
                    PROVIDER,
                    format!("{}: {}", status, upstream_message(&text)),
                ));
            }

            return response.json().await.map_err(|e| {
                Error::upstream(PROVIDER, format!("Failed to parse response: {}", e))
            });
        }
    }

    /// List every project visible to the API key.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let projects: Vec<TrackerProject> = self.get_json("/projects", &[]).await?;

        Ok(projects
            .into_iter()
            .map(|p| Project {
                id: p.id,
                name: p.name,
                description: p.description,
                archived: p.archived,
            })
            .collect())
    }

    /// Case-insensitive substring search over project names.
    ///
    /// The tracker has no server-side filter, so the full list is fetched.
    pub async fn search_projects(&self, term: &str) -> Result<Vec<ProjectSummary>> {
        let needle = term.trim().to_lowercase();
        let projects = self.list_projects().await?;

        Ok(projects
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .map(ProjectSummary::from)
            .collect())
    }

    pub async fn list_users(&self) -> Result<Vec<TrackerUser>> {
        let users: Vec<TrackerUserRecord> = self.get_json("/users", &[]).await?;

        Ok(users
            .into_iter()
            .map(|u| {
                let name = u.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| {
                    [u.first_name, u.last_name]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(" ")
                });
                TrackerUser { id: u.id, name }
            })
            .collect())
    }

    async fn list_tasks_in_stage(&self, project_id: i64, stage_id: i64) -> Result<Vec<Task>> {
        let path = format!("/projects/{}/tasks", project_id);
        let tasks: Vec<TrackerTask> = self
            .get_json(&path, &[("workflow_stage_id", stage_id.to_string())])
            .await?;

        Ok(tasks
            .into_iter()
            .map(|t| t.into_task(&self.time_task_field, &self.time_project_field))
            .collect())
    }

    /// Tasks in the in-progress and completed stages, in that order.
    pub async fn list_tasks_for_project(&self, project_id: i64) -> Result<Vec<Task>> {
        let (mut tasks, completed) = tokio::try_join!(
            self.list_tasks_in_stage(project_id, self.in_progress_stage_id),
            self.list_tasks_in_stage(project_id, self.completed_stage_id),
        )?;

        tasks.extend(completed);
        info!(project_id, count = tasks.len(), "Fetched project tasks");

        Ok(tasks)
    }
}
