//! Common test utilities: configuration pointing at mock upstreams and
//! upstream JSON fixtures.

#![allow(dead_code)]

use std::time::Duration;

use release_radar::config::{
    Config, DatabaseConfig, GitLabConfig, MetricsConfig, ServerConfig, TaskTrackerConfig,
    TimeTrackerConfig,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const GITLAB_PROJECT: &str = "42";
pub const WORKSPACE: &str = "ws-1";

/// Mock servers standing in for the three upstream providers.
pub struct Upstreams {
    pub gitlab: MockServer,
    pub tracker: MockServer,
    pub time: MockServer,
}

impl Upstreams {
    pub async fn start() -> Self {
        Self {
            gitlab: MockServer::start().await,
            tracker: MockServer::start().await,
            time: MockServer::start().await,
        }
    }

    /// Configuration with spacing and retry delays turned off.
    pub fn config(&self) -> Config {
        test_config(&self.gitlab.uri(), &self.tracker.uri(), &self.time.uri())
    }
}

pub fn test_config(gitlab_url: &str, tracker_url: &str, time_url: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            path: ":memory:".to_string(),
        },
        gitlab: GitLabConfig {
            url: gitlab_url.to_string(),
            project_id: GITLAB_PROJECT.to_string(),
            private_token: "glpat-test".to_string(),
        },
        task_tracker: TaskTrackerConfig {
            api_url: tracker_url.to_string(),
            api_key: "tracker-key".to_string(),
            min_request_interval: Duration::ZERO,
            retry_delay: Duration::from_millis(10),
            max_attempts: 3,
            time_task_field: "time_task_id".to_string(),
            time_project_field: "time_project_id".to_string(),
        },
        time_tracker: TimeTrackerConfig {
            api_url: time_url.to_string(),
            api_key: "time-key".to_string(),
            workspace_id: WORKSPACE.to_string(),
            min_request_interval: Duration::ZERO,
        },
        metrics: MetricsConfig {
            dashboard_project_id: 1,
            ..MetricsConfig::default()
        },
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn tag_json(name: &str, sha: &str, created_at: &str) -> Value {
    json!({
        "name": name,
        "message": "",
        "target": sha,
        "commit": {
            "id": sha,
            "short_id": &sha[..8.min(sha.len())],
            "title": format!("Release {}", name),
            "created_at": created_at,
            "committed_date": created_at,
        },
        "release": null,
        "protected": false,
    })
}

pub fn commit_json(n: usize) -> Value {
    json!({
        "id": format!("{:040x}", n),
        "short_id": format!("{:08x}", n),
        "title": format!("Change number {}", n),
        "message": format!("Change number {}\n\nDetails for {}", n, n),
        "created_at": "2024-01-15T12:00:00Z",
    })
}

/// A tracker task; `linked` adds both time-tracking custom fields.
pub fn task_json(id: i64, stage: i64, type_id: i64, linked: bool) -> Value {
    let custom_fields = if linked {
        json!([
            {"name": "time_task_id", "value": format!("tt-{}", id)},
            {"name": "time_project_id", "value": "tp-1"},
        ])
    } else {
        json!([])
    };

    json!({
        "id": id,
        "name": format!("Task {}", id),
        "status": if stage == 10 { "done" } else { "in progress" },
        "priority": "normal",
        "created_at": "2024-01-02T09:00:00Z",
        "updated_at": "2024-01-20T09:00:00Z",
        "workflow_stage_id": stage,
        "type_id": type_id,
        "estimated_hours": 4.0,
        "custom_fields": custom_fields,
    })
}

// ============================================================================
// Mount helpers
// ============================================================================

pub async fn mount_tag(server: &MockServer, name: &str, sha: &str, created_at: &str) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v4/projects/{}/repository/tags/{}",
            GITLAB_PROJECT, name
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(tag_json(name, sha, created_at)))
        .mount(server)
        .await;
}

pub async fn mount_tag_list(server: &MockServer, tags: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v4/projects/{}/repository/tags",
            GITLAB_PROJECT
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(tags)))
        .mount(server)
        .await;
}

pub async fn mount_compare(server: &MockServer, commits: usize) {
    let commits: Vec<Value> = (1..=commits).map(commit_json).collect();
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v4/projects/{}/repository/compare",
            GITLAB_PROJECT
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "commits": commits,
            "diffs": [],
            "compare_timeout": false,
            "compare_same_ref": false,
        })))
        .mount(server)
        .await;
}

pub async fn mount_projects(server: &MockServer, projects: Value) {
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(projects))
        .mount(server)
        .await;
}

pub async fn mount_stage_tasks(server: &MockServer, project_id: i64, stage: i64, tasks: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/projects/{}/tasks", project_id)))
        .and(query_param("workflow_stage_id", stage.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(tasks)))
        .mount(server)
        .await;
}

/// Every time-tracker task reports the same duration string.
pub async fn mount_uniform_duration(server: &MockServer, duration: &str) {
    Mock::given(method("GET"))
        .and(path_regex(format!(
            r"^/workspaces/{}/projects/[^/]+/tasks/[^/]+$",
            WORKSPACE
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "tt",
            "name": "tracked",
            "duration": duration,
        })))
        .mount(server)
        .await;
}
