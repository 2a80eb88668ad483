//! Dashboard Routes
//!
//! Read-only views over the metrics aggregator. Handlers only parse and
//! validate query parameters; all data shaping lives in `MetricsService`.
//!
//! Routes:
//! - GET /dashboard/metrics?olderTag&newerTag&projectId - Compare two tags
//! - GET /dashboard/overview - Dashboard project summary
//! - GET /dashboard/task-metrics?projectId - Task rollup for a project
//! - GET /dashboard/bug-metrics?projectId - Bug rollup for a project
//! - GET /dashboard/project-releases?projectId - Releases joined with tasks
//! - GET /dashboard/releases?projectId - GitLab tags
//! - GET /dashboard/projects - Task-tracker projects
//! - GET /dashboard/projects/search?searchTerm - Project name search
//! - GET /dashboard/users - Task-tracker users

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    models::{
        BugMetrics, DashboardMetrics, ProjectRelease, ProjectSummary, Release, ReleaseMetrics,
        TagComparison, TaskMetrics, TrackerUser,
    },
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(release_metrics))
        .route("/overview", get(dashboard_overview))
        .route("/task-metrics", get(task_metrics))
        .route("/bug-metrics", get(bug_metrics))
        .route("/project-releases", get(project_releases))
        .route("/releases", get(releases))
        .route("/projects", get(list_projects))
        .route("/projects/search", get(search_projects))
        .route("/users", get(list_users))
}

// ============================================================================
// Query Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
    pub older_tag: Option<String>,
    pub newer_tag: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    pub project_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub search_term: Option<String>,
}

// ============================================================================
// Parameter Validation
// ============================================================================

/// Trimmed, non-empty parameter value.
fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty())
}

fn require_text(raw: Option<&str>, name: &str, problems: &mut Vec<String>) -> Option<String> {
    match present(raw) {
        Some(value) => Some(value.to_string()),
        None => {
            problems.push(format!("{} is required", name));
            None
        }
    }
}

fn optional_project_id(raw: Option<&str>, problems: &mut Vec<String>) -> Option<i64> {
    let value = present(raw)?;
    match value.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            problems.push(format!("projectId must be a number, got '{}'", value));
            None
        }
    }
}

fn required_project_id(raw: Option<&str>) -> Result<i64> {
    let mut problems = Vec::new();
    if present(raw).is_none() {
        return Err(Error::Validation(vec!["projectId is required".to_string()]));
    }
    optional_project_id(raw, &mut problems).ok_or(Error::Validation(problems))
}

impl MetricsQuery {
    fn into_comparison(self) -> Result<TagComparison> {
        let mut problems = Vec::new();
        let older_tag = require_text(self.older_tag.as_deref(), "olderTag", &mut problems);
        let newer_tag = require_text(self.newer_tag.as_deref(), "newerTag", &mut problems);
        let project_id = optional_project_id(self.project_id.as_deref(), &mut problems);

        match (older_tag, newer_tag) {
            (Some(older_tag), Some(newer_tag)) if problems.is_empty() => Ok(TagComparison {
                older_tag,
                newer_tag,
                project_id,
            }),
            _ => Err(Error::Validation(problems)),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Compare two tags and roll up tracked feature and bug time.
async fn release_metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<ReleaseMetrics>> {
    let comparison = query.into_comparison()?;
    let metrics = state.metrics.calculate_metrics(&comparison).await?;
    Ok(Json(metrics))
}

async fn dashboard_overview(State(state): State<AppState>) -> Result<Json<DashboardMetrics>> {
    Ok(Json(state.metrics.get_dashboard_metrics().await?))
}

async fn task_metrics(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<TaskMetrics>> {
    let project_id = required_project_id(query.project_id.as_deref())?;
    Ok(Json(state.metrics.get_task_metrics(project_id).await?))
}

async fn bug_metrics(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<BugMetrics>> {
    let project_id = required_project_id(query.project_id.as_deref())?;
    Ok(Json(state.metrics.get_bug_metrics(project_id).await?))
}

async fn project_releases(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<Vec<ProjectRelease>>> {
    let project_id = required_project_id(query.project_id.as_deref())?;
    Ok(Json(state.metrics.get_project_releases(project_id).await?))
}

/// GitLab tags; `projectId` overrides the configured GitLab project.
async fn releases(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<Vec<Release>>> {
    let mut problems = Vec::new();
    let project_id = optional_project_id(query.project_id.as_deref(), &mut problems);
    if !problems.is_empty() {
        return Err(Error::Validation(problems));
    }

    let project_ref = project_id.map(|id| id.to_string());
    Ok(Json(state.metrics.list_releases(project_ref.as_deref()).await?))
}

async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<ProjectSummary>>> {
    Ok(Json(state.metrics.list_projects().await?))
}

async fn search_projects(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ProjectSummary>>> {
    let mut problems = Vec::new();
    let term = require_text(query.search_term.as_deref(), "searchTerm", &mut problems)
        .ok_or(Error::Validation(problems))?;

    Ok(Json(state.metrics.search_projects(&term).await?))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<TrackerUser>>> {
    Ok(Json(state.metrics.list_users().await?))
}
