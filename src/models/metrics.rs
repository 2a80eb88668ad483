//! Metrics domain types.
//!
//! Everything here is fetched from an upstream provider (or derived from
//! upstream data) per request and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pair of tags bounding a release comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagComparison {
    pub older_tag: String,
    pub newer_tag: String,
    pub project_id: Option<i64>,
}

/// A resolved tag: the commit it points at and when that commit was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRef {
    pub name: String,
    pub commit_hash: String,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Short hash.
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Hash of the tagged commit.
    pub id: String,
    pub name: String,
    pub tag_name: String,
    pub created_at: DateTime<Utc>,
}

/// Links a tracker task to its time-tracker counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeTrackingRefs {
    pub task_ref: String,
    pub project_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub status: String,
    pub priority: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub workflow_stage_id: i64,
    pub type_id: i64,
    pub estimate_hours: Option<f64>,
    pub time_tracking: Option<TimeTrackingRefs>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: i64,
    pub name: String,
}

impl From<Project> for ProjectSummary {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerUser {
    pub id: i64,
    pub name: String,
}

/// Outcome of comparing tracked time against the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationStatus {
    #[serde(rename = "Estimate Not Set")]
    EstimateNotSet,
    #[serde(rename = "Task Not Started")]
    TaskNotStarted,
    #[serde(rename = "Overdue")]
    Overdue,
    #[serde(rename = "On Time")]
    OnTime,
}

impl DurationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EstimateNotSet => "Estimate Not Set",
            Self::TaskNotStarted => "Task Not Started",
            Self::Overdue => "Overdue",
            Self::OnTime => "On Time",
        }
    }
}

impl std::fmt::Display for DurationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing two tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseMetrics {
    pub total_commits: usize,
    pub total_features: usize,
    pub total_bugs: usize,
    pub total_development_time: f64,
    pub total_qa_time: f64,
    pub total_releases: usize,
    pub commits: Vec<Commit>,
}

/// Tracked time of a single task, classified against its estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDuration {
    pub task_id: String,
    pub name: String,
    pub is_bug: bool,
    pub estimate_hours: Option<f64>,
    pub actual_hours: f64,
    pub status: DurationStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub total: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub features: usize,
    pub bugs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugSummary {
    pub total: usize,
    pub critical: usize,
    pub open: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSummary {
    pub total: usize,
    pub latest: Option<Release>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub project_id: i64,
    pub tasks: TaskSummary,
    pub bugs: BugSummary,
    pub releases: ReleaseSummary,
    pub task_durations: Vec<TaskDuration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetrics {
    pub project_id: i64,
    pub summary: TaskSummary,
    pub total_estimate_hours: f64,
    pub total_actual_hours: f64,
    pub overdue: usize,
    pub on_time: usize,
    pub not_started: usize,
    pub estimate_not_set: usize,
    pub tasks: Vec<TaskDuration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugMetrics {
    pub project_id: i64,
    pub summary: BugSummary,
    pub critical_bugs: Vec<Task>,
    pub bugs: Vec<Task>,
}

/// A release joined with its branch and the tracker work that landed in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRelease {
    #[serde(flatten)]
    pub release: Release,
    pub branch: String,
    pub completed_tasks: usize,
    /// Ids of bugs completed between the previous release and this one.
    pub resolved_bugs: Vec<String>,
    /// Not derivable from upstream data; always `null`.
    pub development_hours: Option<f64>,
}
