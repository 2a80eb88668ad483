//! Metrics aggregation over the GitLab, task-tracker and time-tracker services.
//!
//! Joins tag comparisons, tracker tasks and tracked durations into the
//! dashboard reports. Independent upstream calls are joined concurrently;
//! per-task duration lookups run in sequence behind the time tracker's
//! request spacing.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use super::gitlab::GitLabService;
use super::task_tracker::TaskTrackerService;
use super::time_tracker::{classify_duration, TimeTrackerService};
use crate::config::MetricsConfig;
use crate::error::{Error, Result};
use crate::models::{
    BugMetrics, BugSummary, DashboardMetrics, DurationStatus, Project, ProjectRelease,
    ProjectSummary, Release, ReleaseMetrics, ReleaseSummary, TagComparison, TagRef, Task,
    TaskDuration, TaskMetrics, TaskSummary, TrackerUser,
};

impl MetricsConfig {
    pub fn is_bug(&self, task: &Task) -> bool {
        task.type_id == self.bug_type_id
    }

    pub fn is_in_progress(&self, task: &Task) -> bool {
        task.workflow_stage_id == self.in_progress_stage_id
    }

    pub fn is_completed(&self, task: &Task) -> bool {
        task.workflow_stage_id == self.completed_stage_id
    }

    /// Critical means estimated strictly above the threshold.
    pub fn is_critical(&self, task: &Task) -> bool {
        task.estimate_hours
            .is_some_and(|e| e > self.critical_bug_estimate_hours)
    }
}

/// Tracked time split into feature development and bug fixing (QA).
#[derive(Debug, Clone, Default, PartialEq)]
struct WorkTotals {
    features: usize,
    bugs: usize,
    development_hours: f64,
    qa_hours: f64,
}

/// Aggregates upstream data into dashboard reports.
#[derive(Clone)]
pub struct MetricsService {
    gitlab: Arc<GitLabService>,
    tasks: Arc<TaskTrackerService>,
    time: Arc<TimeTrackerService>,
    config: MetricsConfig,
}

impl MetricsService {
    pub fn new(
        gitlab: Arc<GitLabService>,
        tasks: Arc<TaskTrackerService>,
        time: Arc<TimeTrackerService>,
        config: MetricsConfig,
    ) -> Self {
        Self {
            gitlab,
            tasks,
            time,
            config,
        }
    }

    /// Compare two tags and roll up the tracked work of every (or one) project.
    pub async fn calculate_metrics(&self, comparison: &TagComparison) -> Result<ReleaseMetrics> {
        let project_ref = self.gitlab.default_project();

        let (older, newer) = tokio::try_join!(
            self.gitlab.get_tag(project_ref, &comparison.older_tag),
            self.gitlab.get_tag(project_ref, &comparison.newer_tag),
        )?;

        let (commits, releases, projects) = tokio::try_join!(
            self.gitlab
                .compare(project_ref, &older.commit_hash, &newer.commit_hash),
            self.gitlab.list_tags(project_ref),
            self.tasks.list_projects(),
        )?;

        let projects = select_projects(projects, comparison.project_id)?;

        let mut totals = WorkTotals::default();
        for project in &projects {
            let tasks = self.tasks.list_tasks_for_project(project.id).await?;
            self.accumulate_tracked_time(&tasks, &mut totals).await?;
        }

        info!(
            older_tag = %comparison.older_tag,
            newer_tag = %comparison.newer_tag,
            commits = commits.len(),
            features = totals.features,
            bugs = totals.bugs,
            "Calculated release metrics"
        );

        Ok(ReleaseMetrics {
            total_commits: commits.len(),
            total_features: totals.features,
            total_bugs: totals.bugs,
            total_development_time: round_hours(totals.development_hours),
            total_qa_time: round_hours(totals.qa_hours),
            total_releases: releases_between(&releases, &older, &newer),
            commits,
        })
    }

    /// Overview of the configured dashboard project.
    pub async fn get_dashboard_metrics(&self) -> Result<DashboardMetrics> {
        let project_id = self.config.dashboard_project_id;

        let (tasks, releases) = tokio::try_join!(
            self.tasks.list_tasks_for_project(project_id),
            self.gitlab.list_tags(self.gitlab.default_project()),
        )?;

        let task_durations = self.task_durations(&tasks).await?;

        Ok(DashboardMetrics {
            project_id,
            tasks: task_summary(&self.config, &tasks),
            bugs: bug_summary(&self.config, &tasks),
            releases: ReleaseSummary {
                total: releases.len(),
                latest: releases.into_iter().next(),
            },
            task_durations,
        })
    }

    pub async fn get_task_metrics(&self, project_id: i64) -> Result<TaskMetrics> {
        self.require_project(project_id).await?;

        let tasks = self.tasks.list_tasks_for_project(project_id).await?;
        let durations = self.task_durations(&tasks).await?;

        let count = |status: DurationStatus| durations.iter().filter(|d| d.status == status).count();

        Ok(TaskMetrics {
            project_id,
            summary: task_summary(&self.config, &tasks),
            total_estimate_hours: round_hours(tasks.iter().filter_map(|t| t.estimate_hours).sum()),
            total_actual_hours: round_hours(durations.iter().map(|d| d.actual_hours).sum()),
            overdue: count(DurationStatus::Overdue),
            on_time: count(DurationStatus::OnTime),
            not_started: count(DurationStatus::TaskNotStarted),
            estimate_not_set: count(DurationStatus::EstimateNotSet),
            tasks: durations,
        })
    }

    pub async fn get_bug_metrics(&self, project_id: i64) -> Result<BugMetrics> {
        self.require_project(project_id).await?;

        let tasks = self.tasks.list_tasks_for_project(project_id).await?;
        let summary = bug_summary(&self.config, &tasks);

        let bugs: Vec<Task> = tasks
            .into_iter()
            .filter(|t| self.config.is_bug(t))
            .collect();
        let critical_bugs = bugs
            .iter()
            .filter(|t| self.config.is_critical(t))
            .cloned()
            .collect();

        Ok(BugMetrics {
            project_id,
            summary,
            critical_bugs,
            bugs,
        })
    }

    /// Releases joined with their branch and the tracker work completed in each.
    pub async fn get_project_releases(&self, project_id: i64) -> Result<Vec<ProjectRelease>> {
        self.require_project(project_id).await?;

        let project_ref = self.gitlab.default_project();
        let (releases, tasks) = tokio::try_join!(
            self.gitlab.list_tags(project_ref),
            self.tasks.list_tasks_for_project(project_id),
        )?;

        let branches = join_all(
            releases
                .iter()
                .map(|r| self.gitlab.get_branch_for_commit(project_ref, &r.id)),
        )
        .await;

        Ok(attribute_to_releases(&self.config, releases, branches, &tasks))
    }

    pub async fn list_releases(&self, project_ref: Option<&str>) -> Result<Vec<Release>> {
        let project_ref = project_ref.unwrap_or_else(|| self.gitlab.default_project());
        self.gitlab.list_tags(project_ref).await
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let projects = self.tasks.list_projects().await?;
        Ok(projects.into_iter().map(ProjectSummary::from).collect())
    }

    pub async fn search_projects(&self, term: &str) -> Result<Vec<ProjectSummary>> {
        self.tasks.search_projects(term).await
    }

    pub async fn list_users(&self) -> Result<Vec<TrackerUser>> {
        self.tasks.list_users().await
    }

    async fn require_project(&self, project_id: i64) -> Result<Project> {
        self.tasks
            .list_projects()
            .await?
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| Error::NotFound(format!("Project {} not found", project_id)))
    }

    /// Add the tracked time of every linked task to the feature or bug bucket.
    async fn accumulate_tracked_time(&self, tasks: &[Task], totals: &mut WorkTotals) -> Result<()> {
        for task in tasks {
            let Some(refs) = &task.time_tracking else {
                continue;
            };

            let hours = self
                .time
                .get_actual_duration(&refs.task_ref, &refs.project_ref)
                .await?;
            debug!(task_id = %task.id, hours, "Tracked time");

            if self.config.is_bug(task) {
                totals.bugs += 1;
                totals.qa_hours += hours;
            } else {
                totals.features += 1;
                totals.development_hours += hours;
            }
        }

        Ok(())
    }

    /// Classify every task; unlinked tasks count as zero tracked hours.
    async fn task_durations(&self, tasks: &[Task]) -> Result<Vec<TaskDuration>> {
        let mut durations = Vec::with_capacity(tasks.len());

        for task in tasks {
            let actual_hours = match &task.time_tracking {
                Some(refs) => {
                    self.time
                        .get_actual_duration(&refs.task_ref, &refs.project_ref)
                        .await?
                }
                None => 0.0,
            };

            durations.push(TaskDuration {
                task_id: task.id.clone(),
                name: task.name.clone(),
                is_bug: self.config.is_bug(task),
                estimate_hours: task.estimate_hours,
                actual_hours,
                status: classify_duration(task.estimate_hours, actual_hours),
            });
        }

        Ok(durations)
    }
}

fn select_projects(projects: Vec<Project>, project_id: Option<i64>) -> Result<Vec<Project>> {
    let Some(id) = project_id else {
        return Ok(projects);
    };

    let selected: Vec<Project> = projects.into_iter().filter(|p| p.id == id).collect();
    if selected.is_empty() {
        return Err(Error::NotFound(format!("Project {} not found", id)));
    }
    Ok(selected)
}

/// Tags created after the older tag, up to and including the newer one.
fn releases_between(releases: &[Release], older: &TagRef, newer: &TagRef) -> usize {
    releases
        .iter()
        .filter(|r| r.created_at > older.committed_at && r.created_at <= newer.committed_at)
        .count()
}

fn task_summary(config: &MetricsConfig, tasks: &[Task]) -> TaskSummary {
    let bugs = tasks.iter().filter(|t| config.is_bug(t)).count();

    TaskSummary {
        total: tasks.len(),
        in_progress: tasks.iter().filter(|t| config.is_in_progress(t)).count(),
        completed: tasks.iter().filter(|t| config.is_completed(t)).count(),
        features: tasks.len() - bugs,
        bugs,
    }
}

fn bug_summary(config: &MetricsConfig, tasks: &[Task]) -> BugSummary {
    let bugs: Vec<&Task> = tasks.iter().filter(|t| config.is_bug(t)).collect();

    BugSummary {
        total: bugs.len(),
        critical: bugs.iter().filter(|t| config.is_critical(t)).count(),
        open: bugs.iter().filter(|t| config.is_in_progress(t)).count(),
        resolved: bugs.iter().filter(|t| config.is_completed(t)).count(),
    }
}

/// Attribute completed tasks to releases by `updated_at`.
///
/// `releases` must be newest first. A release owns the window
/// `(previous release, this release]`; the oldest release has no lower bound.
fn attribute_to_releases(
    config: &MetricsConfig,
    releases: Vec<Release>,
    branches: Vec<String>,
    tasks: &[Task],
) -> Vec<ProjectRelease> {
    let completed: Vec<&Task> = tasks.iter().filter(|t| config.is_completed(t)).collect();
    let lower_bounds: Vec<_> = releases
        .iter()
        .skip(1)
        .map(|r| Some(r.created_at))
        .chain(std::iter::once(None))
        .collect();

    releases
        .into_iter()
        .zip(branches)
        .zip(lower_bounds)
        .map(|((release, branch), since)| {
            let landed: Vec<&&Task> = completed
                .iter()
                .filter(|t| {
                    t.updated_at <= release.created_at
                        && since.map_or(true, |s| t.updated_at > s)
                })
                .collect();

            ProjectRelease {
                branch,
                completed_tasks: landed.len(),
                resolved_bugs: landed
                    .iter()
                    .filter(|t| config.is_bug(t))
                    .map(|t| t.id.clone())
                    .collect(),
                development_hours: None,
                release,
            }
        })
        .collect()
}

/// Round to two decimals so float sums stay presentable.
fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}
