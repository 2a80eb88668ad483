//! GitLab service for release and commit data.
//!
//! Provides API access to GitLab for:
//! - Tag resolution and tag listing (releases)
//! - Commit comparison between two refs
//! - Branch lookup for a commit

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GitLabConfig;
use crate::error::{Error, Result};
use crate::models::{Commit, Release, TagRef};

const PROVIDER: &str = "GitLab";

/// Largest page GitLab serves for list endpoints.
const PAGE_SIZE: &str = "100";

/// Branch name reported when a commit's branch cannot be determined.
pub const UNKNOWN_BRANCH: &str = "unknown";

/// Service for GitLab API operations.
#[derive(Clone)]
pub struct GitLabService {
    client: Client,
    base_url: String,
    private_token: String,
    default_project: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GitLabTag {
    name: String,
    message: Option<String>,
    commit: GitLabTagCommit,
}

#[derive(Debug, Clone, Deserialize)]
struct GitLabTagCommit {
    id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitLabCommit {
    short_id: String,
    title: String,
    #[serde(default)]
    message: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitLabCompare {
    #[serde(default)]
    commits: Vec<GitLabCommit>,
    #[serde(default)]
    compare_timeout: bool,
    #[serde(default)]
    compare_same_ref: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GitLabRef {
    #[serde(rename = "type")]
    kind: String,
    name: String,
}

impl From<GitLabCommit> for Commit {
    fn from(commit: GitLabCommit) -> Self {
        // The message repeats the title on its first line
        let description = commit
            .message
            .strip_prefix(commit.title.as_str())
            .unwrap_or(commit.message.as_str())
            .trim()
            .to_string();

        Commit {
            id: commit.short_id,
            created_at: commit.created_at,
            title: commit.title,
            description: (!description.is_empty()).then_some(description),
        }
    }
}

impl From<GitLabTag> for Release {
    fn from(tag: GitLabTag) -> Self {
        let name = tag
            .message
            .as_deref()
            .and_then(|m| m.lines().next())
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(tag.name.as_str())
            .to_string();

        Release {
            id: tag.commit.id,
            name,
            tag_name: tag.name,
            created_at: tag.commit.created_at,
        }
    }
}

impl GitLabService {
    /// Create a new GitLab service from configuration.
    pub fn new(config: &GitLabConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("release-radar/0.1")
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let root = config.url.trim_end_matches('/');
        let base_url = if root.ends_with("/api/v4") {
            root.to_string()
        } else {
            format!("{}/api/v4", root)
        };

        Ok(Self {
            client,
            base_url,
            private_token: config.private_token.clone(),
            default_project: config.project_id.clone(),
        })
    }

    /// Project used when a caller does not name one.
    pub fn default_project(&self) -> &str {
        &self.default_project
    }

    /// URL-encode a project reference (group/name -> group%2Fname).
    fn encode_project(project_ref: &str) -> String {
        urlencoding::encode(project_ref).into_owned()
    }

    /// Send a GET and fail on any non-success status.
    async fn send(&self, path: &str, query: &[(&str, &str)]) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GitLab request");

        let response = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.private_token)
            .query(query)
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

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.send(path, query)
            .await?
            .json()
            .await
            .map_err(|e| Error::upstream(PROVIDER, format!("Failed to parse response: {}", e)))
    }

    /// Collect every page of a list endpoint by following `x-next-page`.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_param = page.to_string();
            let mut params = query.to_vec();
            params.push(("page", page_param.as_str()));
            params.push(("per_page", PAGE_SIZE));

            let response = self.send(path, &params).await?;
            let next = next_page(&response);
            let batch: Vec<T> = response.json().await.map_err(|e| {
                Error::upstream(PROVIDER, format!("Failed to parse response: {}", e))
            })?;
            items.extend(batch);

            match next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }

        Ok(items)
    }

    /// Resolve a tag to the commit it points at.
    pub async fn get_tag(&self, project_ref: &str, tag_name: &str) -> Result<TagRef> {
        let path = format!(
            "/projects/{}/repository/tags/{}",
            Self::encode_project(project_ref),
            urlencoding::encode(tag_name)
        );

        let tag: GitLabTag = self.get_json(&path, &[]).await?;

        Ok(TagRef {
            committed_at: tag.commit.created_at,
            commit_hash: tag.commit.id,
            name: tag.name,
        })
    }

    /// List commits reachable from `to_hash` but not from `from_hash`.
    pub async fn compare(
        &self,
        project_ref: &str,
        from_hash: &str,
        to_hash: &str,
    ) -> Result<Vec<Commit>> {
        if from_hash == to_hash {
            return Err(Error::InvalidInput(format!(
                "Cannot compare identical references ({})",
                from_hash
            )));
        }

        let path = format!(
            "/projects/{}/repository/compare",
            Self::encode_project(project_ref)
        );
        let compare: GitLabCompare = self
            .get_json(&path, &[("from", from_hash), ("to", to_hash)])
            .await?;

        if compare.compare_same_ref {
            return Err(Error::upstream(
                PROVIDER,
                format!("{} and {} refer to the same commit", from_hash, to_hash),
            ));
        }
        if compare.compare_timeout {
            return Err(Error::upstream(
                PROVIDER,
                format!("Comparison of {}...{} timed out", from_hash, to_hash),
            ));
        }

        Ok(compare.commits.into_iter().map(Commit::from).collect())
    }

    /// List all of the project's tags as releases, newest first.
    pub async fn list_tags(&self, project_ref: &str) -> Result<Vec<Release>> {
        let path = format!(
            "/projects/{}/repository/tags",
            Self::encode_project(project_ref)
        );
        let tags: Vec<GitLabTag> = self
            .get_all_pages(&path, &[("order_by", "updated"), ("sort", "desc")])
            .await?;

        let mut releases: Vec<Release> = tags.into_iter().map(Release::from).collect();
        releases.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(releases)
    }

    /// Find a branch containing the commit, or [`UNKNOWN_BRANCH`].
    pub async fn get_branch_for_commit(&self, project_ref: &str, commit_hash: &str) -> String {
        let path = format!(
            "/projects/{}/repository/commits/{}/refs",
            Self::encode_project(project_ref),
            commit_hash
        );

        match self
            .get_json::<Vec<GitLabRef>>(&path, &[("type", "branch")])
            .await
        {
            Ok(refs) => refs
                .into_iter()
                .find(|r| r.kind == "branch")
                .map(|r| r.name)
                .unwrap_or_else(|| UNKNOWN_BRANCH.to_string()),
            Err(e) => {
                warn!(commit = commit_hash, error = %e, "Branch lookup failed");
                UNKNOWN_BRANCH.to_string()
            }
        }
    }
}

/// Page number from GitLab's `x-next-page` header; empty on the last page.
fn next_page(response: &Response) -> Option<u32> {
    response
        .headers()
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Pull the human-readable message out of an upstream error body.
pub(crate) fn upstream_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<serde_json::Value>,
        error: Option<serde_json::Value>,
    }

    let extracted = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

    match extracted {
        Some(message) => message,
        None if body.trim().is_empty() => "no response body".to_string(),
        None => body.trim().to_string(),
    }
}
