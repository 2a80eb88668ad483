//! Frontend error report queries.

use crate::Result;
use chrono::{Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{now_timestamp, DbPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    #[default]
    Error,
    Warning,
    Info,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// Frontend error record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendError {
    pub id: String,
    pub message: String,
    pub stack: Option<String>,
    pub component: Option<String>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub severity: String,
    pub created_at: String,
}

/// Input for recording a frontend error.
#[derive(Debug, Clone, Default)]
pub struct CreateFrontendError {
    pub message: String,
    pub stack: Option<String>,
    pub component: Option<String>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub severity: ErrorSeverity,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CountByKey {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendErrorStats {
    pub total: i64,
    pub last_24h: i64,
    pub by_severity: Vec<CountByKey>,
    /// Reports without a component are grouped under `"unknown"`.
    pub by_component: Vec<CountByKey>,
}

pub async fn create_frontend_error(
    pool: &DbPool,
    input: CreateFrontendError,
) -> Result<FrontendError> {
    let record = sqlx::query_as::<_, FrontendError>(
        r#"
        INSERT INTO frontend_errors (id, message, stack, component, url, user_agent, severity, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&input.message)
    .bind(&input.stack)
    .bind(&input.component)
    .bind(&input.url)
    .bind(&input.user_agent)
    .bind(input.severity.as_str())
    .bind(now_timestamp())
    .fetch_one(pool)
    .await?;

    Ok(record)
}

pub async fn frontend_error_stats(pool: &DbPool) -> Result<FrontendErrorStats> {
    let since = (Utc::now() - Duration::hours(24)).to_rfc3339_opts(SecondsFormat::Millis, true);

    let (total, last_24h): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END), 0)
        FROM frontend_errors
        "#,
    )
    .bind(&since)
    .fetch_one(pool)
    .await?;

    let by_severity = sqlx::query_as::<_, CountByKey>(
        r#"
        SELECT severity AS key, COUNT(*) AS count
        FROM frontend_errors
        GROUP BY severity
        ORDER BY count DESC, key ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_component = sqlx::query_as::<_, CountByKey>(
        r#"
        SELECT COALESCE(component, 'unknown') AS key, COUNT(*) AS count
        FROM frontend_errors
        GROUP BY COALESCE(component, 'unknown')
        ORDER BY count DESC, key ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(FrontendErrorStats {
        total,
        last_24h,
        by_severity,
        by_component,
    })
}
