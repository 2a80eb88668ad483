//! API transaction log queries.
//!
//! Stores HTTP transaction metadata (method, route, status, timing) and
//! aggregates success/error rates per route.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{now_timestamp, DbPool};

// ============================================================================
// Transaction Types
// ============================================================================

/// Whether the transaction was served by us or issued to an upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    #[default]
    Inbound,
    Outbound,
}

impl TransactionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Transaction record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTransaction {
    pub id: String,
    pub method: String,
    pub route: String,
    pub status_code: i64,
    pub duration_ms: i64,
    pub direction: String,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}

/// Input for recording a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub method: String,
    pub route: String,
    pub status_code: u16,
    pub duration_ms: u64,
    pub direction: TransactionDirection,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub error: Option<String>,
}

/// Listing filter; `page` is 1-based.
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    pub method: Option<String>,
    pub status_code: Option<i64>,
    pub page: i64,
    pub limit: i64,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            method: None,
            status_code: None,
            page: 1,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub transactions: Vec<ApiTransaction>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Aggregated outcome of every transaction on one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStats {
    pub route: String,
    pub total: i64,
    pub successes: i64,
    pub errors: i64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub avg_duration_ms: f64,
}

#[derive(Debug, FromRow)]
struct RouteStatsRow {
    route: String,
    total: i64,
    successes: i64,
    errors: i64,
    avg_duration_ms: f64,
}

impl From<RouteStatsRow> for RouteStats {
    fn from(row: RouteStatsRow) -> Self {
        let rate = |count: i64| {
            if row.total == 0 {
                0.0
            } else {
                (count as f64 / row.total as f64 * 10_000.0).round() / 100.0
            }
        };

        RouteStats {
            success_rate: rate(row.successes),
            error_rate: rate(row.errors),
            route: row.route,
            total: row.total,
            successes: row.successes,
            errors: row.errors,
            avg_duration_ms: (row.avg_duration_ms * 100.0).round() / 100.0,
        }
    }
}

// ============================================================================
// Transaction Queries
// ============================================================================

/// Record a transaction.
pub async fn create_transaction(pool: &DbPool, input: CreateTransaction) -> Result<ApiTransaction> {
    let duration_ms = i64::try_from(input.duration_ms)
        .map_err(|_| Error::InvalidInput("durationMs is out of range".to_string()))?;

    let transaction = sqlx::query_as::<_, ApiTransaction>(
        r#"
        INSERT INTO api_transactions
            (id, method, route, status_code, duration_ms, direction, request_body, response_body, error, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(input.method.to_uppercase())
    .bind(&input.route)
    .bind(i64::from(input.status_code))
    .bind(duration_ms)
    .bind(input.direction.as_str())
    .bind(&input.request_body)
    .bind(&input.response_body)
    .bind(&input.error)
    .bind(now_timestamp())
    .fetch_one(pool)
    .await?;

    Ok(transaction)
}

/// List transactions, newest first.
pub async fn list_transactions(pool: &DbPool, filter: &TransactionFilter) -> Result<TransactionPage> {
    let method = filter.method.as_ref().map(|m| m.to_uppercase());
    let limit = filter.limit.clamp(1, 500);
    let page = filter.page.max(1);
    let offset = (page - 1).checked_mul(limit).ok_or_else(|| {
        Error::Validation(vec![format!("page {} is beyond the last possible page", page)])
    })?;

    let transactions = sqlx::query_as::<_, ApiTransaction>(
        r#"
        SELECT * FROM api_transactions
        WHERE (?1 IS NULL OR method = ?1)
          AND (?2 IS NULL OR status_code = ?2)
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?3 OFFSET ?4
        "#,
    )
    .bind(&method)
    .bind(filter.status_code)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM api_transactions
        WHERE (?1 IS NULL OR method = ?1)
          AND (?2 IS NULL OR status_code = ?2)
        "#,
    )
    .bind(&method)
    .bind(filter.status_code)
    .fetch_one(pool)
    .await?;

    Ok(TransactionPage {
        transactions,
        total,
        page,
        limit,
    })
}

/// Success/error rates per route, busiest route first.
///
/// Status codes below 400 count as successes.
pub async fn transaction_stats(pool: &DbPool) -> Result<Vec<RouteStats>> {
    let rows = sqlx::query_as::<_, RouteStatsRow>(
        r#"
        SELECT
            route,
            COUNT(*) AS total,
            SUM(CASE WHEN status_code < 400 THEN 1 ELSE 0 END) AS successes,
            SUM(CASE WHEN status_code >= 400 THEN 1 ELSE 0 END) AS errors,
            CAST(AVG(duration_ms) AS REAL) AS avg_duration_ms
        FROM api_transactions
        GROUP BY route
        ORDER BY total DESC, route ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(RouteStats::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_schema};

    async fn setup() -> DbPool {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        pool
    }

    fn tx(method: &str, route: &str, status_code: u16, duration_ms: u64) -> CreateTransaction {
        CreateTransaction {
            method: method.to_string(),
            route: route.to_string(),
            status_code,
            duration_ms,
            direction: TransactionDirection::Inbound,
            request_body: None,
            response_body: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_create_populates_defaults() {
        let pool = setup().await;

        let created = create_transaction(&pool, tx("get", "/dashboard/metrics", 200, 35))
            .await
            .unwrap();

        assert!(!created.id.is_empty());
        assert!(!created.created_at.is_empty());
        assert_eq!(created.method, "GET");
        assert_eq!(created.direction, "inbound");
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let pool = setup().await;
        for i in 0..5 {
            create_transaction(&pool, tx("GET", "/a", 200, i)).await.unwrap();
        }
        create_transaction(&pool, tx("POST", "/a", 500, 10)).await.unwrap();
        create_transaction(&pool, tx("GET", "/b", 404, 10)).await.unwrap();

        let all = list_transactions(&pool, &TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(all.total, 7);
        assert_eq!(all.transactions.len(), 7);

        let posts = list_transactions(
            &pool,
            &TransactionFilter {
                method: Some("post".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(posts.total, 1);
        assert_eq!(posts.transactions[0].status_code, 500);

        let not_found = list_transactions(
            &pool,
            &TransactionFilter {
                status_code: Some(404),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(not_found.total, 1);
        assert_eq!(not_found.transactions[0].route, "/b");

        let second_page = list_transactions(
            &pool,
            &TransactionFilter {
                page: 2,
                limit: 3,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(second_page.total, 7);
        assert_eq!(second_page.transactions.len(), 3);
        assert_eq!(second_page.page, 2);
    }

    #[tokio::test]
    async fn test_huge_page_is_rejected_not_overflowed() {
        let pool = setup().await;
        create_transaction(&pool, tx("GET", "/a", 200, 10)).await.unwrap();

        let result = list_transactions(
            &pool,
            &TransactionFilter {
                page: i64::MAX,
                limit: 50,
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation(_))));

        // Far past the end but representable: just an empty page
        let empty = list_transactions(
            &pool,
            &TransactionFilter {
                page: 1_000_000,
                limit: 500,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(empty.transactions.is_empty());
        assert_eq!(empty.total, 1);
    }

    #[tokio::test]
    async fn test_stats_per_route() {
        let pool = setup().await;
        create_transaction(&pool, tx("GET", "/a", 200, 10)).await.unwrap();
        create_transaction(&pool, tx("GET", "/a", 201, 20)).await.unwrap();
        create_transaction(&pool, tx("GET", "/a", 302, 30)).await.unwrap();
        create_transaction(&pool, tx("GET", "/a", 500, 40)).await.unwrap();
        create_transaction(&pool, tx("GET", "/b", 400, 5)).await.unwrap();

        let stats = transaction_stats(&pool).await.unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(
            stats[0],
            RouteStats {
                route: "/a".into(),
                total: 4,
                successes: 3,
                errors: 1,
                success_rate: 75.0,
                error_rate: 25.0,
                avg_duration_ms: 25.0,
            }
        );
        assert_eq!(stats[1].route, "/b");
        assert_eq!(stats[1].error_rate, 100.0);
    }

    #[tokio::test]
    async fn test_stats_empty_log() {
        let pool = setup().await;
        assert!(transaction_stats(&pool).await.unwrap().is_empty());
    }
}
