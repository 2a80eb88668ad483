//! Monitoring Routes
//!
//! Transaction log and frontend error reporting backed by SQLite.
//!
//! Routes:
//! - POST /monitoring/transactions - Record a transaction
//! - GET /monitoring/transactions - List transactions (paginated, filterable)
//! - GET /monitoring/transactions/stats - Success/error rates per route
//! - POST /monitoring/frontend-errors - Record a frontend error
//! - GET /monitoring/frontend-errors/stats - Frontend error breakdown

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::{
        self, CreateFrontendError, CreateTransaction, ErrorSeverity, FrontendErrorStats,
        RouteStats, TransactionDirection, TransactionFilter, TransactionPage,
    },
    error::{Error, Result},
    AppState,
};

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route("/transactions/stats", get(transaction_stats))
        .route("/frontend-errors", post(create_frontend_error))
        .route("/frontend-errors/stats", get(frontend_error_stats))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub method: Option<String>,
    pub route: Option<String>,
    pub status_code: Option<u16>,
    pub duration_ms: Option<u64>,
    pub direction: Option<String>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub error: Option<String>,
}

impl CreateTransactionRequest {
    fn validate(self) -> Result<CreateTransaction> {
        let mut problems = Vec::new();

        let method = self.method.map(|m| m.trim().to_uppercase());
        match method.as_deref() {
            None | Some("") => problems.push("method is required".to_string()),
            Some(m) if !HTTP_METHODS.contains(&m) => {
                problems.push(format!("method '{}' is not an HTTP method", m))
            }
            _ => {}
        }

        let route = self.route.map(|r| r.trim().to_string());
        match route.as_deref() {
            None | Some("") => problems.push("route is required".to_string()),
            Some(r) if !r.starts_with('/') => problems.push("route must start with '/'".to_string()),
            _ => {}
        }

        match self.status_code {
            None => problems.push("statusCode is required".to_string()),
            Some(code) if !(100..=599).contains(&code) => {
                problems.push(format!("statusCode {} is out of range", code))
            }
            _ => {}
        }

        let direction = match self.direction.as_deref().map(str::trim) {
            None | Some("") | Some("inbound") => TransactionDirection::Inbound,
            Some("outbound") => TransactionDirection::Outbound,
            Some(other) => {
                problems.push(format!("direction '{}' must be inbound or outbound", other));
                TransactionDirection::Inbound
            }
        };

        match (method, route, self.status_code) {
            (Some(method), Some(route), Some(status_code)) if problems.is_empty() => {
                Ok(CreateTransaction {
                    method,
                    route,
                    status_code,
                    duration_ms: self.duration_ms.unwrap_or(0),
                    direction,
                    request_body: self.request_body,
                    response_body: self.response_body,
                    error: self.error,
                })
            }
            _ => Err(Error::Validation(problems)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub method: Option<String>,
    pub status: Option<String>,
}

impl TransactionListQuery {
    fn into_filter(self) -> Result<TransactionFilter> {
        let mut problems = Vec::new();
        let defaults = TransactionFilter::default();

        let mut number = |raw: Option<String>, name: &str, min: i64| -> Option<i64> {
            let raw = raw.filter(|v| !v.trim().is_empty())?;
            match raw.trim().parse::<i64>() {
                Ok(n) if n >= min => Some(n),
                _ => {
                    problems.push(format!("{} must be an integer >= {}", name, min));
                    None
                }
            }
        };

        let page = number(self.page, "page", 1).unwrap_or(defaults.page);
        let limit = number(self.limit, "limit", 1).unwrap_or(defaults.limit);
        let status_code = number(self.status, "status", 100);

        if !problems.is_empty() {
            return Err(Error::Validation(problems));
        }

        Ok(TransactionFilter {
            method: self.method.filter(|m| !m.trim().is_empty()),
            status_code,
            page,
            limit,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFrontendErrorRequest {
    pub message: Option<String>,
    pub stack: Option<String>,
    pub component: Option<String>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub severity: Option<String>,
}

impl CreateFrontendErrorRequest {
    fn validate(self) -> Result<CreateFrontendError> {
        let mut problems = Vec::new();

        let message = self.message.filter(|m| !m.trim().is_empty());
        if message.is_none() {
            problems.push("message is required".to_string());
        }

        let severity = match self.severity.as_deref().map(str::trim) {
            None | Some("") | Some("error") => ErrorSeverity::Error,
            Some("warning") => ErrorSeverity::Warning,
            Some("info") => ErrorSeverity::Info,
            Some(other) => {
                problems.push(format!("severity '{}' must be error, warning or info", other));
                ErrorSeverity::Error
            }
        };

        match message {
            Some(message) if problems.is_empty() => Ok(CreateFrontendError {
                message,
                stack: self.stack,
                component: self.component,
                url: self.url,
                user_agent: self.user_agent,
                severity,
            }),
            _ => Err(Error::Validation(problems)),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse> {
    let input = request.validate()?;
    let transaction = db::create_transaction(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionPage>> {
    let filter = query.into_filter()?;
    Ok(Json(db::list_transactions(&state.db, &filter).await?))
}

async fn transaction_stats(State(state): State<AppState>) -> Result<Json<Vec<RouteStats>>> {
    Ok(Json(db::transaction_stats(&state.db).await?))
}

async fn create_frontend_error(
    State(state): State<AppState>,
    Json(request): Json<CreateFrontendErrorRequest>,
) -> Result<impl IntoResponse> {
    let input = request.validate()?;
    let record = db::create_frontend_error(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn frontend_error_stats(State(state): State<AppState>) -> Result<Json<FrontendErrorStats>> {
    Ok(Json(db::frontend_error_stats(&state.db).await?))
}
