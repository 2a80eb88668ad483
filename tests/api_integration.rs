//! API Integration Tests for Release Radar
//!
//! Drives the full router with axum-test. Uses in-memory SQLite for the
//! transaction log and wiremock servers for the upstream providers.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::*;
use release_radar::api;
use release_radar::db;
use release_radar::AppState;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

// ============================================================================
// Test Setup Helpers
// ============================================================================

async fn setup_server(upstreams: &Upstreams) -> TestServer {
    let pool = db::init_pool(":memory:")
        .await
        .expect("Failed to create test database");
    db::initialize_schema(&pool)
        .await
        .expect("Failed to initialize schema");

    let state = AppState::with_pool(pool, &upstreams.config()).expect("Failed to build state");
    let app = api::routes().with_state(state);

    TestServer::new(app).expect("Failed to create test server")
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let upstreams = Upstreams::start().await;
    let server = setup_server(&upstreams).await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());

    server.get("/health/live").await.assert_status_ok();

    let response = server.get("/health/ready").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ready"], true);
    assert_eq!(body["checks"][0]["name"], "database");
}

// ============================================================================
// Dashboard
// ============================================================================

#[tokio::test]
async fn test_metrics_requires_both_tags() {
    let upstreams = Upstreams::start().await;
    let server = setup_server(&upstreams).await;

    let response = server
        .get("/dashboard/metrics")
        .add_query_param("olderTag", "v1.0.0")
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["details"], json!(["newerTag is required"]));

    // Nothing went upstream
    let received = upstreams.gitlab.received_requests().await.unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_metrics_success_is_camel_case() {
    let upstreams = Upstreams::start().await;
    mount_tag(&upstreams.gitlab, "v1.0.0", "1111111111", "2024-01-01T00:00:00Z").await;
    mount_tag(&upstreams.gitlab, "v1.1.0", "2222222222", "2024-02-01T00:00:00Z").await;
    mount_compare(&upstreams.gitlab, 3).await;
    mount_tag_list(
        &upstreams.gitlab,
        vec![tag_json("v1.1.0", "2222222222", "2024-02-01T00:00:00Z")],
    )
    .await;
    mount_projects(&upstreams.tracker, json!([{"id": 1, "name": "Web"}])).await;
    mount_stage_tasks(&upstreams.tracker, 1, 9, vec![task_json(1, 9, 1, true)]).await;
    mount_stage_tasks(&upstreams.tracker, 1, 10, vec![task_json(2, 10, 2, true)]).await;
    mount_uniform_duration(&upstreams.time, "PT2H45M").await;

    let server = setup_server(&upstreams).await;
    let response = server
        .get("/dashboard/metrics")
        .add_query_param("olderTag", "v1.0.0")
        .add_query_param("newerTag", "v1.1.0")
        .add_query_param("projectId", "1")
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["totalCommits"], 3);
    assert_eq!(body["totalFeatures"], 1);
    assert_eq!(body["totalBugs"], 1);
    assert_eq!(body["totalDevelopmentTime"], 2.45);
    assert_eq!(body["totalQaTime"], 2.45);
    assert_eq!(body["totalReleases"], 1);
    assert_eq!(body["commits"].as_array().map(Vec::len), Some(3));
    assert!(body["commits"][0]["createdAt"].is_string());
}

#[tokio::test]
async fn test_tags_on_the_same_commit_are_rejected() {
    let upstreams = Upstreams::start().await;
    mount_tag(&upstreams.gitlab, "v1.0.0", "1111111111", "2024-01-01T00:00:00Z").await;
    mount_tag(&upstreams.gitlab, "v1.0.1", "1111111111", "2024-01-01T00:00:00Z").await;
    let server = setup_server(&upstreams).await;

    let response = server
        .get("/dashboard/metrics")
        .add_query_param("olderTag", "v1.0.0")
        .add_query_param("newerTag", "v1.0.1")
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_non_numeric_project_id_is_rejected() {
    let upstreams = Upstreams::start().await;
    let server = setup_server(&upstreams).await;

    for route in ["/dashboard/task-metrics", "/dashboard/bug-metrics", "/dashboard/project-releases"] {
        let response = server.get(route).add_query_param("projectId", "web").await;
        response.assert_status_bad_request();

        let response = server.get(route).await;
        response.assert_status_bad_request();
    }
}

#[tokio::test]
async fn test_unknown_project_is_server_error() {
    let upstreams = Upstreams::start().await;
    mount_projects(&upstreams.tracker, json!([{"id": 1, "name": "Web"}])).await;
    let server = setup_server(&upstreams).await;

    let response = server
        .get("/dashboard/task-metrics")
        .add_query_param("projectId", "99")
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["details"].as_str().unwrap().contains("99"));
}

#[tokio::test]
async fn test_project_search() {
    let upstreams = Upstreams::start().await;
    mount_projects(
        &upstreams.tracker,
        json!([
            {"id": 1, "name": "Web Shop"},
            {"id": 2, "name": "Mobile App"},
        ]),
    )
    .await;
    let server = setup_server(&upstreams).await;

    let response = server
        .get("/dashboard/projects/search")
        .add_query_param("searchTerm", "shop")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body, json!([{"id": 1, "name": "Web Shop"}]));

    let response = server
        .get("/dashboard/projects/search")
        .add_query_param("searchTerm", "  ")
        .await;
    response.assert_status_bad_request();

    let response = server.get("/dashboard/projects").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_releases_listing() {
    let upstreams = Upstreams::start().await;
    mount_tag_list(
        &upstreams.gitlab,
        vec![
            tag_json("v1.0.0", "1111111111", "2024-01-01T00:00:00Z"),
            tag_json("v2.0.0", "2222222222", "2024-06-01T00:00:00Z"),
        ],
    )
    .await;
    let server = setup_server(&upstreams).await;

    let response = server.get("/dashboard/releases").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body[0]["tagName"], "v2.0.0");
    assert_eq!(body[1]["tagName"], "v1.0.0");
}

#[tokio::test]
async fn test_upstream_failure_is_server_error() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "tracker down"})))
        .mount(&upstreams.tracker)
        .await;
    let server = setup_server(&upstreams).await;

    let response = server.get("/dashboard/users").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    assert!(body["error"].is_string());
    assert!(body["details"].as_str().unwrap().contains("tracker down"));
}

// ============================================================================
// Monitoring
// ============================================================================

#[tokio::test]
async fn test_transaction_log_round_trip() {
    let upstreams = Upstreams::start().await;
    let server = setup_server(&upstreams).await;

    for (route, status) in [
        ("/dashboard/metrics", 200),
        ("/dashboard/metrics", 502),
        ("/dashboard/users", 200),
    ] {
        let response = server
            .post("/monitoring/transactions")
            .json(&json!({
                "method": "get",
                "route": route,
                "statusCode": status,
                "durationMs": 120,
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["method"], "GET");
        assert_eq!(body["direction"], "inbound");
    }

    let response = server
        .get("/monitoring/transactions")
        .add_query_param("status", "200")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["page"], 1);

    let response = server.get("/monitoring/transactions/stats").await;
    response.assert_status_ok();
    let stats: Value = response.json();
    let metrics = stats
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["route"] == "/dashboard/metrics")
        .cloned()
        .unwrap();
    assert_eq!(metrics["total"], 2);
    assert_eq!(metrics["successRate"], 50.0);
    assert_eq!(metrics["errorRate"], 50.0);
}

#[tokio::test]
async fn test_transaction_page_past_offset_range_is_rejected() {
    let upstreams = Upstreams::start().await;
    let server = setup_server(&upstreams).await;

    let response = server
        .get("/monitoring/transactions")
        .add_query_param("page", i64::MAX.to_string())
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_invalid_transaction_lists_every_problem() {
    let upstreams = Upstreams::start().await;
    let server = setup_server(&upstreams).await;

    let response = server
        .post("/monitoring/transactions")
        .json(&json!({"route": "no-slash", "statusCode": 42}))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["details"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_frontend_error_reporting() {
    let upstreams = Upstreams::start().await;
    let server = setup_server(&upstreams).await;

    for (component, severity) in [(Some("Chart"), "error"), (None, "warning"), (Some("Chart"), "error")] {
        let response = server
            .post("/monitoring/frontend-errors")
            .json(&json!({
                "message": "Cannot read properties of undefined",
                "component": component,
                "severity": severity,
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let response = server
        .post("/monitoring/frontend-errors")
        .json(&json!({"severity": "fatal"}))
        .await;
    response.assert_status_bad_request();

    let response = server.get("/monitoring/frontend-errors/stats").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["last24h"], 3);

    let components = body["byComponent"].as_array().unwrap();
    assert!(components.contains(&json!({"key": "Chart", "count": 2})));
    assert!(components.contains(&json!({"key": "unknown", "count": 1})));
}
