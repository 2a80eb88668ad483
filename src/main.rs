//! Release Radar - delivery metrics dashboard
//!
//! Serves release, task and time-tracking metrics aggregated from GitLab,
//! the task tracker and the time tracker.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anyhow::Context;
use release_radar::{api, config, AppState};

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "release_radar=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::init();
    tracing::info!(
        "Starting Release Radar on {}:{}",
        config.server.host,
        config.server.port
    );

    for key in config.unset_settings() {
        tracing::warn!(key, "Configuration value is not set; dependent endpoints will fail");
    }

    // A failed initial database connection is fatal
    let state = AppState::new(config)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    tracing::info!("Application state initialized");

    api::status::init_startup_time();

    // Build router
    let app = Router::new()
        .merge(api::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .map_response(|res: axum::http::Response<_>| res.map(axum::body::Body::new))
                // Transaction log bodies are stored verbatim
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
