use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gifavatar_common::AppConfig;
use gifavatar_verifier::{build_fetcher, PgSubmissionStore, Verifier};

mod rest;

pub struct AppState {
    pub verifier: Verifier,
    pub submissions_per_hour: usize,
    pub rate_limiter: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl AppState {
    pub fn new(verifier: Verifier, submissions_per_hour: usize) -> Self {
        Self {
            verifier,
            submissions_per_hour,
            rate_limiter: Mutex::new(HashMap::new()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // REST API
        .route("/api/submissions", post(rest::submit::api_submit))
        .route("/api/submissions/{id}", get(rest::api_submission_detail))
        .route("/api/submissions/{id}/rescan", post(rest::api_submission_rescan))
        .route("/api/users/{user_id}/submissions", get(rest::api_user_submissions))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gifavatar=info".parse()?))
        .init();

    let config = AppConfig::from_env()?;

    let store = PgSubmissionStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let verifier = Verifier::from_config(&config, Arc::new(store), build_fetcher(&config));
    let state = Arc::new(AppState::new(verifier, config.submissions_per_hour));

    let app = router(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path + status + latency only (no query params, no IP)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                }),
        );

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("GifAvatar submissions API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
