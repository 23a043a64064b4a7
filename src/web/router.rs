//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use super::handlers::{
    download_file, download_stored, file_info, file_page, health_check, upload_file, AppState,
};
use super::middleware::{create_cors_layer, rate_limit, security_headers, RateLimitState};

/// Allowance for multipart boundaries and part headers on top of the file size.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main router.
pub fn create_router(
    app_state: Arc<AppState>,
    rate_limit_state: Arc<RateLimitState>,
    cors_origins: &[String],
) -> Router {
    let body_limit = usize::try_from(app_state.files.max_file_size())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let api_routes = Router::new().route("/files/:id", get(file_info));

    Router::new()
        .route("/upload", post(upload_file))
        .route("/file/:id", get(file_page))
        .route("/files/:id", get(download_stored))
        .route("/download/:id", get(download_file))
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(middleware::from_fn_with_state(rate_limit_state, rate_limit))
                .layer(CompressionLayer::new()),
        )
        .with_state(app_state)
}
