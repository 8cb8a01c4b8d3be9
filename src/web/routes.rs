//! Web API router construction and shared response utilities.

use axum::{
    Router,
    http::{HeaderValue, Method},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{bills, legislation, members, search, sessions, status};

/// Cache-Control presets for public endpoints.
pub mod cache {
    /// Sessions and other slow-moving reference data.
    pub const REFERENCE: &str = "public, max-age=300, s-maxage=3600, stale-while-revalidate=300";
    /// Listings and search results.
    pub const SEARCH: &str = "public, max-age=60, s-maxage=300, stale-while-revalidate=120";
    pub const DETAIL: &str = "public, max-age=60, s-maxage=300, stale-while-revalidate=120";
}

/// Wraps a JSON response with a `Cache-Control` header.
pub fn with_cache_control<T: serde::Serialize>(value: T, header: &'static str) -> Response {
    let mut response = Json(value).into_response();
    response.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(header),
    );
    response
}

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/current", get(sessions::current_session))
        .route("/sessions/{number}", get(sessions::get_session))
        .route("/sessions/{number}/bills", get(legislation::list_bills))
        .route("/sessions/{number}/laws", get(legislation::list_laws))
        .route("/members", get(members::list_members))
        .route("/members/{bioguide_id}", get(members::get_member))
        .route("/bills", get(bills::list_bills))
        .route("/bills/recent", get(bills::recent_bills))
        .route("/records/latest", get(bills::latest_record))
        .route("/search", get(search::search))
        .with_state(app_state);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any)
        .max_age(Duration::from_secs(3600));

    Router::new().nest("/api", api_router).layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        cors,
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(Duration::from_secs(60)),
    ))
}
