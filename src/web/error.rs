//! JSON error responses for the web API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::congress::CongressApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    NotFound,
    InvalidParameter,
    UpstreamUnavailable,
    UpstreamRateLimited,
    Internal,
}

impl ApiErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::InvalidParameter => StatusCode::BAD_REQUEST,
            ApiErrorCode::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ApiErrorCode::UpstreamRateLimited => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::new(ApiErrorCode::NotFound, format!("{kind} '{id}' not found"))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidParameter, message)
    }

    pub fn internal() -> Self {
        Self::new(ApiErrorCode::Internal, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

/// Logs a storage failure and hides its details from the client.
pub fn db_error(context: &str, e: anyhow::Error) -> ApiError {
    error!(error = ?e, "{context} failed");
    ApiError::internal()
}

/// Maps an upstream failure onto a gateway-style error.
pub fn upstream_error(context: &str, e: CongressApiError) -> ApiError {
    warn!(error = %e, "{context} failed");
    match e.status() {
        Some(429) => ApiError::new(
            ApiErrorCode::UpstreamRateLimited,
            "Congress.gov is rate limiting requests, try again shortly",
        ),
        Some(404) => ApiError::new(ApiErrorCode::NotFound, "Not found upstream"),
        status => ApiError::new(ApiErrorCode::UpstreamUnavailable, "Congress.gov request failed")
            .with_details(serde_json::json!({ "upstreamStatus": status })),
    }
}

pub trait OptionNotFoundExt<T> {
    fn or_not_found(self, kind: &str, id: impl std::fmt::Display) -> Result<T, ApiError>;
}

impl<T> OptionNotFoundExt<T> for Option<T> {
    fn or_not_found(self, kind: &str, id: impl std::fmt::Display) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(kind, id))
    }
}
