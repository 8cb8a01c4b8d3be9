//! Health and status handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{trace, warn};

use crate::data;
use crate::state::{AppState, ServiceStatus};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    name: String,
    status: ServiceStatus,
    updated_secs_ago: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    status: ServiceStatus,
    version: String,
    commit: String,
    current_session: Option<i32>,
    services: BTreeMap<String, ServiceInfo>,
}

/// Health check endpoint; fails when the database is unreachable.
pub(super) async fn health(State(state): State<AppState>) -> Response {
    trace!("health check requested");
    match data::health::ping(&state.db_pool).await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
        .into_response(),
        Err(e) => {
            warn!(error = ?e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "timestamp": chrono::Utc::now().to_rfc3339()
                })),
            )
                .into_response()
        }
    }
}

fn overall_status(services: &BTreeMap<String, ServiceInfo>) -> ServiceStatus {
    if services.is_empty() {
        ServiceStatus::Disabled
    } else if services
        .values()
        .any(|s| matches!(s.status, ServiceStatus::Error))
    {
        ServiceStatus::Error
    } else if services
        .values()
        .any(|s| matches!(s.status, ServiceStatus::Starting))
    {
        ServiceStatus::Starting
    } else {
        ServiceStatus::Active
    }
}

/// Status endpoint showing service states, build info, and the current session.
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let mut services = BTreeMap::new();
    for (name, svc_status, updated_secs_ago) in state.service_statuses.all() {
        services.insert(
            name.clone(),
            ServiceInfo {
                name,
                status: svc_status,
                updated_secs_ago,
            },
        );
    }

    let today = chrono::Utc::now().date_naive();
    let current_session = match state.store.current_session(today).await {
        Ok(session) => Some(session.number),
        Err(e) => {
            warn!(error = ?e, "failed to resolve current session for status");
            None
        }
    };

    Json(StatusResponse {
        status: overall_status(&services),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        current_session,
        services,
    })
}
