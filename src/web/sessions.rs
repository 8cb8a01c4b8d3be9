//! Session handlers.

use axum::extract::{Path, State};
use axum::response::Response;

use crate::data;
use crate::state::AppState;
use crate::web::error::{ApiError, OptionNotFoundExt, db_error};
use crate::web::routes::{cache, with_cache_control};

/// `GET /api/sessions`
pub async fn list_sessions(State(state): State<AppState>) -> Result<Response, ApiError> {
    let sessions = data::sessions::list(&state.db_pool)
        .await
        .map_err(|e| db_error("List sessions", e))?;
    Ok(with_cache_control(sessions, cache::REFERENCE))
}

/// `GET /api/sessions/current`
pub async fn current_session(State(state): State<AppState>) -> Result<Response, ApiError> {
    let today = chrono::Utc::now().date_naive();
    let session = state
        .store
        .current_session(today)
        .await
        .map_err(|e| db_error("Current session", e))?;
    Ok(with_cache_control(session, cache::REFERENCE))
}

/// `GET /api/sessions/{number}`
pub async fn get_session(
    State(state): State<AppState>,
    Path(number): Path<i32>,
) -> Result<Response, ApiError> {
    let session = data::sessions::get(&state.db_pool, number)
        .await
        .map_err(|e| db_error("Get session", e))?
        .or_not_found("Session", number)?;
    Ok(with_cache_control(session, cache::REFERENCE))
}
