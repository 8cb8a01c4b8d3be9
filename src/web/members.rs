//! Member directory and profile handlers.

use axum::extract::{Path, Query, State};
use axum::response::Response;

use crate::data;
use crate::data::members::MemberListParams;
use crate::state::AppState;
use crate::web::error::{ApiError, OptionNotFoundExt, db_error};
use crate::web::pagination::check_page;
use crate::web::routes::{cache, with_cache_control};

/// `GET /api/members`
pub async fn list_members(
    State(state): State<AppState>,
    Query(params): Query<MemberListParams>,
) -> Result<Response, ApiError> {
    check_page(params.page)?;
    let result = data::members::list(&state.db_pool, &params)
        .await
        .map_err(|e| db_error("List members", e))?;
    Ok(with_cache_control(result, cache::SEARCH))
}

/// `GET /api/members/{bioguide_id}`
pub async fn get_member(
    State(state): State<AppState>,
    Path(bioguide_id): Path<String>,
) -> Result<Response, ApiError> {
    let bioguide_id = bioguide_id.trim().to_ascii_uppercase();
    if bioguide_id.is_empty() {
        return Err(ApiError::invalid("bioguide id must not be empty"));
    }
    let profile = data::members::profile(&state.db_pool, &bioguide_id)
        .await
        .map_err(|e| db_error("Get member", e))?
        .or_not_found("Member", &bioguide_id)?;
    Ok(with_cache_control(profile, cache::DETAIL))
}
