//! Keyword search across members, sessions, and bills.

use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::data;
use crate::state::AppState;
use crate::web::error::{ApiError, db_error};
use crate::web::routes::{cache, with_cache_control};

const MAX_QUERY_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// `GET /api/search?q=`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    if params.q.chars().count() > MAX_QUERY_LEN {
        return Err(ApiError::invalid(format!(
            "query must be at most {MAX_QUERY_LEN} characters"
        )));
    }
    let results = data::search::search_all(&state.db_pool, &params.q)
        .await
        .map_err(|e| db_error("Search", e))?;
    Ok(with_cache_control(results, cache::SEARCH))
}
