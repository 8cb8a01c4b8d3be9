//! Locally stored bills and the daily record.

use axum::extract::{Query, State};
use axum::response::Response;
use tracing::warn;

use crate::cache::HashedCache;
use crate::data;
use crate::data::bills::BillListParams;
use crate::data::models::Bill;
use crate::ingest::bills::{RECENT_BILLS_KEY, RECENT_BILLS_LIMIT};
use crate::state::AppState;
use crate::web::error::{ApiError, OptionNotFoundExt, db_error};
use crate::web::pagination::check_page;
use crate::web::routes::{cache, with_cache_control};

/// `GET /api/bills`
pub async fn list_bills(
    State(state): State<AppState>,
    Query(params): Query<BillListParams>,
) -> Result<Response, ApiError> {
    check_page(params.page)?;
    let result = data::bills::list(&state.db_pool, &params)
        .await
        .map_err(|e| db_error("List bills", e))?;
    Ok(with_cache_control(result, cache::SEARCH))
}

/// `GET /api/bills/recent`
///
/// Served from the cache slot written after each bills run; read straight
/// from the store when the slot is empty or expired.
pub async fn recent_bills(State(state): State<AppState>) -> Result<Response, ApiError> {
    let cached = match HashedCache::new(state.store.as_ref())
        .get::<Vec<Bill>>(RECENT_BILLS_KEY)
        .await
    {
        Ok(cached) => cached,
        Err(e) => {
            warn!(error = ?e, "failed to read recent bills cache");
            None
        }
    };

    let bills = match cached {
        Some(bills) => bills,
        None => state
            .store
            .recent_bills(RECENT_BILLS_LIMIT)
            .await
            .map_err(|e| db_error("Recent bills", e))?,
    };
    Ok(with_cache_control(bills, cache::SEARCH))
}

/// `GET /api/records/latest`
pub async fn latest_record(State(state): State<AppState>) -> Result<Response, ApiError> {
    let record = data::records::latest(&state.db_pool)
        .await
        .map_err(|e| db_error("Latest daily record", e))?
        .or_not_found("Daily record", "latest")?;
    Ok(with_cache_control(record, cache::REFERENCE))
}
