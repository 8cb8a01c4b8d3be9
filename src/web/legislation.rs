//! Upstream bill and law listings for one session.
//!
//! Pages are fetched live from Congress.gov and annotated with page metadata.
//! Upstream totals are corrected with whatever [`PageCountCache`] has learned.
//!
//! [`PageCountCache`]: crate::cache::PageCountCache

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::congress::Listing;
use crate::state::AppState;
use crate::web::error::{ApiError, upstream_error};
use crate::web::pagination::{LISTING_PAGE_SIZE, PageMeta, check_page, resolve_count};
use crate::web::routes::{cache, with_cache_control};

#[derive(Debug, Deserialize)]
pub struct ListingParams {
    #[serde(default = "default_page")]
    pub page: u64,
}

fn default_page() -> u64 {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub session: i32,
    pub listing: Listing,
    pub items: Vec<Value>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

/// `GET /api/sessions/{number}/bills`
pub async fn list_bills(
    State(state): State<AppState>,
    Path(session): Path<i32>,
    Query(params): Query<ListingParams>,
) -> Result<Response, ApiError> {
    listing(&state, Listing::Bill, session, params.page).await
}

/// `GET /api/sessions/{number}/laws`
pub async fn list_laws(
    State(state): State<AppState>,
    Path(session): Path<i32>,
    Query(params): Query<ListingParams>,
) -> Result<Response, ApiError> {
    listing(&state, Listing::Law, session, params.page).await
}

async fn listing(
    state: &AppState,
    listing: Listing,
    session: i32,
    page: u64,
) -> Result<Response, ApiError> {
    if session < 1 {
        return Err(ApiError::invalid("session must be a positive number"));
    }
    check_page(i64::try_from(page).unwrap_or(i64::MAX))?;

    let offset = (page - 1) * u64::from(LISTING_PAGE_SIZE);
    let fetched = state
        .congress_api
        .listing_page(listing, session, offset, LISTING_PAGE_SIZE)
        .await
        .map_err(|e| upstream_error("Listing page", e))?;

    let remembered = state.page_counts.get(session, listing);
    let resolved = resolve_count(
        page,
        LISTING_PAGE_SIZE,
        fetched.count.unwrap_or(0),
        remembered,
        fetched.items.len(),
    );
    if let Some(real) = resolved.discovered {
        debug!(
            session,
            listing = listing.as_str(),
            reported = ?fetched.count,
            real,
            "Corrected upstream listing total"
        );
        state.page_counts.insert(session, listing, real);
    }

    let response = ListingResponse {
        session,
        listing,
        items: fetched.items,
        meta: PageMeta::new(page, resolved),
    };
    Ok(with_cache_control(response, cache::SEARCH))
}
