//! Congress.gov v3 API client.

pub mod api;
pub mod errors;
pub mod fetch;
pub mod json;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod transport;

pub use api::{Activity, BillPath, CongressApi, Listing, ListingPage};
pub use errors::CongressApiError;
pub use fetch::Fetcher;
pub use pagination::{PAGE_SIZE, Walk};
pub use transport::{HttpTransport, RawResponse, Transport};
