//! JSON read API over stored and upstream data.

pub mod bills;
pub mod error;
pub mod legislation;
pub mod members;
pub mod middleware;
pub mod pagination;
pub mod routes;
pub mod search;
pub mod sessions;
pub mod status;

pub use routes::*;
