//! Caches: the persisted hashed slot for derived views and the in-memory
//! listing count cache used by the web layer.

pub mod counts;
pub mod hashed;

pub use counts::PageCountCache;
pub use hashed::{CacheRefresh, HashedCache, sha256_hex};
