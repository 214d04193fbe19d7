//! Offline cache manager: versioned cache generations, an explicit
//! install/activate lifecycle, and per-request cache-first/network-first
//! routing.
//!
//! Exactly one generation is current at any time; the activate sweep is the
//! sole eviction mechanism, so every deploy starts from a clean slate and
//! mixed-version asset skew cannot occur.

mod cache;
mod lifecycle;
mod routes;
mod types;

pub use cache::{CacheStore, MemoryCacheStore, SqliteCacheStore};
pub use lifecycle::{ServiceWorker, WorkerState};
pub use routes::{RouteClass, RoutePolicy};
pub use types::{FetchOutcome, Request, RequestMode, ServedFrom, WireResponse};
