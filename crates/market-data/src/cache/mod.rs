//! In-process cache for market data payloads.
//!
//! - [`CacheStore`]: keyed, replace-whole-entry store with explicit freshness
//! - [`TtlPolicy`]: the per-query-shape TTL table
//! - [`LastKnownStore`]: unbounded-TTL fallback for single-value feeds
//!
//! Entries are never evicted; staleness is purely logical. A size bound
//! would be added as an eviction policy inside [`CacheStore::put`].

mod store;
mod ttl;

pub use store::{is_fresh, CacheEntry, CacheLookup, CacheStore, LastKnownStore};
pub use ttl::TtlPolicy;
