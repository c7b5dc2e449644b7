//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all adapters implement
//! - Provider capabilities and rate limiting configuration
//! - Shared HTTP and strict JSON shape helpers
//! - Concrete adapters (CoinGecko, CoinMarketCap, Alternative.me)
//!
//! # Architecture
//!
//! Adapters are stateless apart from their HTTP client and an id memo. They
//! never touch the cache or the rate limiter; the proxy admits a request
//! before calling `fetch` and records the outcome afterwards.

mod capabilities;
mod http;
mod shape;
mod traits;

pub mod alternative_me;
pub mod coingecko;
pub mod coinmarketcap;

// Re-exports
pub use capabilities::{ProviderCapabilities, RateLimit};
pub use shape::describe_shape;
pub use traits::MarketDataProvider;
