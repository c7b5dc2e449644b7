//! Coinlens Market Data Crate
//!
//! A rate-limited, multi-provider caching proxy for crypto market data.
//! Route handlers describe what they need with a [`Query`]; the proxy decides
//! whether that can be answered from cache, from which upstream, and what to
//! serve when every upstream refuses.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Three upstreams: CoinGecko (primary), CoinMarketCap (secondary) and
//!   Alternative.me (sentiment)
//! - Per-provider sliding-window rate limiting with exponential backoff
//! - Shape-aware TTL caching with stale-while-unavailable serving
//! - Coalescing of concurrent requests for the same key
//! - Labeled synthetic chart data as the last resort for decorative series
//!
//! # Architecture
//!
//! ```text
//!                          +------------------+
//!                          |      Query       |  (entity + shape + priority)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  MarketDataProxy |  (cache, coalescing)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |   RateLimiter    |  (window, spacing, backoff)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    Provider      |  (CoinGecko, CoinMarketCap, ...)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  ProxyResponse   |  (data + stale/synthetic flags)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Query`] - What the caller wants, and how urgently
//! - [`ProxyResponse`] - Data plus provenance and freshness flags
//! - [`ResolveError`] - `NotFound` or `AllSourcesExhausted`, with a retry hint
//! - [`MarketDataProvider`] - Trait implemented by every upstream adapter
//!
//! # Example
//!
//! ```ignore
//! use coinlens_market_data::{build_default_proxy, HistoryRange, ProxyConfig, Query};
//!
//! let proxy = build_default_proxy(&ProxyConfig::from_env());
//! let response = proxy.resolve(Query::history("btc", HistoryRange::Day)).await?;
//! if response.synthetic {
//!     // label the chart as placeholder data
//! }
//! ```

pub mod cache;
pub mod config;
pub mod errors;
pub mod fallback;
pub mod models;
pub mod provider;
pub mod registry;
pub mod resolver;

// Re-export all public types from models
pub use models::{
    CacheKey, Candle, CoinDetail, CoinId, CoinQuote, GlobalMarket, HistoryRange, MarketPayload,
    PricePoint, PriceSeries, Priority, Provenance, ProviderId, ProviderResult, ProxyResponse,
    Query, QueryShape, SentimentReading, ShapeKind, TrendingCoin,
};

// Re-export resolver types
pub use resolver::{canonical_id, CoinCandidate, ResolutionSource, ResolvedCoin, ResolverChain};

// Re-export provider types
pub use provider::alternative_me::AlternativeMeProvider;
pub use provider::coingecko::CoinGeckoProvider;
pub use provider::coinmarketcap::CoinMarketCapProvider;
pub use provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

// Re-export coordinator types
pub use cache::TtlPolicy;
pub use config::{build_default_proxy, ProxyConfig};
pub use registry::{MarketDataProxy, ProxyOptions, RateLimitState};

// Re-export error types
pub use errors::{FailureKind, MarketDataError, ResolveError};
