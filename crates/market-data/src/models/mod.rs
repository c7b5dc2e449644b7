//! Market data models
//!
//! This module contains the core data types for the proxy:
//! - `types` - Type aliases for common identifiers (ProviderId, CoinId)
//! - `query` - Caller query descriptor (Query, QueryShape, HistoryRange, Priority)
//! - `key` - Deterministic cache keys (CacheKey)
//! - `market` - Canonical market data payloads (PriceSeries, CoinQuote, ...)
//! - `response` - Provider results and caller responses (ProviderResult, ProxyResponse)

mod key;
mod market;
mod query;
mod response;
mod types;

pub use key::CacheKey;
pub use market::{
    Candle, CoinDetail, CoinQuote, GlobalMarket, MarketPayload, PricePoint, PriceSeries,
    SentimentReading, TrendingCoin,
};
pub use query::{HistoryRange, Priority, Query, QueryShape, ShapeKind};
pub use response::{Provenance, ProviderResult, ProxyResponse};
pub use types::{CoinId, ProviderId};
