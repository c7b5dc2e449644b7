//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! upstream adapters must implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{ProviderResult, Query, QueryShape};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for upstream market data adapters.
///
/// Implement this trait to add support for a new data source. The proxy uses
/// the provider's capabilities and priority to decide where it sits in the
/// chain for each query shape (lowest priority value = primary).
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use coinlens_market_data::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             shapes: &[ShapeKind::BatchQuote],
///         }
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     // ... implement fetch
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "COINGECKO". Used for logging,
    /// rate limit accounting and cache provenance.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Describes which query shapes this provider serves.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Rate limiting configuration applied before every call.
    fn rate_limit(&self) -> RateLimit;

    /// Whether this provider can answer the given shape.
    fn supports(&self, shape: &QueryShape) -> bool {
        self.capabilities().shapes.contains(&shape.kind())
    }

    /// Upstream requests `fetch` will send for `query`.
    ///
    /// The proxy charges this many requests against the provider's window on
    /// admission. Adapters that need a lookup before the data call (id
    /// resolution, pagination) must count it here.
    fn request_cost(&self, _query: &Query) -> u32 {
        1
    }

    /// Fetch and normalize data for a query.
    ///
    /// Implementations must validate the upstream payload strictly and return
    /// [`MarketDataError::ValidationFailure`] on any shape mismatch rather than
    /// coercing values. For batch queries the result may cover only a subset
    /// of the requested symbols.
    async fn fetch(&self, query: &Query) -> Result<ProviderResult, MarketDataError>;
}
