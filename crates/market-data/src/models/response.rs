use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::market::MarketPayload;
use super::types::ProviderId;

/// Which source produced a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    /// The first provider in the chain for this shape.
    Primary,
    /// The fallback provider.
    Secondary,
    /// The last value ever observed in-process for a single-value feed.
    LastKnown,
    /// Placeholder chart data; never real prices.
    Synthetic,
}

/// Normalized result of a single adapter call.
///
/// Transient: produced and consumed while handling one request, then wrapped
/// into a cache entry.
#[derive(Clone, Debug)]
pub struct ProviderResult {
    pub data: MarketPayload,
    pub provider_id: ProviderId,
    pub fetched_at: DateTime<Utc>,
}

impl ProviderResult {
    pub fn new(data: MarketPayload, provider_id: ProviderId) -> Self {
        Self {
            data,
            provider_id,
            fetched_at: Utc::now(),
        }
    }
}

/// Response returned across the proxy facade.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub data: MarketPayload,
    /// True when served from a cache entry older than its TTL
    /// (or from the last-known value of a single-value feed).
    pub stale: bool,
    /// True when `data` is a placeholder series.
    pub synthetic: bool,
    pub provenance: Provenance,
    /// When the payload was fetched upstream (generation time for synthetic data).
    pub fetched_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}
