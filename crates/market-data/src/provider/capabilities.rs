//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing which query shapes a
//! provider serves and how it must be rate-limited.

use std::time::Duration;

use crate::models::ShapeKind;

/// Describes the capabilities of a market data provider.
///
/// Used by the proxy to build the provider chain for each query shape.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Query shapes this provider can answer.
    pub shapes: &'static [ShapeKind],
}

/// Rate limiting configuration for a provider.
///
/// Free-tier crypto APIs punish bursts hard, so every provider declares a
/// sliding window quota, a minimum spacing between calls and the backoff
/// curve applied after failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Length of the sliding window.
    pub window: Duration,

    /// Maximum requests allowed within one window.
    pub max_requests: u32,

    /// Minimum delay between two consecutive requests.
    pub min_spacing: Duration,

    /// Backoff base; the delay after `n` consecutive failures is `base * 2^n`.
    pub backoff_base: Duration,

    /// Upper bound on the backoff delay.
    pub backoff_cap: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 5,
            min_spacing: Duration::from_secs(30),
            backoff_base: Duration::from_secs(30),
            backoff_cap: Duration::from_secs(4 * 60),
        }
    }
}
