//! Error types and failure classification for the market data proxy.
//!
//! This module provides:
//! - [`MarketDataError`]: The internal error enum produced by providers and the coordinator
//! - [`FailureKind`]: The caller-facing failure taxonomy
//! - [`ResolveError`]: The structured error returned across the proxy facade

mod failure;

pub use failure::FailureKind;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while resolving market data.
///
/// Provider adapters only ever produce the first five variants. The
/// coordinator adds [`AllSourcesExhausted`](Self::AllSourcesExhausted) once the
/// degradation chain has nothing left to offer.
#[derive(Error, Debug, Clone)]
pub enum MarketDataError {
    /// Timeout, connection reset or any other transport level failure.
    #[error("Network failure: {provider} - {message}")]
    NetworkFailure {
        /// The provider that could not be reached
        provider: String,
        /// Transport error description
        message: String,
    },

    /// The provider explicitly refused the request (HTTP 429 or equivalent).
    #[error("Rate limited: {provider}")]
    UpstreamRateLimited {
        /// The provider that rate limited the request
        provider: String,
        /// Retry hint sent by the provider, if any
        retry_after: Option<Duration>,
    },

    /// The provider answered, but the payload did not have the expected shape.
    #[error("Validation failed: {provider} - {message}")]
    ValidationFailure {
        /// The provider that returned the malformed payload
        provider: String,
        /// Description of the shape violation
        message: String,
    },

    /// The entity could not be resolved by the provider.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider does not serve this query shape.
    #[error("Unsupported query shape '{shape}' for provider {provider}")]
    Unsupported {
        /// The provider asked
        provider: String,
        /// The query shape tag
        shape: String,
    },

    /// Every source in the degradation chain failed.
    #[error("All sources exhausted: {message}")]
    AllSourcesExhausted {
        /// Human-readable explanation
        message: String,
        /// Earliest moment a retry could succeed, when known
        retry_after: Option<Duration>,
    },
}

impl MarketDataError {
    /// Returns the caller-facing failure kind for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use coinlens_market_data::errors::{FailureKind, MarketDataError};
    ///
    /// let error = MarketDataError::UpstreamRateLimited {
    ///     provider: "COINGECKO".to_string(),
    ///     retry_after: None,
    /// };
    /// assert_eq!(error.kind(), FailureKind::UpstreamRateLimited);
    /// ```
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NetworkFailure { .. } => FailureKind::NetworkFailure,
            Self::UpstreamRateLimited { .. } => FailureKind::UpstreamRateLimited,
            Self::ValidationFailure { .. } => FailureKind::ValidationFailure,
            Self::NotFound(_) => FailureKind::NotFound,
            // A provider that cannot serve the shape is treated like one that is down:
            // the chain moves on, but nothing is recorded against the provider.
            Self::Unsupported { .. } => FailureKind::NetworkFailure,
            Self::AllSourcesExhausted { .. } => FailureKind::AllSourcesExhausted,
        }
    }

    /// Whether this failure feeds the provider's backoff accounting.
    ///
    /// Network failures, explicit rate limiting and malformed payloads all
    /// count. Unknown entities and unsupported shapes do not.
    pub fn penalizes_provider(&self) -> bool {
        matches!(
            self,
            Self::NetworkFailure { .. }
                | Self::UpstreamRateLimited { .. }
                | Self::ValidationFailure { .. }
        )
    }

    /// Retry hint carried by the error, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::UpstreamRateLimited { retry_after, .. }
            | Self::AllSourcesExhausted { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Build a network failure from a reqwest error.
    pub(crate) fn from_transport(provider: &str, error: &reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            "request timed out".to_string()
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else {
            format!("request failed: {}", error)
        };

        Self::NetworkFailure {
            provider: provider.to_string(),
            message,
        }
    }

    /// Shorthand for a validation failure.
    pub(crate) fn invalid(provider: &str, message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Structured error returned by [`MarketDataProxy::resolve`](crate::MarketDataProxy::resolve).
///
/// Only [`FailureKind::NotFound`] and [`FailureKind::AllSourcesExhausted`]
/// ever reach callers; transient provider failures are absorbed by the
/// degradation chain.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ResolveError {
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
    /// Seconds until a retry is expected to succeed, when derivable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl From<MarketDataError> for ResolveError {
    fn from(error: MarketDataError) -> Self {
        let kind = match error.kind() {
            FailureKind::NotFound => FailureKind::NotFound,
            _ => FailureKind::AllSourcesExhausted,
        };
        let message = match kind {
            FailureKind::NotFound => error.to_string(),
            _ => match &error {
                MarketDataError::AllSourcesExhausted { message, .. } => message.clone(),
                other => format!("No data source available: {}", other),
            },
        };

        Self {
            kind,
            message,
            retry_after_seconds: error.retry_after().map(seconds_ceil),
        }
    }
}

/// Round a retry hint up to whole seconds, never reporting zero.
pub(crate) fn seconds_ceil(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_penalize_provider() {
        let network = MarketDataError::NetworkFailure {
            provider: "COINGECKO".to_string(),
            message: "connection reset".to_string(),
        };
        let limited = MarketDataError::UpstreamRateLimited {
            provider: "COINGECKO".to_string(),
            retry_after: None,
        };
        let invalid = MarketDataError::invalid("COINGECKO", "prices missing");

        assert!(network.penalizes_provider());
        assert!(limited.penalizes_provider());
        assert!(invalid.penalizes_provider());
    }

    #[test]
    fn test_not_found_does_not_penalize() {
        let error = MarketDataError::NotFound("nosuchcoin".to_string());
        assert!(!error.penalizes_provider());
        assert_eq!(error.kind(), FailureKind::NotFound);
    }

    #[test]
    fn test_unsupported_does_not_penalize() {
        let error = MarketDataError::Unsupported {
            provider: "ALTERNATIVE_ME".to_string(),
            shape: "detail".to_string(),
        };
        assert!(!error.penalizes_provider());
    }

    #[test]
    fn test_resolve_error_hides_transient_kinds() {
        let error = MarketDataError::UpstreamRateLimited {
            provider: "COINGECKO".to_string(),
            retry_after: Some(Duration::from_millis(1500)),
        };
        let resolved = ResolveError::from(error);

        assert_eq!(resolved.kind, FailureKind::AllSourcesExhausted);
        assert_eq!(resolved.retry_after_seconds, Some(2));
    }

    #[test]
    fn test_resolve_error_keeps_not_found() {
        let resolved = ResolveError::from(MarketDataError::NotFound("zzz".to_string()));
        assert_eq!(resolved.kind, FailureKind::NotFound);
        assert_eq!(resolved.message, "Not found: zzz");
        assert_eq!(resolved.retry_after_seconds, None);
    }

    #[test]
    fn test_seconds_ceil_never_zero() {
        assert_eq!(seconds_ceil(Duration::ZERO), 1);
        assert_eq!(seconds_ceil(Duration::from_secs(30)), 30);
        assert_eq!(seconds_ceil(Duration::from_millis(30_001)), 31);
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::NetworkFailure {
            provider: "COINMARKETCAP".to_string(),
            message: "request timed out".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Network failure: COINMARKETCAP - request timed out"
        );

        let error = MarketDataError::UpstreamRateLimited {
            provider: "COINGECKO".to_string(),
            retry_after: None,
        };
        assert_eq!(format!("{}", error), "Rate limited: COINGECKO");
    }
}
