//! Request coordination.
//!
//! This module composes the per-request decision:
//! - Rate limiting per provider (sliding window, spacing, backoff)
//! - Request coalescing per cache key
//! - Payload validation before caching
//! - The degradation chain and its diagnostics
//! - Deferred background refreshes

mod inflight;
mod proxy;
mod rate_limiter;
mod refresh;
mod trace;
mod validator;

pub use proxy::{MarketDataProxy, ProxyOptions, DEFAULT_BACKGROUND_MAX_WAIT};
pub use rate_limiter::{backoff_delay, Admission, RateLimitState, RateLimiter};
pub use refresh::RefreshScheduler;
pub use trace::{ResolutionTrace, SkipReason, Stage, StageAttempt};
pub use validator::{PayloadValidator, ValidationSeverity, ValidatorConfig};
