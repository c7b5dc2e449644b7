//! Sliding window rate limiter for market data providers.
//!
//! Each provider gets its own state with:
//! - a sliding window of length `W` allowing at most `N` requests
//! - a minimum spacing `D` between consecutive requests
//! - exponential backoff after failures: `min(base * 2^failures, cap)`
//!
//! Failures decay by one on every window rollover and on every success, so a
//! provider heals gradually instead of oscillating between blocked and open.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, warn};
use tokio::time::Instant;

use crate::models::Priority;
use crate::provider::RateLimit;

/// Outcome of an admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Per-provider limiter state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitState {
    pub last_request_at: Option<Instant>,
    pub window_start: Instant,
    pub requests_in_window: u32,
    pub consecutive_failures: u32,
    pub blocked_until: Option<Instant>,
}

impl RateLimitState {
    fn new(now: Instant) -> Self {
        Self {
            last_request_at: None,
            window_start: now,
            requests_in_window: 0,
            consecutive_failures: 0,
            blocked_until: None,
        }
    }
}

#[derive(Debug)]
struct ProviderSlot {
    limit: RateLimit,
    state: RateLimitState,
}

impl ProviderSlot {
    fn new(limit: RateLimit, now: Instant) -> Self {
        Self {
            limit,
            state: RateLimitState::new(now),
        }
    }

    /// Start a new window when the current one has elapsed.
    fn roll_window(&mut self, now: Instant) {
        if now.saturating_duration_since(self.state.window_start) >= self.limit.window {
            self.state.window_start = now;
            self.state.requests_in_window = 0;
            self.state.consecutive_failures = self.state.consecutive_failures.saturating_sub(1);
        }
    }

    /// Admit a call that sends `cost` upstream requests.
    fn admit(&mut self, now: Instant, cost: u32) -> Admission {
        // A cost above the quota could never be admitted.
        let cost = cost.clamp(1, self.limit.max_requests.max(1));

        if let Some(until) = self.state.blocked_until {
            if until > now {
                return Admission::Denied {
                    retry_after: until - now,
                };
            }
            self.state.blocked_until = None;
        }

        self.roll_window(now);

        if self.state.requests_in_window + cost > self.limit.max_requests {
            let window_end = self.state.window_start + self.limit.window;
            return Admission::Denied {
                retry_after: window_end.saturating_duration_since(now),
            };
        }

        if let Some(last) = self.state.last_request_at {
            let since = now.saturating_duration_since(last);
            if since < self.limit.min_spacing {
                return Admission::Denied {
                    retry_after: self.limit.min_spacing - since,
                };
            }
        }

        self.state.last_request_at = Some(now);
        self.state.requests_in_window += cost;
        Admission::Allowed
    }
}

/// Backoff after `failures` consecutive failures: `min(base * 2^failures, cap)`.
///
/// Non-decreasing in `failures` and never above `cap`.
pub fn backoff_delay(limit: &RateLimit, failures: u32) -> Duration {
    let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
    limit
        .backoff_base
        .checked_mul(factor)
        .unwrap_or(limit.backoff_cap)
        .min(limit.backoff_cap)
}

/// Rate limiter for multiple providers.
///
/// State is kept per provider behind its own mutex, so admission checks for
/// different providers never contend.
pub struct RateLimiter {
    slots: DashMap<String, Arc<Mutex<ProviderSlot>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Configure limits for a provider, resetting its state.
    pub fn register(&self, provider: &str, limit: RateLimit) {
        self.register_at(provider, limit, Instant::now());
    }

    pub fn register_at(&self, provider: &str, limit: RateLimit, now: Instant) {
        debug!(
            "Rate limiter: '{}' allows {} requests per {:?}, spacing {:?}",
            provider, limit.max_requests, limit.window, limit.min_spacing
        );
        self.slots.insert(
            provider.to_string(),
            Arc::new(Mutex::new(ProviderSlot::new(limit, now))),
        );
    }

    fn slot(&self, provider: &str) -> Arc<Mutex<ProviderSlot>> {
        self.slots
            .entry(provider.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ProviderSlot::new(
                    RateLimit::default(),
                    Instant::now(),
                )))
            })
            .value()
            .clone()
    }

    /// Lock a provider slot, recovering from poison if necessary.
    ///
    /// A poisoned slot at worst carries slightly wrong counters, which is
    /// better than panicking.
    fn lock<'a>(provider: &str, slot: &'a Mutex<ProviderSlot>) -> MutexGuard<'a, ProviderSlot> {
        slot.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter state for '{}' was poisoned, recovering", provider);
            poisoned.into_inner()
        })
    }

    /// Check whether a request to `provider` may go out now, and count it if so.
    pub fn admit(&self, provider: &str) -> Admission {
        self.admit_at(provider, Instant::now())
    }

    pub fn admit_at(&self, provider: &str, now: Instant) -> Admission {
        self.admit_requests_at(provider, now, 1)
    }

    /// Like [`admit_at`](Self::admit_at) for a call that sends `cost` requests.
    pub fn admit_requests_at(&self, provider: &str, now: Instant, cost: u32) -> Admission {
        let slot = self.slot(provider);
        let admission = Self::lock(provider, &slot).admit(now, cost);
        if let Admission::Denied { retry_after } = admission {
            debug!("Rate limiter: '{}' denied, retry after {:?}", provider, retry_after);
        }
        admission
    }

    /// Admit according to caller urgency.
    ///
    /// Interactive callers get a single check. Background callers sleep through
    /// denials as long as the total wait stays within `max_wait`.
    pub async fn acquire(&self, provider: &str, priority: Priority, max_wait: Duration) -> Admission {
        self.acquire_requests(provider, priority, max_wait, 1).await
    }

    /// [`acquire`](Self::acquire) for a call that sends `cost` upstream requests.
    pub async fn acquire_requests(
        &self,
        provider: &str,
        priority: Priority,
        max_wait: Duration,
        cost: u32,
    ) -> Admission {
        let deadline = Instant::now() + max_wait;
        loop {
            match self.admit_requests_at(provider, Instant::now(), cost) {
                Admission::Denied { retry_after } if priority == Priority::Background => {
                    if Instant::now() + retry_after > deadline {
                        return Admission::Denied { retry_after };
                    }
                    debug!(
                        "Rate limiter: waiting {:?} for provider '{}'",
                        retry_after, provider
                    );
                    tokio::time::sleep(retry_after).await;
                }
                admission => return admission,
            }
        }
    }

    pub fn record_success(&self, provider: &str) {
        let slot = self.slot(provider);
        let mut guard = Self::lock(provider, &slot);
        guard.state.consecutive_failures = guard.state.consecutive_failures.saturating_sub(1);
    }

    /// Count a failure and block the provider for the backoff delay.
    ///
    /// An upstream `Retry-After` hint longer than the computed delay wins.
    pub fn record_failure(&self, provider: &str, hint: Option<Duration>) -> Duration {
        self.record_failure_at(provider, Instant::now(), hint)
    }

    pub fn record_failure_at(&self, provider: &str, now: Instant, hint: Option<Duration>) -> Duration {
        let slot = self.slot(provider);
        let mut guard = Self::lock(provider, &slot);

        guard.state.consecutive_failures = guard.state.consecutive_failures.saturating_add(1);
        let computed = backoff_delay(&guard.limit, guard.state.consecutive_failures);
        let delay = hint.map_or(computed, |h| h.max(computed));
        guard.state.blocked_until = Some(now + delay);

        warn!(
            "Rate limiter: '{}' failed {} time(s) in a row, blocked for {:?}",
            provider, guard.state.consecutive_failures, delay
        );
        delay
    }

    /// Copy of the current state, if the provider has been seen.
    pub fn snapshot(&self, provider: &str) -> Option<RateLimitState> {
        let slot = self.slots.get(provider)?.value().clone();
        let state = Self::lock(provider, &slot).state.clone();
        Some(state)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
