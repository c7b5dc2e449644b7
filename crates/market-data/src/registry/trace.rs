//! Degradation chain diagnostics.

use std::fmt;
use std::time::Duration;

use crate::models::{CacheKey, ProviderId};

/// Stage of the degradation chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Primary,
    Secondary,
    StaleCache,
    LastKnown,
    Synthetic,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::StaleCache => "stale-cache",
            Self::LastKnown => "last-known",
            Self::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

/// Why a stage was skipped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The rate limiter denied the call.
    RateLimited { retry_after: Duration },
    /// No provider serves this shape at this stage.
    NoProvider,
    /// The shape's fallback plan excludes this stage.
    NotInPlan,
    /// Nothing stored for this key or feed.
    NothingStored,
    /// The primary already supplied every requested symbol.
    NothingMissing,
}

/// Record of a single stage attempt.
#[derive(Clone, Debug)]
pub struct StageAttempt {
    pub stage: Stage,
    pub provider_id: Option<ProviderId>,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    /// Retry hint carried by the failure, if any.
    pub retry_after: Option<Duration>,
    pub success: bool,
}

/// Every stage visited while resolving one key.
#[derive(Clone, Debug)]
pub struct ResolutionTrace {
    pub key: CacheKey,
    pub attempts: Vec<StageAttempt>,
}

impl ResolutionTrace {
    pub fn new(key: CacheKey) -> Self {
        Self {
            key,
            attempts: Vec::new(),
        }
    }

    fn push(&mut self, stage: Stage, provider_id: Option<ProviderId>) -> &mut StageAttempt {
        self.attempts.push(StageAttempt {
            stage,
            provider_id,
            skipped: None,
            error: None,
            retry_after: None,
            success: false,
        });
        let last = self.attempts.len() - 1;
        &mut self.attempts[last]
    }

    pub fn record_skip(&mut self, stage: Stage, provider_id: Option<ProviderId>, reason: SkipReason) {
        let attempt = self.push(stage, provider_id);
        if let SkipReason::RateLimited { retry_after } = reason {
            attempt.retry_after = Some(retry_after);
        }
        attempt.skipped = Some(reason);
    }

    pub fn record_error(
        &mut self,
        stage: Stage,
        provider_id: Option<ProviderId>,
        error: String,
        retry_after: Option<Duration>,
    ) {
        let attempt = self.push(stage, provider_id);
        attempt.error = Some(error);
        attempt.retry_after = retry_after;
    }

    pub fn record_success(&mut self, stage: Stage, provider_id: Option<ProviderId>) {
        self.push(stage, provider_id).success = true;
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        let steps = self
            .attempts
            .iter()
            .map(|a| {
                let who = match &a.provider_id {
                    Some(id) => format!("{}[{}]", a.stage, id),
                    None => a.stage.to_string(),
                };
                if a.success {
                    format!("{}: SUCCESS", who)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({:?})", who, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", who, err)
                } else {
                    format!("{}: UNKNOWN", who)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ");
        format!("{}: {}", self.key, steps)
    }

    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    /// Earliest retry hint across all attempts.
    pub fn earliest_retry_after(&self) -> Option<Duration> {
        self.attempts.iter().filter_map(|a| a.retry_after).min()
    }

    /// Retry hint of the earliest rate limiter denial, if any stage was denied.
    pub fn denied_retry_after(&self) -> Option<Duration> {
        self.attempts
            .iter()
            .filter_map(|a| match a.skipped {
                Some(SkipReason::RateLimited { retry_after }) => Some(retry_after),
                _ => None,
            })
            .min()
    }

    pub fn errors(&self) -> Vec<(Stage, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_deref().map(|e| (a.stage, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn test_trace_summary() {
        let mut trace = ResolutionTrace::new(CacheKey::from_raw("bitcoin:detail"));
        trace.record_skip(
            Stage::Primary,
            Some(Cow::Borrowed("COINGECKO")),
            SkipReason::RateLimited {
                retry_after: Duration::from_secs(12),
            },
        );
        trace.record_error(
            Stage::Secondary,
            Some(Cow::Borrowed("COINMARKETCAP")),
            "Timeout".to_string(),
            None,
        );
        trace.record_success(Stage::StaleCache, None);

        let summary = trace.summary();
        assert!(summary.starts_with("bitcoin:detail: "));
        assert!(summary.contains("primary[COINGECKO]: SKIPPED"));
        assert!(summary.contains("secondary[COINMARKETCAP]: ERROR (Timeout)"));
        assert!(summary.contains("stale-cache: SUCCESS"));
        assert!(trace.has_success());
    }

    #[test]
    fn test_earliest_retry_after() {
        let mut trace = ResolutionTrace::new(CacheKey::from_raw("k"));
        assert_eq!(trace.earliest_retry_after(), None);

        trace.record_error(
            Stage::Primary,
            None,
            "429".to_string(),
            Some(Duration::from_secs(90)),
        );
        trace.record_skip(
            Stage::Secondary,
            None,
            SkipReason::RateLimited {
                retry_after: Duration::from_secs(30),
            },
        );
        assert_eq!(trace.earliest_retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(trace.denied_retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(trace.errors().len(), 1);
    }
}
