use serde::Serialize;

/// Failure taxonomy shared by providers, the degradation chain and callers.
///
/// # Propagation Summary
///
/// | Kind | Triggers degradation? | Feeds backoff? | Reaches caller? |
/// |------|----------------------|----------------|-----------------|
/// | `NetworkFailure` | Yes | Yes | No |
/// | `UpstreamRateLimited` | Yes | Yes | No |
/// | `ValidationFailure` | Yes | Yes | No |
/// | `NotFound` | Secondary only | No | Yes |
/// | `AllSourcesExhausted` | - | - | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Timeout, connection reset, unreachable host.
    NetworkFailure,

    /// Explicit 429 or provider-specific quota error.
    UpstreamRateLimited,

    /// The payload did not match the provider contract.
    ValidationFailure,

    /// The entity is unknown to every adapter that was asked.
    NotFound,

    /// Every step of the degradation chain failed.
    AllSourcesExhausted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkFailure => "NetworkFailure",
            Self::UpstreamRateLimited => "UpstreamRateLimited",
            Self::ValidationFailure => "ValidationFailure",
            Self::NotFound => "NotFound",
            Self::AllSourcesExhausted => "AllSourcesExhausted",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
