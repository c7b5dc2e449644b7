//! Resolution traits for the market data crate.
//!
//! Defines the abstractions for turning a caller-supplied symbol or id into
//! a provider-canonical coin id.

use serde::Deserialize;

use crate::models::CoinId;

/// A coin the provider knows about, as returned by its search endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CoinCandidate {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

impl CoinCandidate {
    pub fn new(id: &str, symbol: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }
}

/// Resolution result containing the resolved id and the rule that matched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCoin {
    pub id: CoinId,
    pub source: ResolutionSource,
}

/// Indicates which rule produced a resolution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolutionSource {
    /// A candidate's id equals the input.
    ExactId,
    /// The input is a well-known ticker and its canonical id is a candidate.
    WellKnown,
    /// Symbol match; shortest id wins.
    SymbolMatch,
    /// A candidate's name equals the input.
    ExactName,
    /// Served from the per-process memo.
    Memo,
}

/// Individual rule in the resolution chain.
///
/// Rules are tried in order until one returns a match.
/// Returning `None` means this rule cannot decide, and the chain should try
/// the next rule.
pub trait MatchRule: Send + Sync {
    /// Pick a candidate for `input` (already lowercased and trimmed).
    fn pick<'a>(&self, input: &str, candidates: &'a [CoinCandidate])
        -> Option<&'a CoinCandidate>;

    /// Source tag reported when this rule matches.
    fn source(&self) -> ResolutionSource;
}
