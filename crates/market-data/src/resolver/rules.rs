//! Deterministic match rules, tried in order by [`ResolverChain`](super::ResolverChain).

use super::traits::{CoinCandidate, MatchRule, ResolutionSource};
use super::well_known::canonical_id;

/// Input already is a canonical id.
pub struct ExactIdRule;

impl MatchRule for ExactIdRule {
    fn pick<'a>(&self, input: &str, candidates: &'a [CoinCandidate]) -> Option<&'a CoinCandidate> {
        candidates.iter().find(|c| c.id.eq_ignore_ascii_case(input))
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::ExactId
    }
}

/// Popular tickers map to the asset people mean, even when other tokens
/// reuse the ticker.
pub struct WellKnownRule;

impl MatchRule for WellKnownRule {
    fn pick<'a>(&self, input: &str, candidates: &'a [CoinCandidate]) -> Option<&'a CoinCandidate> {
        let id = canonical_id(input)?;
        candidates.iter().find(|c| c.id == id)
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::WellKnown
    }
}

/// Among candidates whose symbol equals the input, the shortest id wins.
///
/// Ties on length fall back to the lexicographically smallest id so the
/// result does not depend on upstream ordering.
pub struct ShortestSymbolMatchRule;

impl MatchRule for ShortestSymbolMatchRule {
    fn pick<'a>(&self, input: &str, candidates: &'a [CoinCandidate]) -> Option<&'a CoinCandidate> {
        candidates
            .iter()
            .filter(|c| c.symbol.eq_ignore_ascii_case(input))
            .min_by(|a, b| a.id.len().cmp(&b.id.len()).then_with(|| a.id.cmp(&b.id)))
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::SymbolMatch
    }
}

pub struct ExactNameRule;

impl MatchRule for ExactNameRule {
    fn pick<'a>(&self, input: &str, candidates: &'a [CoinCandidate]) -> Option<&'a CoinCandidate> {
        candidates
            .iter()
            .find(|c| c.name.trim().eq_ignore_ascii_case(input))
    }

    fn source(&self) -> ResolutionSource {
        ResolutionSource::ExactName
    }
}
