//! Resolver chain - tries match rules in order and memoizes the outcome.
//!
//! Resolution order:
//! 1. Exact id
//! 2. Well-known ticker table
//! 3. Shortest id among symbol matches
//! 4. Exact name (case-insensitive)
//!
//! The first rule that picks a candidate wins. Results are memoized for the
//! lifetime of the process; the candidate list is only consulted on a miss.

use std::sync::Arc;

use dashmap::DashMap;
use log::debug;

use crate::errors::MarketDataError;
use crate::models::CoinId;

use super::rules::{ExactIdRule, ExactNameRule, ShortestSymbolMatchRule, WellKnownRule};
use super::traits::{CoinCandidate, MatchRule, ResolutionSource, ResolvedCoin};

pub struct ResolverChain {
    rules: Vec<Box<dyn MatchRule>>,
    memo: DashMap<String, CoinId>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ExactIdRule),
                Box::new(WellKnownRule),
                Box::new(ShortestSymbolMatchRule),
                Box::new(ExactNameRule),
            ],
            memo: DashMap::new(),
        }
    }

    /// Normalized form used for matching and as the memo key.
    pub fn normalize(input: &str) -> String {
        input.trim().to_lowercase()
    }

    /// Memoized id for `input`, if it was resolved before.
    pub fn memoized(&self, input: &str) -> Option<ResolvedCoin> {
        self.memo.get(&Self::normalize(input)).map(|id| ResolvedCoin {
            id: id.value().clone(),
            source: ResolutionSource::Memo,
        })
    }

    /// Run the rules against `candidates` without touching the memo.
    pub fn pick(&self, input: &str, candidates: &[CoinCandidate]) -> Option<ResolvedCoin> {
        let input = Self::normalize(input);
        self.rules.iter().find_map(|rule| {
            rule.pick(&input, candidates).map(|candidate| ResolvedCoin {
                id: Arc::from(candidate.id.as_str()),
                source: rule.source(),
            })
        })
    }

    /// Resolve `input` against `candidates`, recording the result.
    ///
    /// Returns `NotFound` when no rule matches. Failed resolutions are not
    /// memoized, so a coin listed later can still be found.
    pub fn resolve(
        &self,
        input: &str,
        candidates: &[CoinCandidate],
    ) -> Result<ResolvedCoin, MarketDataError> {
        if let Some(hit) = self.memoized(input) {
            return Ok(hit);
        }

        let resolved = self
            .pick(input, candidates)
            .ok_or_else(|| MarketDataError::NotFound(input.trim().to_string()))?;

        debug!(
            "Resolved '{}' -> '{}' via {:?}",
            input.trim(),
            resolved.id,
            resolved.source
        );
        self.memo.insert(Self::normalize(input), resolved.id.clone());
        Ok(resolved)
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the default rule order to `candidates`, without memoization.
pub fn resolve_candidate(input: &str, candidates: &[CoinCandidate]) -> Option<ResolvedCoin> {
    ResolverChain::new().pick(input, candidates)
}
