//! Coin id resolution.
//!
//! Callers may pass a ticker ("BTC"), a display name ("Bitcoin") or a
//! provider id ("bitcoin"). The primary provider keys everything by id, so
//! inputs are resolved against its search results before fetching.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ResolverChain                  │
//! │  memo hit? ──yes──► id                        │
//! │      │ no                                     │
//! │      ▼                                        │
//! │  1. ExactIdRule                               │
//! │  2. WellKnownRule      (btc → bitcoin, ...)   │
//! │  3. ShortestSymbolMatchRule                   │
//! │  4. ExactNameRule                             │
//! │      │ none matched                           │
//! │      ▼                                        │
//! │  NotFound                                     │
//! └──────────────────────────────────────────────┘
//! ```

mod chain;
mod rules;
mod traits;
mod well_known;

pub use chain::{resolve_candidate, ResolverChain};
pub use rules::{ExactIdRule, ExactNameRule, ShortestSymbolMatchRule, WellKnownRule};
pub use traits::{CoinCandidate, MatchRule, ResolutionSource, ResolvedCoin};
pub use well_known::canonical_id;
