//! Degradation chain building blocks.
//!
//! When the primary provider cannot answer, the coordinator tries, in order:
//!
//! 1. the cached entry, even if stale
//! 2. the secondary provider (only for what the primary did not supply)
//! 3. the last value ever seen for single-value feeds
//! 4. a labeled placeholder series for charts
//!
//! Which of these apply to a shape is described by its [`FallbackPlan`].

mod merge;
mod plan;
mod synthetic;

pub use merge::{merge_quotes, missing_symbols};
pub use plan::FallbackPlan;
pub use synthetic::{synthetic_candles, synthetic_payload, synthetic_series, SYNTHETIC_BASELINE};
