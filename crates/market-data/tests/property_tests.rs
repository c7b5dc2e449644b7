//! Property-based integration tests for caching, backoff and batch merging.
//!
//! These tests verify that invariants hold across generated inputs,
//! using the `proptest` crate for random test case generation.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use coinlens_market_data::cache::{is_fresh, CacheEntry};
use coinlens_market_data::fallback::{merge_quotes, missing_symbols, synthetic_series};
use coinlens_market_data::registry::backoff_delay;
use coinlens_market_data::{
    CacheKey, HistoryRange, MarketPayload, Provenance, Query, RateLimit, SentimentReading,
};

// =============================================================================
// Generators
// =============================================================================

fn arb_limit() -> impl Strategy<Value = RateLimit> {
    (1u64..120, 1u64..3_600).prop_map(|(base, cap)| RateLimit {
        window: Duration::from_secs(60),
        max_requests: 5,
        min_spacing: Duration::from_secs(1),
        backoff_base: Duration::from_secs(base),
        backoff_cap: Duration::from_secs(cap),
    })
}

fn arb_range() -> impl Strategy<Value = HistoryRange> {
    prop_oneof![
        Just(HistoryRange::Day),
        Just(HistoryRange::Week),
        Just(HistoryRange::Month),
        Just(HistoryRange::Quarter),
        Just(HistoryRange::Year),
    ]
}

fn arb_side() -> impl Strategy<Value = BTreeMap<String, u32>> {
    proptest::collection::btree_map("[a-e]{1,2}", 0u32..1_000, 0..8)
}

fn entry_at(seconds: i64) -> CacheEntry {
    let fetched_at = Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap();
    CacheEntry::new(
        MarketPayload::Sentiment(SentimentReading {
            value: 50,
            classification: "Neutral".to_string(),
            timestamp: fetched_at,
        }),
        fetched_at,
        Cow::Borrowed("TEST"),
        Provenance::Primary,
    )
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Once an entry is stale it never becomes fresh again as time advances.
    #[test]
    fn prop_staleness_is_monotonic(
        ttl_secs in 0u64..10_000,
        first in 0i64..20_000,
        later in 0i64..20_000,
    ) {
        let entry = entry_at(0);
        let ttl = Duration::from_secs(ttl_secs);
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let t1 = base + chrono::Duration::seconds(first);
        let t2 = t1 + chrono::Duration::seconds(later);

        if !is_fresh(&entry, ttl, t1) {
            prop_assert!(!is_fresh(&entry, ttl, t2));
        }
    }

    /// Backoff never decreases with more failures and never exceeds the cap.
    #[test]
    fn prop_backoff_monotonic_and_capped(limit in arb_limit(), failures in 0u32..64) {
        let current = backoff_delay(&limit, failures);
        let next = backoff_delay(&limit, failures + 1);

        prop_assert!(current <= next);
        prop_assert!(next <= limit.backoff_cap);
    }

    /// Primary entries always survive a merge; the result covers both sides.
    #[test]
    fn prop_merge_keeps_primary_values(primary in arb_side(), secondary in arb_side()) {
        let merged = merge_quotes(primary.clone(), secondary.clone());

        for (symbol, value) in &primary {
            prop_assert_eq!(merged.get(symbol), Some(value));
        }
        for symbol in secondary.keys() {
            prop_assert!(merged.contains_key(symbol));
        }
        prop_assert!(merged.keys().all(|k| primary.contains_key(k) || secondary.contains_key(k)));
    }

    /// The symbols handed to the secondary never overlap the primary result.
    #[test]
    fn prop_missing_symbols_disjoint_from_primary(
        requested in proptest::collection::vec("[a-e]{1,2}", 0..10),
        primary in arb_side(),
    ) {
        let missing = missing_symbols(&requested, &primary);

        for symbol in &missing {
            prop_assert!(!primary.contains_key(symbol));
            prop_assert!(requested.contains(symbol));
        }
    }

    /// Batch cache keys ignore symbol order, case and duplicates.
    #[test]
    fn prop_batch_key_is_order_insensitive(
        symbols in proptest::collection::vec("[a-z]{2,5}", 1..8),
    ) {
        let mut shuffled: Vec<String> = symbols.iter().rev().map(|s| s.to_uppercase()).collect();
        shuffled.extend(symbols.iter().cloned());

        prop_assert_eq!(Query::batch(&symbols).cache_key(), Query::batch(&shuffled).cache_key());
    }

    /// Placeholder series are deterministic per key and stay inside their band.
    #[test]
    fn prop_synthetic_series_bounded(coin in "[a-z]{3,8}", range in arb_range()) {
        let key = CacheKey::from_raw(format!("{}:history:{}", coin, range.tag()));
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let series = synthetic_series(&key, range, now);
        let again = synthetic_series(&key, range, now);

        prop_assert_eq!(&series, &again);
        prop_assert_eq!(series.prices.len(), range.synthetic_points());
        for point in &series.prices {
            prop_assert!(point.value >= Decimal::from(50));
            prop_assert!(point.value <= Decimal::from(150));
        }
        for pair in series.prices.windows(2) {
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }
}
