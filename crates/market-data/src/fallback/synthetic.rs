//! Placeholder chart data.
//!
//! A bounded random walk around a fixed baseline of 100. It is an index, not a
//! price, and is only ever returned tagged `synthetic`. Never cached.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::models::{CacheKey, Candle, HistoryRange, MarketPayload, PricePoint, PriceSeries, QueryShape};

/// Starting value of every synthetic walk.
pub const SYNTHETIC_BASELINE: Decimal = Decimal::ONE_HUNDRED;

/// Largest step, in basis points.
const MAX_STEP_BP: i64 = 200;

/// The walk stays within baseline ±50%.
fn bounds() -> (Decimal, Decimal) {
    (Decimal::new(50, 0), Decimal::new(150, 0))
}

fn rng_for(key: &CacheKey) -> StdRng {
    let digest = md5::compute(key.as_str().as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest.0[..8]);
    StdRng::seed_from_u64(u64::from_le_bytes(seed))
}

/// `count + 1` walk values starting at the baseline.
fn walk(rng: &mut StdRng, count: usize) -> Vec<Decimal> {
    let (low, high) = bounds();
    let mut values = Vec::with_capacity(count + 1);
    let mut current = SYNTHETIC_BASELINE;
    values.push(current);

    for _ in 0..count {
        let step = Decimal::new(rng.gen_range(-MAX_STEP_BP..=MAX_STEP_BP), 4);
        current = (current * (Decimal::ONE + step)).round_dp(4).clamp(low, high);
        values.push(current);
    }
    values
}

fn timestamps(range: HistoryRange, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let points = range.synthetic_points();
    let step = range.synthetic_step();
    (0..points)
        .map(|i| now - step * (points - 1 - i) as i32)
        .collect()
}

/// Placeholder price series for `range`, ending at `now`.
///
/// Deterministic for a given key, so repeated degraded responses do not
/// flicker.
pub fn synthetic_series(key: &CacheKey, range: HistoryRange, now: DateTime<Utc>) -> PriceSeries {
    let mut rng = rng_for(key);
    let stamps = timestamps(range, now);
    let values = walk(&mut rng, stamps.len().saturating_sub(1));

    PriceSeries {
        prices: stamps
            .into_iter()
            .zip(values)
            .map(|(t, v)| PricePoint::new(t, v))
            .collect(),
        market_caps: Vec::new(),
        total_volumes: Vec::new(),
    }
}

/// Placeholder candles for `range`, ending at `now`.
pub fn synthetic_candles(key: &CacheKey, range: HistoryRange, now: DateTime<Utc>) -> Vec<Candle> {
    let mut rng = rng_for(key);
    let stamps = timestamps(range, now);
    let values = walk(&mut rng, stamps.len());

    stamps
        .into_iter()
        .zip(values.windows(2))
        .map(|(timestamp, pair)| {
            let (open, close) = (pair[0], pair[1]);
            let wick = Decimal::new(rng.gen_range(0..=50), 4);
            Candle {
                timestamp,
                open,
                high: (open.max(close) * (Decimal::ONE + wick)).round_dp(4),
                low: (open.min(close) * (Decimal::ONE - wick)).round_dp(4),
                close,
            }
        })
        .collect()
}

/// Placeholder payload for chart shapes; `None` for every other shape.
pub fn synthetic_payload(key: &CacheKey, shape: &QueryShape, now: DateTime<Utc>) -> Option<MarketPayload> {
    match shape {
        QueryShape::History(range) => Some(MarketPayload::Series(synthetic_series(key, *range, now))),
        QueryShape::Ohlc(range) => Some(MarketPayload::Candles(synthetic_candles(key, *range, now))),
        _ => None,
    }
}
