//! TTL table per query shape.
//!
//! | Shape | TTL |
//! |-------|-----|
//! | history / ohlc 1d | 5 min |
//! | history / ohlc 7d | 30 min |
//! | history / ohlc 30d | 2 h |
//! | history / ohlc 90d | 6 h |
//! | history / ohlc 365d | 12 h |
//! | detail | 5 min |
//! | market list | 2 min |
//! | batch quote | 2 min |
//! | global market | 10 min |
//! | fear & greed | 1 h |
//! | trending | 15 min |
//!
//! Long ranges barely move between polls, so they are cached for hours;
//! intraday ranges and point quotes for minutes.

use std::time::Duration;

use crate::models::{HistoryRange, QueryShape};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// TTL per query shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Chart TTLs indexed by range: 1d, 7d, 30d, 90d, 365d.
    pub chart: [Duration; 5],
    pub detail: Duration,
    pub market_list: Duration,
    pub batch_quote: Duration,
    pub global_market: Duration,
    pub fear_greed: Duration,
    pub trending: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            chart: [
                Duration::from_secs(5 * MINUTE),
                Duration::from_secs(30 * MINUTE),
                Duration::from_secs(2 * HOUR),
                Duration::from_secs(6 * HOUR),
                Duration::from_secs(12 * HOUR),
            ],
            detail: Duration::from_secs(5 * MINUTE),
            market_list: Duration::from_secs(2 * MINUTE),
            batch_quote: Duration::from_secs(2 * MINUTE),
            global_market: Duration::from_secs(10 * MINUTE),
            fear_greed: Duration::from_secs(HOUR),
            trending: Duration::from_secs(15 * MINUTE),
        }
    }
}

impl TtlPolicy {
    pub fn ttl_for(&self, shape: &QueryShape) -> Duration {
        match shape {
            QueryShape::History(range) | QueryShape::Ohlc(range) => self.chart_ttl(*range),
            QueryShape::Detail => self.detail,
            QueryShape::MarketList { .. } => self.market_list,
            QueryShape::BatchQuote => self.batch_quote,
            QueryShape::GlobalMarket => self.global_market,
            QueryShape::FearGreed => self.fear_greed,
            QueryShape::Trending => self.trending,
        }
    }

    fn chart_ttl(&self, range: HistoryRange) -> Duration {
        let index = match range {
            HistoryRange::Day => 0,
            HistoryRange::Week => 1,
            HistoryRange::Month => 2,
            HistoryRange::Quarter => 3,
            HistoryRange::Year => 4,
        };
        self.chart[index]
    }

    /// Same TTL for every shape; handy in tests.
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            chart: [ttl; 5],
            detail: ttl,
            market_list: ttl,
            batch_quote: ttl,
            global_market: ttl,
            fear_greed: ttl,
            trending: ttl,
        }
    }
}
