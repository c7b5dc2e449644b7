use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::key::CacheKey;

/// Time range for chart-style queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryRange {
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "365d")]
    Year,
}

impl HistoryRange {
    pub const ALL: [HistoryRange; 5] = [
        HistoryRange::Day,
        HistoryRange::Week,
        HistoryRange::Month,
        HistoryRange::Quarter,
        HistoryRange::Year,
    ];

    /// Number of days covered, as sent to upstream `days=` parameters.
    pub fn days(&self) -> u32 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Day => "1d",
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
            Self::Year => "365d",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.tag().eq_ignore_ascii_case(value.trim()))
    }

    /// Point spacing used when a placeholder series has to be drawn.
    pub fn synthetic_step(&self) -> chrono::Duration {
        match self {
            Self::Day => chrono::Duration::hours(1),
            Self::Week => chrono::Duration::hours(4),
            Self::Month | Self::Quarter | Self::Year => chrono::Duration::days(1),
        }
    }

    /// Number of points in a placeholder series.
    pub fn synthetic_points(&self) -> usize {
        match self {
            Self::Day => 24,
            Self::Week => 42,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }
}

/// Query shape, one per consolidated market data route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum QueryShape {
    /// Single coin detail (price, market cap, supply, description).
    Detail,
    /// Price / market cap / volume series for a range.
    History(HistoryRange),
    /// OHLC candles for a range.
    Ohlc(HistoryRange),
    /// Top coins by market cap.
    MarketList { limit: u16 },
    /// Point quotes for a comma-separated symbol list.
    BatchQuote,
    /// Aggregate market figures.
    GlobalMarket,
    /// Sentiment index single-value feed.
    FearGreed,
    /// Trending coins.
    Trending,
}

/// Fieldless view of [`QueryShape`], used for provider capability tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Detail,
    History,
    Ohlc,
    MarketList,
    BatchQuote,
    GlobalMarket,
    FearGreed,
    Trending,
}

impl QueryShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Detail => ShapeKind::Detail,
            Self::History(_) => ShapeKind::History,
            Self::Ohlc(_) => ShapeKind::Ohlc,
            Self::MarketList { .. } => ShapeKind::MarketList,
            Self::BatchQuote => ShapeKind::BatchQuote,
            Self::GlobalMarket => ShapeKind::GlobalMarket,
            Self::FearGreed => ShapeKind::FearGreed,
            Self::Trending => ShapeKind::Trending,
        }
    }

    /// Stable tag used in cache keys and logs (e.g. "history:7d").
    pub fn tag(&self) -> String {
        match self {
            Self::Detail => "detail".to_string(),
            Self::History(range) => format!("history:{}", range.tag()),
            Self::Ohlc(range) => format!("ohlc:{}", range.tag()),
            Self::MarketList { limit } => format!("markets:{}", limit),
            Self::BatchQuote => "batch-quote".to_string(),
            Self::GlobalMarket => "global".to_string(),
            Self::FearGreed => "fear-greed".to_string(),
            Self::Trending => "trending".to_string(),
        }
    }

    /// Decorative time series that may be replaced by a labeled placeholder.
    ///
    /// Point-valued shapes (detail, quotes, market figures) never qualify.
    pub fn is_chart_series(&self) -> bool {
        matches!(self, Self::History(_) | Self::Ohlc(_))
    }

    /// Feeds that publish one value and have no secondary provider.
    pub fn is_single_value_feed(&self) -> bool {
        matches!(self, Self::FearGreed)
    }

    /// Upstream timeout, scaled to expected payload size.
    pub fn fetch_timeout(&self) -> Duration {
        match self {
            Self::History(HistoryRange::Quarter | HistoryRange::Year)
            | Self::Ohlc(HistoryRange::Quarter | HistoryRange::Year) => Duration::from_secs(30),
            Self::History(_) | Self::Ohlc(_) | Self::MarketList { .. } => Duration::from_secs(20),
            _ => Duration::from_secs(10),
        }
    }
}

/// Caller urgency.
///
/// Interactive callers are never made to wait for request spacing; they are
/// denied with a retry hint instead. Background refreshers wait, up to a bound.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    #[default]
    Interactive,
    Background,
}

/// Query descriptor accepted by the proxy facade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Coin id or symbol; a comma-separated symbol list for batch quotes;
    /// the quote currency for aggregate shapes.
    pub entity_id: String,
    pub query_shape: QueryShape,
    #[serde(default)]
    pub priority: Priority,
}

impl Query {
    pub fn new(entity_id: impl Into<String>, query_shape: QueryShape) -> Self {
        Self {
            entity_id: entity_id.into().trim().to_lowercase(),
            query_shape,
            priority: Priority::Interactive,
        }
    }

    pub fn detail(coin: impl Into<String>) -> Self {
        Self::new(coin, QueryShape::Detail)
    }

    pub fn history(coin: impl Into<String>, range: HistoryRange) -> Self {
        Self::new(coin, QueryShape::History(range))
    }

    pub fn ohlc(coin: impl Into<String>, range: HistoryRange) -> Self {
        Self::new(coin, QueryShape::Ohlc(range))
    }

    pub fn markets(vs_currency: impl Into<String>, limit: u16) -> Self {
        Self::new(vs_currency, QueryShape::MarketList { limit })
    }

    pub fn batch<S: AsRef<str>>(symbols: &[S]) -> Self {
        let joined = normalize_symbols(symbols.iter().map(|s| s.as_ref())).join(",");
        Self::new(joined, QueryShape::BatchQuote)
    }

    pub fn global() -> Self {
        Self::new("usd", QueryShape::GlobalMarket)
    }

    pub fn fear_greed() -> Self {
        Self::new("index", QueryShape::FearGreed)
    }

    pub fn trending() -> Self {
        Self::new("all", QueryShape::Trending)
    }

    /// Mark this query as coming from a background refresher.
    pub fn background(mut self) -> Self {
        self.priority = Priority::Background;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Normalized symbol list for batch queries (lowercase, deduplicated, sorted).
    pub fn symbols(&self) -> Vec<String> {
        normalize_symbols(self.entity_id.split(','))
    }

    /// Same shape and priority, restricted to the given symbols.
    pub fn with_symbols(&self, symbols: &[String]) -> Self {
        Self {
            entity_id: normalize_symbols(symbols.iter().map(String::as_str)).join(","),
            query_shape: self.query_shape,
            priority: self.priority,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_query(self)
    }
}

fn normalize_symbols<'a>(symbols: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut normalized: Vec<String> = symbols
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_range_parse() {
        assert_eq!(HistoryRange::parse("7d"), Some(HistoryRange::Week));
        assert_eq!(HistoryRange::parse(" 365D "), Some(HistoryRange::Year));
        assert_eq!(HistoryRange::parse("2d"), None);
    }

    #[test]
    fn test_shape_tags_are_distinct() {
        let shapes = [
            QueryShape::Detail,
            QueryShape::History(HistoryRange::Day),
            QueryShape::History(HistoryRange::Week),
            QueryShape::Ohlc(HistoryRange::Day),
            QueryShape::MarketList { limit: 50 },
            QueryShape::MarketList { limit: 100 },
            QueryShape::BatchQuote,
            QueryShape::GlobalMarket,
            QueryShape::FearGreed,
            QueryShape::Trending,
        ];
        let mut tags: Vec<String> = shapes.iter().map(|s| s.tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), shapes.len());
    }

    #[test]
    fn test_batch_symbols_are_normalized() {
        let query = Query::batch(&["ETH", "btc", " eth ", ""]);
        assert_eq!(query.entity_id, "btc,eth");
        assert_eq!(query.symbols(), vec!["btc".to_string(), "eth".to_string()]);
    }

    #[test]
    fn test_with_symbols_keeps_shape_and_priority() {
        let query = Query::batch(&["a", "b"]).background();
        let subset = query.with_symbols(&["b".to_string()]);
        assert_eq!(subset.entity_id, "b");
        assert_eq!(subset.query_shape, QueryShape::BatchQuote);
        assert_eq!(subset.priority, Priority::Background);
    }

    #[test]
    fn test_only_chart_shapes_are_series() {
        assert!(QueryShape::History(HistoryRange::Week).is_chart_series());
        assert!(QueryShape::Ohlc(HistoryRange::Day).is_chart_series());
        assert!(!QueryShape::Detail.is_chart_series());
        assert!(!QueryShape::BatchQuote.is_chart_series());
        assert!(!QueryShape::MarketList { limit: 10 }.is_chart_series());
    }

    #[test]
    fn test_query_deserializes_from_caller_json() {
        let json = r#"{
            "entityId": "Bitcoin",
            "queryShape": { "type": "history", "params": "7d" },
            "priority": "background"
        }"#;
        let query: Query = serde_json::from_str(json).unwrap();
        assert_eq!(query.query_shape, QueryShape::History(HistoryRange::Week));
        assert_eq!(query.priority, Priority::Background);
        // Raw deserialization does not normalize; the cache key does.
        assert_eq!(query.cache_key().as_str(), "bitcoin:history:7d");
    }

    #[test]
    fn test_fetch_timeout_scales_with_range() {
        assert!(
            QueryShape::History(HistoryRange::Year).fetch_timeout()
                > QueryShape::Detail.fetch_timeout()
        );
    }
}
