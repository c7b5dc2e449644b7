use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A `[timestamp, value]` pair from a time series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, value: Decimal) -> Self {
        Self { timestamp, value }
    }
}

/// Price history for one coin over a range.
///
/// `prices` is always present; market caps and volumes are empty when the
/// provider does not return them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSeries {
    pub prices: Vec<PricePoint>,
    #[serde(default)]
    pub market_caps: Vec<PricePoint>,
    #[serde(default)]
    pub total_volumes: Vec<PricePoint>,
}

/// OHLC candle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Point-in-time quote for one coin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinQuote {
    /// Lowercase ticker symbol (e.g. "btc").
    pub symbol: String,
    /// Provider-canonical id when known (e.g. "bitcoin").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_24h_pct: Option<Decimal>,
    /// Provider that produced this quote (per-symbol provenance in merged batches).
    pub source: String,
}

/// Coin detail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinDetail {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_24h_pct: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circulating_supply: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_supply: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub source: String,
}

/// Aggregate market figures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMarket {
    pub total_market_cap_usd: Decimal,
    pub total_volume_usd: Decimal,
    pub btc_dominance: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_dominance: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_cryptocurrencies: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_change_24h_pct: Option<Decimal>,
    pub source: String,
}

/// One reading of a sentiment index (0 = extreme fear, 100 = extreme greed).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentReading {
    pub value: u8,
    pub classification: String,
    pub timestamp: DateTime<Utc>,
}

/// Trending coin entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_rank: Option<u32>,
    pub score: u32,
}

/// Canonical payload stored in cache entries and returned to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum MarketPayload {
    Series(PriceSeries),
    Candles(Vec<Candle>),
    Detail(CoinDetail),
    /// Quotes keyed by lowercase symbol.
    Quotes(BTreeMap<String, CoinQuote>),
    Markets(Vec<CoinQuote>),
    Global(GlobalMarket),
    Sentiment(SentimentReading),
    Trending(Vec<TrendingCoin>),
}

impl MarketPayload {
    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Series(series) => format!("series({} points)", series.prices.len()),
            Self::Candles(candles) => format!("candles({})", candles.len()),
            Self::Detail(detail) => format!("detail({})", detail.id),
            Self::Quotes(quotes) => format!("quotes({})", quotes.len()),
            Self::Markets(markets) => format!("markets({})", markets.len()),
            Self::Global(_) => "global".to_string(),
            Self::Sentiment(reading) => format!("sentiment({})", reading.value),
            Self::Trending(coins) => format!("trending({})", coins.len()),
        }
    }

    pub fn as_quotes(&self) -> Option<&BTreeMap<String, CoinQuote>> {
        match self {
            Self::Quotes(quotes) => Some(quotes),
            _ => None,
        }
    }

    pub fn into_quotes(self) -> Option<BTreeMap<String, CoinQuote>> {
        match self {
            Self::Quotes(quotes) => Some(quotes),
            _ => None,
        }
    }

    /// Serialize to the JSON handed to the route layer.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
