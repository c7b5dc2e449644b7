//! CoinGecko market data provider implementation.
//!
//! Primary source for every shape except the sentiment index:
//! - Charts via /coins/{id}/market_chart and /coins/{id}/ohlc
//! - Coin detail via /coins/{id}
//! - Market list and batch quotes via /coins/markets
//! - Aggregates via /global, trending coins via /search/trending
//! - Id resolution via /search
//!
//! The public API allows a handful of calls per minute without a key. A demo
//! key is sent as `x-cg-demo-api-key`; pro keys use a separate host and the
//! `x-cg-pro-api-key` header.
//! API documentation: https://docs.coingecko.com/reference/introduction

mod parse;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{CoinId, MarketPayload, ProviderResult, Query, QueryShape, ShapeKind};
use crate::provider::http::get_json;
use crate::provider::shape::describe_shape;
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
use crate::resolver::{CoinCandidate, ResolverChain};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PRO_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";
pub(crate) const PROVIDER_ID: &str = "COINGECKO";

const SHAPES: &[ShapeKind] = &[
    ShapeKind::Detail,
    ShapeKind::History,
    ShapeKind::Ohlc,
    ShapeKind::MarketList,
    ShapeKind::BatchQuote,
    ShapeKind::GlobalMarket,
    ShapeKind::Trending,
];

/// API key flavour.
#[derive(Clone, Debug)]
enum ApiKey {
    Demo(String),
    Pro(String),
}

/// CoinGecko market data provider.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
    api_key: Option<ApiKey>,
    resolver: ResolverChain,
}

impl CoinGeckoProvider {
    /// Keyless client against the public API.
    pub fn new() -> Self {
        Self {
            client: build_client(),
            base_url: BASE_URL.to_string(),
            api_key: None,
            resolver: ResolverChain::new(),
        }
    }

    /// Client authenticated with a demo key.
    pub fn with_demo_key(api_key: String) -> Self {
        Self {
            api_key: Some(ApiKey::Demo(api_key)),
            ..Self::new()
        }
    }

    /// Client authenticated with a pro key against the pro host.
    pub fn with_pro_key(api_key: String) -> Self {
        Self {
            base_url: PRO_BASE_URL.to_string(),
            api_key: Some(ApiKey::Pro(api_key)),
            ..Self::new()
        }
    }

    /// Point the adapter at another host (tests, self-hosted mirrors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.get(url).header("accept", "application/json");
        match &self.api_key {
            Some(ApiKey::Demo(key)) => request.header("x-cg-demo-api-key", key),
            Some(ApiKey::Pro(key)) => request.header("x-cg-pro-api-key", key),
            None => request,
        }
    }

    async fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
        not_found_hint: &str,
    ) -> Result<Value, MarketDataError> {
        debug!("CoinGecko request: {} with {} params", path, params.len());
        get_json(PROVIDER_ID, self.request(path).query(params), not_found_hint).await
    }

    /// Resolve a caller-supplied id, ticker or name to a CoinGecko coin id.
    async fn coin_id(&self, input: &str) -> Result<CoinId, MarketDataError> {
        if let Some(hit) = self.resolver.memoized(input) {
            return Ok(hit.id);
        }

        let value = self
            .get("/search", &[("query", input.to_string())], input)
            .await?;
        let candidates = parse::search_candidates(&value)?;
        let resolved = self.resolver.resolve(input, &candidates)?;
        debug!(
            "CoinGecko resolved '{}' to '{}' ({:?})",
            input, resolved.id, resolved.source
        );
        Ok(resolved.id)
    }

    async fn fetch_history(&self, id: &str, days: u32) -> Result<MarketPayload, MarketDataError> {
        let path = format!("/coins/{}/market_chart", urlencoding::encode(id));
        let value = self
            .get(
                &path,
                &[("vs_currency", "usd".to_string()), ("days", days.to_string())],
                id,
            )
            .await?;
        parse::market_chart(&value)
            .map(MarketPayload::Series)
            .map_err(|e| log_shape(e, &value))
    }

    async fn fetch_ohlc(&self, id: &str, days: u32) -> Result<MarketPayload, MarketDataError> {
        let path = format!("/coins/{}/ohlc", urlencoding::encode(id));
        let value = self
            .get(
                &path,
                &[("vs_currency", "usd".to_string()), ("days", days.to_string())],
                id,
            )
            .await?;
        parse::ohlc(&value)
            .map(MarketPayload::Candles)
            .map_err(|e| log_shape(e, &value))
    }

    async fn fetch_detail(&self, id: &str) -> Result<MarketPayload, MarketDataError> {
        let path = format!("/coins/{}", urlencoding::encode(id));
        let params = [
            ("localization", "false".to_string()),
            ("tickers", "false".to_string()),
            ("community_data", "false".to_string()),
            ("developer_data", "false".to_string()),
        ];
        let value = self.get(&path, &params, id).await?;
        parse::coin_detail(&value)
            .map(MarketPayload::Detail)
            .map_err(|e| log_shape(e, &value))
    }

    async fn fetch_markets(&self, vs_currency: &str, limit: u16) -> Result<MarketPayload, MarketDataError> {
        let params = [
            ("vs_currency", vs_currency.to_string()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", limit.clamp(1, 250).to_string()),
            ("page", "1".to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", "24h".to_string()),
        ];
        let value = self.get("/coins/markets", &params, vs_currency).await?;
        parse::markets(&value)
            .map(MarketPayload::Markets)
            .map_err(|e| log_shape(e, &value))
    }

    /// Quotes for a symbol list. Symbols CoinGecko does not list are simply
    /// absent from the result.
    async fn fetch_batch(&self, symbols: &[String]) -> Result<MarketPayload, MarketDataError> {
        let params = [
            ("vs_currency", "usd".to_string()),
            ("symbols", symbols.join(",")),
            ("include_tokens", "all".to_string()),
            ("per_page", "250".to_string()),
        ];
        let value = self.get("/coins/markets", &params, &symbols.join(",")).await?;
        let rows = parse::markets(&value).map_err(|e| log_shape(e, &value))?;

        // Several tokens may share a ticker; apply the same tie-break as id resolution.
        let mut quotes = BTreeMap::new();
        for symbol in symbols {
            let candidates: Vec<CoinCandidate> = rows
                .iter()
                .filter(|row| &row.symbol == symbol)
                .map(|row| {
                    CoinCandidate::new(row.id.as_deref().unwrap_or_default(), &row.symbol, &row.name)
                })
                .collect();

            let Some(picked) = self.resolver.pick(symbol, &candidates) else {
                continue;
            };
            if let Some(row) = rows
                .iter()
                .find(|row| row.id.as_deref() == Some(picked.id.as_ref()))
            {
                quotes.insert(symbol.clone(), row.clone());
            }
        }

        debug!(
            "CoinGecko batch: {}/{} symbols found",
            quotes.len(),
            symbols.len()
        );
        Ok(MarketPayload::Quotes(quotes))
    }

    async fn fetch_global(&self) -> Result<MarketPayload, MarketDataError> {
        let value = self.get("/global", &[], "global").await?;
        parse::global(&value)
            .map(MarketPayload::Global)
            .map_err(|e| log_shape(e, &value))
    }

    async fn fetch_trending(&self) -> Result<MarketPayload, MarketDataError> {
        let value = self.get("/search/trending", &[], "trending").await?;
        parse::trending(&value)
            .map(MarketPayload::Trending)
            .map_err(|e| log_shape(e, &value))
    }
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities { shapes: SHAPES }
    }

    fn rate_limit(&self) -> RateLimit {
        match self.api_key {
            // Paid plans allow hundreds of calls per minute.
            Some(ApiKey::Pro(_)) => RateLimit {
                window: Duration::from_secs(60),
                max_requests: 250,
                min_spacing: Duration::from_millis(250),
                backoff_base: Duration::from_secs(30),
                backoff_cap: Duration::from_secs(5 * 60),
            },
            _ => RateLimit {
                window: Duration::from_secs(120),
                max_requests: 4,
                min_spacing: Duration::from_secs(30),
                backoff_base: Duration::from_secs(60),
                backoff_cap: Duration::from_secs(15 * 60),
            },
        }
    }

    /// Coin-scoped shapes need a `/search` call until the id is memoized.
    fn request_cost(&self, query: &Query) -> u32 {
        match query.query_shape {
            QueryShape::History(_) | QueryShape::Ohlc(_) | QueryShape::Detail
                if self.resolver.memoized(&query.entity_id).is_none() =>
            {
                2
            }
            _ => 1,
        }
    }

    async fn fetch(&self, query: &Query) -> Result<ProviderResult, MarketDataError> {
        let payload = match query.query_shape {
            QueryShape::History(range) => {
                let id = self.coin_id(&query.entity_id).await?;
                self.fetch_history(&id, range.days()).await?
            }
            QueryShape::Ohlc(range) => {
                let id = self.coin_id(&query.entity_id).await?;
                self.fetch_ohlc(&id, range.days()).await?
            }
            QueryShape::Detail => {
                let id = self.coin_id(&query.entity_id).await?;
                self.fetch_detail(&id).await?
            }
            QueryShape::MarketList { limit } => {
                self.fetch_markets(&query.entity_id, limit).await?
            }
            QueryShape::BatchQuote => self.fetch_batch(&query.symbols()).await?,
            QueryShape::GlobalMarket => self.fetch_global().await?,
            QueryShape::Trending => self.fetch_trending().await?,
            QueryShape::FearGreed => {
                return Err(MarketDataError::Unsupported {
                    provider: PROVIDER_ID.to_string(),
                    shape: query.query_shape.tag(),
                })
            }
        };

        Ok(ProviderResult::new(payload, Cow::Borrowed(PROVIDER_ID)))
    }
}

fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn log_shape(error: MarketDataError, value: &Value) -> MarketDataError {
    if let MarketDataError::ValidationFailure { message, .. } = &error {
        warn!(
            "{}: payload rejected ({}); shape {}",
            PROVIDER_ID,
            message,
            describe_shape(value)
        );
    }
    error
}
