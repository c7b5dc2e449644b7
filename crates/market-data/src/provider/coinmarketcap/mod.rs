//! CoinMarketCap market data provider implementation.
//!
//! Secondary source. Fills gaps the primary leaves:
//! - Point quotes via /v1/cryptocurrency/quotes/latest
//! - Market list via /v1/cryptocurrency/listings/latest
//! - Aggregates via /v1/global-metrics/quotes/latest
//!
//! Every response carries a `status` block; a non-zero `error_code` is an
//! error even on HTTP 200. Codes 1008-1011 are quota violations.
//! API documentation: https://coinmarketcap.com/api/documentation/v1/

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{
    CoinDetail, CoinQuote, GlobalMarket, MarketPayload, ProviderResult, Query, QueryShape,
    ShapeKind,
};
use crate::provider::http::get_json;
use crate::provider::shape::{
    array, decimal_field, describe_shape, field, object, opt_decimal, opt_u64, string_field,
};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
use crate::resolver::canonical_id;

const BASE_URL: &str = "https://pro-api.coinmarketcap.com";
pub(crate) const PROVIDER_ID: &str = "COINMARKETCAP";

const SHAPES: &[ShapeKind] = &[
    ShapeKind::Detail,
    ShapeKind::MarketList,
    ShapeKind::BatchQuote,
    ShapeKind::GlobalMarket,
];

/// Status codes CoinMarketCap uses for exhausted quotas.
const QUOTA_ERRORS: std::ops::RangeInclusive<i64> = 1008..=1011;

/// CoinMarketCap market data provider. Requires an API key.
pub struct CoinMarketCapProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CoinMarketCapProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .header("accept", "application/json")
    }

    /// GET and unwrap the `data` member after checking the status block.
    async fn get_data(
        &self,
        path: &str,
        params: &[(&str, String)],
        not_found_hint: &str,
    ) -> Result<Value, MarketDataError> {
        debug!("CoinMarketCap request: {} with {} params", path, params.len());
        let value = get_json(PROVIDER_ID, self.request(path).query(params), not_found_hint).await?;
        check_status(&value)?;

        let root = object(PROVIDER_ID, &value, "response")?;
        match root.get("data") {
            Some(data) if !data.is_null() => Ok(data.clone()),
            _ => {
                warn!(
                    "{}: response without 'data', shape {}",
                    PROVIDER_ID,
                    describe_shape(&value)
                );
                Err(MarketDataError::invalid(PROVIDER_ID, "'data' missing"))
            }
        }
    }

    async fn fetch_batch(&self, symbols: &[String]) -> Result<MarketPayload, MarketDataError> {
        let upper: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        let params = [
            ("symbol", upper.join(",")),
            ("convert", "USD".to_string()),
            ("skip_invalid", "true".to_string()),
        ];
        let data = self
            .get_data("/v1/cryptocurrency/quotes/latest", &params, &upper.join(","))
            .await?;

        let mut quotes = BTreeMap::new();
        for coin in coins(&data)? {
            let quote = coin_quote(coin, "USD")?;
            if symbols.contains(&quote.symbol) {
                quotes.insert(quote.symbol.clone(), quote);
            }
        }

        debug!(
            "CoinMarketCap batch: {}/{} symbols found",
            quotes.len(),
            symbols.len()
        );
        Ok(MarketPayload::Quotes(quotes))
    }

    /// Coin detail from a quote. Well-known tickers are looked up by symbol,
    /// anything else by slug (which matches CoinGecko ids for most coins).
    async fn fetch_detail(&self, entity: &str) -> Result<MarketPayload, MarketDataError> {
        let lookup = if canonical_id(entity).is_some() {
            ("symbol", entity.to_uppercase())
        } else {
            ("slug", entity.to_string())
        };
        let params = [lookup, ("convert", "USD".to_string())];
        let data = self
            .get_data("/v1/cryptocurrency/quotes/latest", &params, entity)
            .await?;

        let coin = coins(&data)?
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::NotFound(entity.to_string()))?;
        let quote = coin_quote(coin, "USD")?;

        Ok(MarketPayload::Detail(CoinDetail {
            id: string_field(PROVIDER_ID, coin, "slug")?,
            symbol: quote.symbol,
            name: quote.name,
            price: quote.price,
            market_cap: quote.market_cap,
            market_cap_rank: quote.market_cap_rank,
            volume_24h: quote.volume_24h,
            change_24h_pct: quote.change_24h_pct,
            circulating_supply: opt_decimal(PROVIDER_ID, coin, "circulating_supply")?,
            max_supply: opt_decimal(PROVIDER_ID, coin, "max_supply")?,
            description: None,
            homepage: None,
            source: PROVIDER_ID.to_string(),
        }))
    }

    async fn fetch_listings(&self, vs_currency: &str, limit: u16) -> Result<MarketPayload, MarketDataError> {
        let convert = vs_currency.to_uppercase();
        let params = [
            ("start", "1".to_string()),
            ("limit", limit.clamp(1, 5000).to_string()),
            ("convert", convert.clone()),
        ];
        let data = self
            .get_data("/v1/cryptocurrency/listings/latest", &params, vs_currency)
            .await?;

        let rows = array(PROVIDER_ID, &data, "data")?
            .iter()
            .enumerate()
            .map(|(i, row)| coin_quote(object(PROVIDER_ID, row, &format!("data[{}]", i))?, &convert))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MarketPayload::Markets(rows))
    }

    async fn fetch_global(&self) -> Result<MarketPayload, MarketDataError> {
        let data = self
            .get_data(
                "/v1/global-metrics/quotes/latest",
                &[("convert", "USD".to_string())],
                "global",
            )
            .await?;
        let map = object(PROVIDER_ID, &data, "data")?;
        let usd = usd_quote(map, "USD")?;

        Ok(MarketPayload::Global(GlobalMarket {
            total_market_cap_usd: decimal_field(PROVIDER_ID, usd, "total_market_cap")?,
            total_volume_usd: decimal_field(PROVIDER_ID, usd, "total_volume_24h")?,
            btc_dominance: decimal_field(PROVIDER_ID, map, "btc_dominance")?,
            eth_dominance: opt_decimal(PROVIDER_ID, map, "eth_dominance")?,
            active_cryptocurrencies: opt_u64(PROVIDER_ID, map, "active_cryptocurrencies")?,
            market_cap_change_24h_pct: opt_decimal(
                PROVIDER_ID,
                usd,
                "total_market_cap_yesterday_percentage_change",
            )?,
            source: PROVIDER_ID.to_string(),
        }))
    }
}

#[async_trait]
impl MarketDataProvider for CoinMarketCapProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities { shapes: SHAPES }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            window: Duration::from_secs(300),
            max_requests: 5,
            min_spacing: Duration::from_secs(60),
            backoff_base: Duration::from_secs(120),
            backoff_cap: Duration::from_secs(30 * 60),
        }
    }

    async fn fetch(&self, query: &Query) -> Result<ProviderResult, MarketDataError> {
        let payload = match query.query_shape {
            QueryShape::BatchQuote => self.fetch_batch(&query.symbols()).await?,
            QueryShape::Detail => self.fetch_detail(&query.entity_id).await?,
            QueryShape::MarketList { limit } => {
                self.fetch_listings(&query.entity_id, limit).await?
            }
            QueryShape::GlobalMarket => self.fetch_global().await?,
            other => {
                return Err(MarketDataError::Unsupported {
                    provider: PROVIDER_ID.to_string(),
                    shape: other.tag(),
                })
            }
        };

        Ok(ProviderResult::new(payload, Cow::Borrowed(PROVIDER_ID)))
    }
}

/// Map a non-zero `status.error_code` to an error.
fn check_status(value: &Value) -> Result<(), MarketDataError> {
    let Some(status) = value.get("status").and_then(Value::as_object) else {
        return Ok(());
    };
    let code = match status.get("error_code") {
        None => 0,
        Some(raw) => raw.as_i64().ok_or_else(|| {
            warn!("{}: non-integer status.error_code {}", PROVIDER_ID, raw);
            MarketDataError::invalid(PROVIDER_ID, "'status.error_code' is not an integer")
        })?,
    };
    if code == 0 {
        return Ok(());
    }

    let message = status
        .get("error_message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();

    if QUOTA_ERRORS.contains(&code) {
        debug!("{}: quota error {} ({})", PROVIDER_ID, code, message);
        return Err(MarketDataError::UpstreamRateLimited {
            provider: PROVIDER_ID.to_string(),
            retry_after: None,
        });
    }

    Err(MarketDataError::NetworkFailure {
        provider: PROVIDER_ID.to_string(),
        message: format!("error {} - {}", code, message),
    })
}

/// Coin objects in a quotes response. `data` is keyed by symbol or id; values
/// are objects (v1) or arrays of objects.
fn coins(data: &Value) -> Result<Vec<&Map<String, Value>>, MarketDataError> {
    let map = object(PROVIDER_ID, data, "data")?;
    let mut out = Vec::with_capacity(map.len());
    for (key, entry) in map {
        match entry {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    out.push(object(PROVIDER_ID, item, &format!("data.{}[{}]", key, i))?);
                }
            }
            other => out.push(object(PROVIDER_ID, other, &format!("data.{}", key))?),
        }
    }
    Ok(out)
}

fn usd_quote<'a>(
    coin: &'a Map<String, Value>,
    currency: &str,
) -> Result<&'a Map<String, Value>, MarketDataError> {
    let quote = object(PROVIDER_ID, field(PROVIDER_ID, coin, "quote")?, "quote")?;
    object(PROVIDER_ID, field(PROVIDER_ID, quote, currency)?, currency)
}

fn coin_quote(coin: &Map<String, Value>, currency: &str) -> Result<CoinQuote, MarketDataError> {
    let quote = usd_quote(coin, currency)?;
    Ok(CoinQuote {
        symbol: string_field(PROVIDER_ID, coin, "symbol")?.to_lowercase(),
        id: coin.get("slug").and_then(Value::as_str).map(str::to_string),
        name: string_field(PROVIDER_ID, coin, "name")?,
        price: decimal_field(PROVIDER_ID, quote, "price")?,
        market_cap: opt_decimal(PROVIDER_ID, quote, "market_cap")?,
        market_cap_rank: opt_u64(PROVIDER_ID, coin, "cmc_rank")?.map(|r| r.min(u32::MAX as u64) as u32),
        volume_24h: opt_decimal(PROVIDER_ID, quote, "volume_24h")?,
        change_24h_pct: opt_decimal(PROVIDER_ID, quote, "percent_change_24h")?,
        source: PROVIDER_ID.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn btc() -> Value {
        json!({
            "id": 1, "name": "Bitcoin", "symbol": "BTC", "slug": "bitcoin", "cmc_rank": 1,
            "circulating_supply": 19700000, "max_supply": 21000000,
            "quote": { "USD": {
                "price": 64000.25, "volume_24h": 3.0e10, "market_cap": 1.26e12,
                "percent_change_24h": 1.5
            }}
        })
    }

    #[test]
    fn test_status_block_maps_quota_errors() {
        let value = json!({ "status": { "error_code": 1008, "error_message": "minute limit" } });
        assert!(matches!(
            check_status(&value),
            Err(MarketDataError::UpstreamRateLimited { .. })
        ));

        let ok = json!({ "status": { "error_code": 0 } });
        assert!(check_status(&ok).is_ok());

        let auth = json!({ "status": { "error_code": 1002, "error_message": "API key missing." } });
        assert!(matches!(
            check_status(&auth),
            Err(MarketDataError::NetworkFailure { .. })
        ));
    }

    #[test]
    fn test_status_block_rejects_non_integer_code() {
        for code in [json!("0"), json!(null), json!(1008.5), json!({ "code": 0 })] {
            let value = json!({ "status": { "error_code": code } });
            assert!(matches!(
                check_status(&value),
                Err(MarketDataError::ValidationFailure { .. })
            ));
        }

        let absent = json!({ "status": { "error_message": null } });
        assert!(check_status(&absent).is_ok());
    }

    #[test]
    fn test_coins_accepts_object_and_array_values() {
        let v1 = json!({ "BTC": btc() });
        assert_eq!(coins(&v1).unwrap().len(), 1);

        let v2 = json!({ "BTC": [btc(), btc()] });
        assert_eq!(coins(&v2).unwrap().len(), 2);
    }

    #[test]
    fn test_coin_quote() {
        let value = btc();
        let quote = coin_quote(value.as_object().unwrap(), "USD").unwrap();
        assert_eq!(quote.symbol, "btc");
        assert_eq!(quote.price, dec!(64000.25));
        assert_eq!(quote.market_cap_rank, Some(1));
        assert_eq!(quote.source, PROVIDER_ID);
    }

    #[test]
    fn test_coin_quote_requires_currency_block() {
        let value = json!({ "name": "Bitcoin", "symbol": "BTC", "quote": { "EUR": { "price": 1.0 } } });
        assert!(coin_quote(value.as_object().unwrap(), "USD").is_err());
    }

    #[test]
    fn test_capabilities() {
        let provider = CoinMarketCapProvider::new("key".to_string());
        assert!(provider.supports(&QueryShape::BatchQuote));
        assert!(!provider.supports(&QueryShape::Trending));
        assert!(provider.priority() > 1);
    }
}
