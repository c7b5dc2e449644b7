//! Strict parsers for CoinGecko payloads.

use serde_json::{Map, Value};

use crate::errors::MarketDataError;
use crate::models::{Candle, CoinDetail, CoinQuote, GlobalMarket, PriceSeries, TrendingCoin};
use crate::provider::shape::{
    array, decimal, decimal_field, describe_shape, field, object, opt_decimal, opt_string,
    opt_u64, series, string_field, timestamp_millis, tuples,
};
use crate::resolver::CoinCandidate;

use super::PROVIDER_ID;

/// `/coins/{id}/market_chart`: `prices` is required, the other series optional.
pub(super) fn market_chart(value: &Value) -> Result<PriceSeries, MarketDataError> {
    let map = object(PROVIDER_ID, value, "market_chart")?;
    let prices = series(PROVIDER_ID, field(PROVIDER_ID, map, "prices")?, "prices")?;

    let optional_series = |name: &str| -> Result<Vec<_>, MarketDataError> {
        match map.get(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(v) => series(PROVIDER_ID, v, name),
        }
    };

    Ok(PriceSeries {
        prices,
        market_caps: optional_series("market_caps")?,
        total_volumes: optional_series("total_volumes")?,
    })
}

/// `/coins/{id}/ohlc`: `[[ts, open, high, low, close], ...]`.
pub(super) fn ohlc(value: &Value) -> Result<Vec<Candle>, MarketDataError> {
    tuples(PROVIDER_ID, value, "ohlc", 5)?
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let label = format!("ohlc[{}]", i);
            Ok(Candle {
                timestamp: timestamp_millis(PROVIDER_ID, &row[0], &label)?,
                open: decimal(PROVIDER_ID, &row[1], &label)?,
                high: decimal(PROVIDER_ID, &row[2], &label)?,
                low: decimal(PROVIDER_ID, &row[3], &label)?,
                close: decimal(PROVIDER_ID, &row[4], &label)?,
            })
        })
        .collect()
}

/// `/coins/{id}` with market data, priced in USD.
pub(super) fn coin_detail(value: &Value) -> Result<CoinDetail, MarketDataError> {
    let map = object(PROVIDER_ID, value, "coin")?;
    let market = object(PROVIDER_ID, field(PROVIDER_ID, map, "market_data")?, "market_data")?;

    let usd = |name: &str| -> Result<Option<rust_decimal::Decimal>, MarketDataError> {
        match market.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => opt_decimal(PROVIDER_ID, object(PROVIDER_ID, v, name)?, "usd"),
        }
    };

    let price = usd("current_price")?.ok_or_else(|| {
        MarketDataError::invalid(PROVIDER_ID, "'market_data.current_price.usd' missing")
    })?;

    let description = map
        .get("description")
        .and_then(Value::as_object)
        .and_then(|d| opt_string(d, "en"));

    let homepage = map
        .get("links")
        .and_then(|l| l.get("homepage"))
        .and_then(Value::as_array)
        .and_then(|pages| pages.iter().filter_map(Value::as_str).find(|p| !p.is_empty()))
        .map(str::to_string);

    Ok(CoinDetail {
        id: string_field(PROVIDER_ID, map, "id")?,
        symbol: string_field(PROVIDER_ID, map, "symbol")?.to_lowercase(),
        name: string_field(PROVIDER_ID, map, "name")?,
        price,
        market_cap: usd("market_cap")?,
        market_cap_rank: rank(map, "market_cap_rank")?,
        volume_24h: usd("total_volume")?,
        change_24h_pct: opt_decimal(PROVIDER_ID, market, "price_change_percentage_24h")?,
        circulating_supply: opt_decimal(PROVIDER_ID, market, "circulating_supply")?,
        max_supply: opt_decimal(PROVIDER_ID, market, "max_supply")?,
        description,
        homepage,
        source: PROVIDER_ID.to_string(),
    })
}

/// `/coins/markets` rows.
pub(super) fn markets(value: &Value) -> Result<Vec<CoinQuote>, MarketDataError> {
    array(PROVIDER_ID, value, "markets")?
        .iter()
        .enumerate()
        .map(|(i, row)| market_row(object(PROVIDER_ID, row, &format!("markets[{}]", i))?))
        .collect()
}

fn market_row(row: &Map<String, Value>) -> Result<CoinQuote, MarketDataError> {
    Ok(CoinQuote {
        symbol: string_field(PROVIDER_ID, row, "symbol")?.to_lowercase(),
        id: Some(string_field(PROVIDER_ID, row, "id")?),
        name: string_field(PROVIDER_ID, row, "name")?,
        price: decimal_field(PROVIDER_ID, row, "current_price")?,
        market_cap: opt_decimal(PROVIDER_ID, row, "market_cap")?,
        market_cap_rank: rank(row, "market_cap_rank")?,
        volume_24h: opt_decimal(PROVIDER_ID, row, "total_volume")?,
        change_24h_pct: opt_decimal(PROVIDER_ID, row, "price_change_percentage_24h")?,
        source: PROVIDER_ID.to_string(),
    })
}

/// `/global`, wrapped in `data`.
pub(super) fn global(value: &Value) -> Result<GlobalMarket, MarketDataError> {
    let root = object(PROVIDER_ID, value, "global")?;
    let data = object(PROVIDER_ID, field(PROVIDER_ID, root, "data")?, "data")?;

    let usd_of = |name: &str| -> Result<rust_decimal::Decimal, MarketDataError> {
        let inner = object(PROVIDER_ID, field(PROVIDER_ID, data, name)?, name)?;
        decimal_field(PROVIDER_ID, inner, "usd")
    };
    let dominance = object(
        PROVIDER_ID,
        field(PROVIDER_ID, data, "market_cap_percentage")?,
        "market_cap_percentage",
    )?;

    Ok(GlobalMarket {
        total_market_cap_usd: usd_of("total_market_cap")?,
        total_volume_usd: usd_of("total_volume")?,
        btc_dominance: decimal_field(PROVIDER_ID, dominance, "btc")?,
        eth_dominance: opt_decimal(PROVIDER_ID, dominance, "eth")?,
        active_cryptocurrencies: opt_u64(PROVIDER_ID, data, "active_cryptocurrencies")?,
        market_cap_change_24h_pct: opt_decimal(
            PROVIDER_ID,
            data,
            "market_cap_change_percentage_24h_usd",
        )?,
        source: PROVIDER_ID.to_string(),
    })
}

/// `/search/trending`: `{ coins: [{ item: {...} }] }`.
pub(super) fn trending(value: &Value) -> Result<Vec<TrendingCoin>, MarketDataError> {
    let root = object(PROVIDER_ID, value, "trending")?;
    array(PROVIDER_ID, field(PROVIDER_ID, root, "coins")?, "coins")?
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let label = format!("coins[{}]", i);
            let entry = object(PROVIDER_ID, entry, &label)?;
            let item = object(PROVIDER_ID, field(PROVIDER_ID, entry, "item")?, "item")?;
            Ok(TrendingCoin {
                id: string_field(PROVIDER_ID, item, "id")?,
                symbol: string_field(PROVIDER_ID, item, "symbol")?.to_lowercase(),
                name: string_field(PROVIDER_ID, item, "name")?,
                market_cap_rank: rank(item, "market_cap_rank")?,
                score: opt_u64(PROVIDER_ID, item, "score")?.unwrap_or(i as u64) as u32,
            })
        })
        .collect()
}

/// `/search`: coin candidates for id resolution.
pub(super) fn search_candidates(value: &Value) -> Result<Vec<CoinCandidate>, MarketDataError> {
    let root = object(PROVIDER_ID, value, "search")?;
    let coins = match root.get("coins") {
        Some(coins) => coins,
        None => {
            tracing::warn!(
                "{}: search payload without 'coins', shape {}",
                PROVIDER_ID,
                describe_shape(value)
            );
            return Err(MarketDataError::invalid(PROVIDER_ID, "'coins' missing"));
        }
    };

    array(PROVIDER_ID, coins, "coins")?
        .iter()
        .enumerate()
        .map(|(i, coin)| {
            let coin = object(PROVIDER_ID, coin, &format!("coins[{}]", i))?;
            Ok(CoinCandidate {
                id: string_field(PROVIDER_ID, coin, "id")?,
                symbol: string_field(PROVIDER_ID, coin, "symbol")?.to_lowercase(),
                name: string_field(PROVIDER_ID, coin, "name")?,
            })
        })
        .collect()
}

fn rank(map: &Map<String, Value>, name: &str) -> Result<Option<u32>, MarketDataError> {
    Ok(opt_u64(PROVIDER_ID, map, name)?.map(|r| r.min(u32::MAX as u64) as u32))
}
