//! Adapter tests against a local HTTP mock of each upstream.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coinlens_market_data::{
    AlternativeMeProvider, CoinGeckoProvider, CoinMarketCapProvider, HistoryRange,
    MarketDataError, MarketDataProvider, MarketDataProxy, MarketPayload, ProxyOptions, Query,
};

fn chart(points: usize) -> Value {
    let prices: Vec<Value> = (0..points)
        .map(|i| json!([1_700_000_000_000i64 + i as i64 * 3_600_000, 64_000.0 + i as f64]))
        .collect();
    json!({ "prices": prices, "market_caps": [], "total_volumes": [] })
}

fn search_btc() -> Value {
    json!({ "coins": [
        { "id": "bitcoin-token-on-x", "symbol": "BTC", "name": "Bitcoin Token" },
        { "id": "bitcoin", "symbol": "BTC", "name": "Bitcoin" }
    ]})
}

async fn mount_search(server: &MockServer, query: &str, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", query))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

// =============================================================================
// CoinGecko
// =============================================================================

#[tokio::test]
async fn test_coingecko_history_resolves_ticker_once() {
    let server = MockServer::start().await;
    mount_search(&server, "btc", search_btc(), 1).await;
    Mock::given(method("GET"))
        .and(path("/coins/bitcoin/market_chart"))
        .and(query_param("vs_currency", "usd"))
        .and(query_param("days", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart(24)))
        .expect(2)
        .mount(&server)
        .await;

    let provider = CoinGeckoProvider::new().with_base_url(server.uri());
    let query = Query::history("BTC", HistoryRange::Day);

    for _ in 0..2 {
        let result = provider.fetch(&query).await.unwrap();
        match result.data {
            MarketPayload::Series(series) => assert_eq!(series.prices.len(), 24),
            other => panic!("unexpected payload {}", other.describe()),
        }
        assert_eq!(result.provider_id, "COINGECKO");
    }
}

#[tokio::test]
async fn test_coingecko_unknown_coin_is_not_found() {
    let server = MockServer::start().await;
    mount_search(&server, "nosuchcoin", json!({ "coins": [] }), 1).await;

    let provider = CoinGeckoProvider::new().with_base_url(server.uri());
    let err = provider.fetch(&Query::detail("nosuchcoin")).await.unwrap_err();

    assert!(matches!(err, MarketDataError::NotFound(ref id) if id == "nosuchcoin"));
}

#[tokio::test]
async fn test_coingecko_429_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/global"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "17"))
        .mount(&server)
        .await;

    let provider = CoinGeckoProvider::new().with_base_url(server.uri());
    let err = provider.fetch(&Query::global()).await.unwrap_err();

    assert_eq!(err.retry_after(), Some(Duration::from_secs(17)));
    assert!(matches!(err, MarketDataError::UpstreamRateLimited { .. }));
}

#[tokio::test]
async fn test_coingecko_demo_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/global"))
        .and(header("x-cg-demo-api-key", "demo-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {
            "active_cryptocurrencies": 12000,
            "total_market_cap": { "usd": 2.4e12 },
            "total_volume": { "usd": 9.0e10 },
            "market_cap_percentage": { "btc": 52.1, "eth": 16.9 },
            "market_cap_change_percentage_24h_usd": 0.8
        }})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = CoinGeckoProvider::with_demo_key("demo-key".to_string()).with_base_url(server.uri());
    let result = provider.fetch(&Query::global()).await.unwrap();

    assert!(matches!(result.data, MarketPayload::Global(_)));
}

#[tokio::test]
async fn test_coingecko_batch_picks_canonical_token_and_skips_unlisted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/markets"))
        .and(query_param("symbols", "btc,zzz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "bitcoin-token-on-x", "symbol": "btc", "name": "Bitcoin Token", "current_price": 0.01 },
            { "id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 64000.5, "market_cap_rank": 1 }
        ])))
        .mount(&server)
        .await;

    let provider = CoinGeckoProvider::new().with_base_url(server.uri());
    let result = provider.fetch(&Query::batch(&["ZZZ", "btc"])).await.unwrap();

    let quotes = result.data.as_quotes().unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes["btc"].id.as_deref(), Some("bitcoin"));
}

#[tokio::test]
async fn test_proxy_degrades_when_prices_missing() {
    let server = MockServer::start().await;
    mount_search(&server, "btc", search_btc(), 1).await;
    Mock::given(method("GET"))
        .and(path("/coins/bitcoin/market_chart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "market_caps": [] })))
        .mount(&server)
        .await;

    let provider = CoinGeckoProvider::new().with_base_url(server.uri());
    let proxy = MarketDataProxy::with_options(
        vec![Arc::new(provider) as Arc<dyn MarketDataProvider>],
        ProxyOptions {
            deferred_refresh: false,
            ..ProxyOptions::default()
        },
    );

    let response = proxy
        .resolve(Query::history("btc", HistoryRange::Day))
        .await
        .unwrap();

    assert!(response.synthetic);
    assert_eq!(proxy.cache_len(), 0);
    assert_eq!(
        proxy.rate_limit_snapshot("COINGECKO").unwrap().consecutive_failures,
        1
    );
}

#[tokio::test]
async fn test_proxy_charges_id_lookup_to_quota() {
    let server = MockServer::start().await;
    mount_search(&server, "btc", search_btc(), 1).await;
    Mock::given(method("GET"))
        .and(path("/coins/bitcoin/market_chart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart(24)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = CoinGeckoProvider::new().with_base_url(server.uri());
    let proxy = MarketDataProxy::with_options(
        vec![Arc::new(provider) as Arc<dyn MarketDataProvider>],
        ProxyOptions {
            deferred_refresh: false,
            ..ProxyOptions::default()
        },
    );

    let response = proxy
        .resolve(Query::history("btc", HistoryRange::Day))
        .await
        .unwrap();
    assert!(!response.synthetic);

    let upstream = server.received_requests().await.unwrap().len();
    let counted = proxy
        .rate_limit_snapshot("COINGECKO")
        .unwrap()
        .requests_in_window;
    assert_eq!(upstream, 2);
    assert_eq!(counted as usize, upstream);
}

// =============================================================================
// CoinMarketCap
// =============================================================================

#[tokio::test]
async fn test_coinmarketcap_batch_sends_key_and_uppercases_symbols() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/cryptocurrency/quotes/latest"))
        .and(header("X-CMC_PRO_API_KEY", "cmc-key"))
        .and(query_param("symbol", "BTC,ETH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": { "error_code": 0, "error_message": null },
            "data": {
                "BTC": [{ "slug": "bitcoin", "symbol": "BTC", "name": "Bitcoin", "cmc_rank": 1,
                          "quote": { "USD": { "price": 64000.5, "market_cap": 1.2e12 } } }],
                "ETH": { "slug": "ethereum", "symbol": "ETH", "name": "Ethereum", "cmc_rank": 2,
                         "quote": { "USD": { "price": 3100.25 } } }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = CoinMarketCapProvider::new("cmc-key".to_string()).with_base_url(server.uri());
    let result = provider.fetch(&Query::batch(&["eth", "btc"])).await.unwrap();

    let quotes = result.data.as_quotes().unwrap();
    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes["eth"].source, "COINMARKETCAP");
    assert_eq!(quotes["btc"].market_cap_rank, Some(1));
}

#[tokio::test]
async fn test_coinmarketcap_quota_code_is_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/global-metrics/quotes/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": { "error_code": 1008, "error_message": "You've exceeded your API Key's HTTP request rate limit." }
        })))
        .mount(&server)
        .await;

    let provider = CoinMarketCapProvider::new("cmc-key".to_string()).with_base_url(server.uri());
    let err = provider.fetch(&Query::global()).await.unwrap_err();

    assert!(matches!(err, MarketDataError::UpstreamRateLimited { .. }));
    assert!(err.penalizes_provider());
}

#[tokio::test]
async fn test_coinmarketcap_rejects_chart_shapes() {
    let provider = CoinMarketCapProvider::new("cmc-key".to_string()).with_base_url("http://127.0.0.1:1");
    assert!(!provider.supports(&Query::history("btc", HistoryRange::Day).query_shape));

    let err = provider
        .fetch(&Query::history("btc", HistoryRange::Day))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketDataError::Unsupported { .. }));
}

// =============================================================================
// Alternative.me
// =============================================================================

#[tokio::test]
async fn test_alternative_me_reading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fng/"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Fear and Greed Index",
            "data": [{
                "value": "72",
                "value_classification": "Greed",
                "timestamp": "1700000000",
                "time_until_update": "3600"
            }],
            "metadata": { "error": null }
        })))
        .mount(&server)
        .await;

    let provider = AlternativeMeProvider::new().with_base_url(server.uri());
    let result = provider.fetch(&Query::fear_greed()).await.unwrap();

    match result.data {
        MarketPayload::Sentiment(reading) => {
            assert_eq!(reading.value, 72);
            assert_eq!(reading.classification, "Greed");
            assert_eq!(reading.timestamp.timestamp(), 1_700_000_000);
        }
        other => panic!("unexpected payload {}", other.describe()),
    }
}

#[tokio::test]
async fn test_alternative_me_rejects_non_numeric_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fng/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "value": "high", "value_classification": "Greed", "timestamp": "1700000000" }]
        })))
        .mount(&server)
        .await;

    let provider = AlternativeMeProvider::new().with_base_url(server.uri());
    let err = provider.fetch(&Query::fear_greed()).await.unwrap_err();

    assert!(matches!(err, MarketDataError::ValidationFailure { .. }));
}

#[tokio::test]
async fn test_alternative_me_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fng/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let provider = AlternativeMeProvider::new().with_base_url(server.uri());
    let err = provider.fetch(&Query::fear_greed()).await.unwrap_err();

    assert!(matches!(err, MarketDataError::ValidationFailure { .. }));
}
