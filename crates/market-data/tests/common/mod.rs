//! Scripted providers shared by the integration tests.

#![allow(dead_code)]

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use coinlens_market_data::{
    CoinQuote, MarketDataError, MarketDataProvider, MarketPayload, PricePoint, PriceSeries,
    ProviderCapabilities, ProviderResult, Query, RateLimit, SentimentReading, ShapeKind,
};

pub const ALL_SHAPES: &[ShapeKind] = &[
    ShapeKind::Detail,
    ShapeKind::History,
    ShapeKind::Ohlc,
    ShapeKind::MarketList,
    ShapeKind::BatchQuote,
    ShapeKind::GlobalMarket,
    ShapeKind::FearGreed,
    ShapeKind::Trending,
];

type Responder = Box<dyn Fn(&Query) -> Result<MarketPayload, MarketDataError> + Send + Sync>;

/// Provider whose answers are set by the test.
pub struct MockProvider {
    id: &'static str,
    priority: u8,
    shapes: &'static [ShapeKind],
    limit: RateLimit,
    delay: Duration,
    respond: Mutex<Responder>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Query>>,
}

impl MockProvider {
    pub fn new(
        id: &'static str,
        priority: u8,
        respond: impl Fn(&Query) -> Result<MarketPayload, MarketDataError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            priority,
            shapes: ALL_SHAPES,
            limit: loose_limit(),
            delay: Duration::ZERO,
            respond: Mutex::new(Box::new(respond)),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_shapes(mut self, shapes: &'static [ShapeKind]) -> Self {
        self.shapes = shapes;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_limit(mut self, limit: RateLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Replace the scripted answer for subsequent calls.
    pub fn respond_with(
        &self,
        respond: impl Fn(&Query) -> Result<MarketPayload, MarketDataError> + Send + Sync + 'static,
    ) {
        *self.respond.lock().unwrap() = Box::new(respond);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Query> {
        self.seen.lock().unwrap().clone()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            shapes: self.shapes,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        self.limit.clone()
    }

    async fn fetch(&self, query: &Query) -> Result<ProviderResult, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(query.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let payload = {
            let respond = self.respond.lock().unwrap();
            respond(query)
        }?;
        Ok(ProviderResult::new(payload, Cow::Borrowed(self.id)))
    }
}

/// Large window, no spacing, one-second backoff base.
pub fn loose_limit() -> RateLimit {
    RateLimit {
        window: Duration::from_secs(60),
        max_requests: 1_000,
        min_spacing: Duration::ZERO,
        backoff_base: Duration::from_secs(1),
        backoff_cap: Duration::from_secs(8),
    }
}

pub fn as_dyn(providers: &[&Arc<MockProvider>]) -> Vec<Arc<dyn MarketDataProvider>> {
    providers
        .iter()
        .map(|p| Arc::clone(p) as Arc<dyn MarketDataProvider>)
        .collect()
}

/// `n` hourly points with rising prices.
pub fn series(n: usize) -> MarketPayload {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let prices = (0..n)
        .map(|i| {
            PricePoint::new(
                start + chrono::Duration::hours(i as i64),
                Decimal::from(64_000 + i as i64),
            )
        })
        .collect();
    MarketPayload::Series(PriceSeries {
        prices,
        market_caps: Vec::new(),
        total_volumes: Vec::new(),
    })
}

pub fn quote(symbol: &str, price: i64, source: &str) -> CoinQuote {
    CoinQuote {
        symbol: symbol.to_string(),
        id: None,
        name: symbol.to_uppercase(),
        price: Decimal::from(price),
        market_cap: None,
        market_cap_rank: None,
        volume_24h: None,
        change_24h_pct: None,
        source: source.to_string(),
    }
}

/// Quotes for every requested symbol in `query`.
pub fn quotes_for(query: &Query, source: &str) -> MarketPayload {
    let quotes: BTreeMap<String, CoinQuote> = query
        .symbols()
        .into_iter()
        .map(|s| {
            let q = quote(&s, 10, source);
            (s, q)
        })
        .collect();
    MarketPayload::Quotes(quotes)
}

pub fn sentiment(value: u8) -> MarketPayload {
    MarketPayload::Sentiment(SentimentReading {
        value,
        classification: "Fear".to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
    })
}

pub fn network_failure(provider: &str) -> MarketDataError {
    MarketDataError::NetworkFailure {
        provider: provider.to_string(),
        message: "connection reset".to_string(),
    }
}

pub fn rate_limited(provider: &str, retry_after: Option<Duration>) -> MarketDataError {
    MarketDataError::UpstreamRateLimited {
        provider: provider.to_string(),
        retry_after,
    }
}
