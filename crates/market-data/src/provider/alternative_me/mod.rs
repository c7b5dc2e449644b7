//! Alternative.me Fear & Greed index provider.
//!
//! Single-value feed with no secondary source; the proxy falls back to the
//! last value it observed. The endpoint is keyless.
//! API documentation: https://alternative.me/crypto/fear-and-greed-index/#api

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{MarketPayload, ProviderResult, Query, QueryShape, SentimentReading, ShapeKind};
use crate::provider::http::get_json;
use crate::provider::shape::{array, describe_shape, field, object, string_field};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

const BASE_URL: &str = "https://api.alternative.me";
pub(crate) const PROVIDER_ID: &str = "ALTERNATIVE_ME";

pub struct AlternativeMeProvider {
    client: Client,
    base_url: String,
}

impl AlternativeMeProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for AlternativeMeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for AlternativeMeProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        3
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            shapes: &[ShapeKind::FearGreed],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            window: Duration::from_secs(300),
            max_requests: 2,
            min_spacing: Duration::from_secs(60),
            backoff_base: Duration::from_secs(30),
            backoff_cap: Duration::from_secs(4 * 60),
        }
    }

    async fn fetch(&self, query: &Query) -> Result<ProviderResult, MarketDataError> {
        if query.query_shape != QueryShape::FearGreed {
            return Err(MarketDataError::Unsupported {
                provider: PROVIDER_ID.to_string(),
                shape: query.query_shape.tag(),
            });
        }

        debug!("Alternative.me request: /fng/");
        let request = self
            .client
            .get(format!("{}/fng/", self.base_url))
            .query(&[("limit", "1")]);
        let value = get_json(PROVIDER_ID, request, "fear-greed").await?;

        let reading = parse_reading(&value).map_err(|e| {
            warn!(
                "{}: payload rejected ({}); shape {}",
                PROVIDER_ID,
                e,
                describe_shape(&value)
            );
            e
        })?;

        Ok(ProviderResult::new(
            MarketPayload::Sentiment(reading),
            Cow::Borrowed(PROVIDER_ID),
        ))
    }
}

/// Parse `{ data: [{ value, value_classification, timestamp }] }`.
///
/// The API sends `value` and `timestamp` as decimal strings; anything that is
/// not a plain integer string is rejected.
fn parse_reading(value: &Value) -> Result<SentimentReading, MarketDataError> {
    let root = object(PROVIDER_ID, value, "response")?;
    check_metadata(root)?;

    let data = array(PROVIDER_ID, field(PROVIDER_ID, root, "data")?, "data")?;
    let first = data
        .first()
        .ok_or_else(|| MarketDataError::invalid(PROVIDER_ID, "'data' is empty"))?;
    let entry = object(PROVIDER_ID, first, "data[0]")?;

    let index: u8 = integer_string(entry, "value")?
        .try_into()
        .ok()
        .filter(|v: &u8| *v <= 100)
        .ok_or_else(|| MarketDataError::invalid(PROVIDER_ID, "'value' outside 0..=100"))?;

    let seconds = integer_string(entry, "timestamp")?;
    let timestamp = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| MarketDataError::invalid(PROVIDER_ID, "'timestamp' out of range"))?;

    Ok(SentimentReading {
        value: index,
        classification: string_field(PROVIDER_ID, entry, "value_classification")?,
        timestamp,
    })
}

fn check_metadata(root: &Map<String, Value>) -> Result<(), MarketDataError> {
    let error = root
        .get("metadata")
        .and_then(|m| m.get("error"))
        .and_then(Value::as_str);
    match error {
        Some(message) if !message.is_empty() => Err(MarketDataError::NetworkFailure {
            provider: PROVIDER_ID.to_string(),
            message: message.to_string(),
        }),
        _ => Ok(()),
    }
}

fn integer_string(entry: &Map<String, Value>, name: &str) -> Result<i64, MarketDataError> {
    match field(PROVIDER_ID, entry, name)? {
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| MarketDataError::invalid(PROVIDER_ID, format!("'{}' is not an integer", name))),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| MarketDataError::invalid(PROVIDER_ID, format!("'{}' is not an integer", name))),
        _ => Err(MarketDataError::invalid(
            PROVIDER_ID,
            format!("'{}' is not an integer", name),
        )),
    }
}
