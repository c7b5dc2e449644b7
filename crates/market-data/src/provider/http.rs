//! HTTP plumbing shared by the adapters.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::MarketDataError;

/// Send a request and decode the JSON body.
///
/// Status mapping:
/// - 429 → `UpstreamRateLimited` (with `Retry-After` when sent)
/// - 404 → `NotFound`
/// - other non-2xx → `NetworkFailure`
/// - unparseable body → `ValidationFailure`
pub(crate) async fn get_json(
    provider: &str,
    request: RequestBuilder,
    not_found_hint: &str,
) -> Result<Value, MarketDataError> {
    let response = request
        .send()
        .await
        .map_err(|e| MarketDataError::from_transport(provider, &e))?;

    let response = check_status(provider, response, not_found_hint).await?;

    let body = response
        .text()
        .await
        .map_err(|e| MarketDataError::from_transport(provider, &e))?;

    serde_json::from_str(&body).map_err(|e| {
        warn!(
            "{}: malformed JSON body ({} bytes): {}",
            provider,
            body.len(),
            e
        );
        MarketDataError::invalid(provider, format!("malformed JSON: {}", e))
    })
}

async fn check_status(
    provider: &str,
    response: Response,
    not_found_hint: &str,
) -> Result<Response, MarketDataError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after_header(&response);
        debug!("{}: 429 received, retry-after {:?}", provider, retry_after);
        return Err(MarketDataError::UpstreamRateLimited {
            provider: provider.to_string(),
            retry_after,
        });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(MarketDataError::NotFound(not_found_hint.to_string()));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(MarketDataError::NetworkFailure {
            provider: provider.to_string(),
            message: format!("HTTP {} - {}", status, snippet),
        });
    }

    Ok(response)
}

fn retry_after_header(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
