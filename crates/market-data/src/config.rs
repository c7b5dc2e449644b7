//! Environment-driven configuration and default wiring.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::provider::alternative_me::AlternativeMeProvider;
use crate::provider::coingecko::CoinGeckoProvider;
use crate::provider::coinmarketcap::CoinMarketCapProvider;
use crate::provider::MarketDataProvider;
use crate::registry::{MarketDataProxy, ProxyOptions};

/// Proxy configuration: upstream credentials plus coordinator tunables.
#[derive(Clone, Default)]
pub struct ProxyConfig {
    pub coingecko_api_key: Option<String>,
    /// Use the pro host and header for the CoinGecko key.
    pub coingecko_pro: bool,
    /// Without a key no secondary provider is registered.
    pub coinmarketcap_api_key: Option<String>,
    pub options: ProxyOptions,
}

impl ProxyConfig {
    /// Read configuration from the environment (and `.env`, when present).
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `COINGECKO_API_KEY` | unset (public API) |
    /// | `COINGECKO_PRO` | `false` |
    /// | `COINMARKETCAP_API_KEY` | unset (no secondary) |
    /// | `MARKET_PROXY_BACKGROUND_MAX_WAIT_SECS` | `60` |
    /// | `MARKET_PROXY_DEFERRED_REFRESH` | `true` |
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |name: &str, default: bool| {
            non_empty(name)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };

        let background_max_wait = non_empty("MARKET_PROXY_BACKGROUND_MAX_WAIT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(crate::registry::DEFAULT_BACKGROUND_MAX_WAIT);

        Self {
            coingecko_api_key: non_empty("COINGECKO_API_KEY"),
            coingecko_pro: flag("COINGECKO_PRO", false),
            coinmarketcap_api_key: non_empty("COINMARKETCAP_API_KEY"),
            options: ProxyOptions {
                background_max_wait,
                deferred_refresh: flag("MARKET_PROXY_DEFERRED_REFRESH", true),
                ..ProxyOptions::default()
            },
        }
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProxyConfig")
            .field("coingecko_api_key", &redact(&self.coingecko_api_key))
            .field("coingecko_pro", &self.coingecko_pro)
            .field("coinmarketcap_api_key", &redact(&self.coinmarketcap_api_key))
            .field("options", &self.options)
            .finish()
    }
}

/// Proxy wired with the stock adapters: CoinGecko, CoinMarketCap (when a key
/// is configured) and Alternative.me.
pub fn build_default_proxy(config: &ProxyConfig) -> MarketDataProxy {
    let coingecko = match (&config.coingecko_api_key, config.coingecko_pro) {
        (Some(key), true) => CoinGeckoProvider::with_pro_key(key.clone()),
        (Some(key), false) => CoinGeckoProvider::with_demo_key(key.clone()),
        (None, _) => CoinGeckoProvider::new(),
    };

    let mut providers: Vec<Arc<dyn MarketDataProvider>> =
        vec![Arc::new(coingecko), Arc::new(AlternativeMeProvider::new())];

    match &config.coinmarketcap_api_key {
        Some(key) => providers.push(Arc::new(CoinMarketCapProvider::new(key.clone()))),
        None => info!("COINMARKETCAP_API_KEY not set; running without a secondary provider"),
    }

    MarketDataProxy::with_options(providers, config.options.clone())
}
