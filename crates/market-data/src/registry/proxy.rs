//! Request coordinator.
//!
//! The proxy is the single entry point callers use. For every query it:
//! 1. Serves a fresh cache entry if there is one
//! 2. Coalesces onto an in-flight fetch for the same key
//! 3. Admits the call through the provider's rate limiter
//! 4. Fetches, validates and caches the primary result
//! 5. Otherwise walks the degradation chain: stale cache, secondary provider,
//!    last-known value, synthetic chart filler
//!
//! Unrelated keys never wait on each other; the only shared locks are
//! per-key cache shards and per-provider limiter state.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};

use super::inflight::{InFlight, Join};
use super::rate_limiter::{Admission, RateLimitState, RateLimiter};
use super::refresh::RefreshScheduler;
use super::trace::{ResolutionTrace, SkipReason, Stage};
use super::validator::{PayloadValidator, ValidatorConfig};
use crate::cache::{CacheEntry, CacheLookup, CacheStore, LastKnownStore, TtlPolicy};
use crate::errors::{seconds_ceil, MarketDataError, ResolveError};
use crate::fallback::{merge_quotes, missing_symbols, synthetic_payload, FallbackPlan};
use crate::models::{
    CacheKey, CoinQuote, MarketPayload, Priority, Provenance, ProviderId, ProviderResult,
    ProxyResponse, Query, QueryShape,
};
use crate::provider::MarketDataProvider;

/// Default bound on how long background callers wait for the rate limiter.
pub const DEFAULT_BACKGROUND_MAX_WAIT: Duration = Duration::from_secs(60);

/// Tunables for the coordinator.
#[derive(Clone, Debug)]
pub struct ProxyOptions {
    pub ttl: TtlPolicy,
    /// Longest a background caller waits for the rate limiter.
    pub background_max_wait: Duration,
    /// Schedule a background refresh when an interactive caller was denied.
    pub deferred_refresh: bool,
    pub validator: ValidatorConfig,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            ttl: TtlPolicy::default(),
            background_max_wait: DEFAULT_BACKGROUND_MAX_WAIT,
            deferred_refresh: true,
            validator: ValidatorConfig::default(),
        }
    }
}

struct ProxyInner {
    /// Sorted by priority; the first provider serving a shape is its primary.
    providers: Vec<Arc<dyn MarketDataProvider>>,
    cache: CacheStore,
    last_known: LastKnownStore,
    limiter: RateLimiter,
    validator: PayloadValidator,
    inflight: InFlight,
    refresh: RefreshScheduler,
    options: ProxyOptions,
}

/// Rate-limited, multi-provider caching proxy for market data.
///
/// Cheap to clone; clones share all state. Construct once at startup and hand
/// clones to request handlers.
#[derive(Clone)]
pub struct MarketDataProxy {
    inner: Arc<ProxyInner>,
}

/// Primary outcome carried into the degradation chain.
enum PrimaryOutcome {
    /// Nothing usable came back.
    Failed,
    /// The entity does not exist upstream.
    NotFound(MarketDataError),
}

impl MarketDataProxy {
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self::with_options(providers, ProxyOptions::default())
    }

    pub fn with_options(
        mut providers: Vec<Arc<dyn MarketDataProvider>>,
        options: ProxyOptions,
    ) -> Self {
        providers.sort_by_key(|p| p.priority());

        let limiter = RateLimiter::new();
        for provider in &providers {
            limiter.register(provider.id(), provider.rate_limit());
        }

        info!(
            "Market data proxy with providers: {}",
            providers
                .iter()
                .map(|p| p.id())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            inner: Arc::new(ProxyInner {
                providers,
                cache: CacheStore::new(),
                last_known: LastKnownStore::new(),
                limiter,
                validator: PayloadValidator::with_config(options.validator.clone()),
                inflight: InFlight::new(),
                refresh: RefreshScheduler::new(),
                options,
            }),
        }
    }

    /// Resolve a query to data, degrading gracefully when upstreams fail.
    ///
    /// Only `NotFound` and `AllSourcesExhausted` are ever returned as errors.
    pub async fn resolve(&self, query: Query) -> Result<ProxyResponse, ResolveError> {
        self.resolve_query(&query).await.map_err(|e| {
            let error = ResolveError::from(e);
            debug!("Resolve failed for '{}': {}", query.cache_key(), error);
            error
        })
    }

    async fn resolve_query(&self, query: &Query) -> Result<ProxyResponse, MarketDataError> {
        let key = query.cache_key();
        let ttl = self.inner.options.ttl.ttl_for(&query.query_shape);

        let lookup = self.inner.cache.lookup(&key, ttl, Utc::now());
        if let CacheLookup::Fresh(entry) = &lookup {
            debug!("Cache hit for '{}'", key);
            return Ok(from_entry(entry, false, None));
        }

        loop {
            match self.inner.inflight.join(&key) {
                Join::Leader(guard) => {
                    // A previous leader may have finished between the lookup and now.
                    let outcome = match self.inner.cache.lookup(&key, ttl, Utc::now()) {
                        CacheLookup::Fresh(entry) => Ok(from_entry(&entry, false, None)),
                        _ => self.run_pipeline(query, &key).await,
                    };
                    guard.publish(outcome.clone());
                    return outcome;
                }
                Join::Follower(mut receiver) => {
                    if query.priority == Priority::Interactive {
                        if let Some(entry) = lookup.entry() {
                            debug!("Serving stale '{}' while a fetch is in flight", key);
                            return Ok(from_entry(entry, true, None));
                        }
                    }
                    match receiver.recv().await {
                        Ok(outcome) => return outcome,
                        Err(_) => {
                            debug!("In-flight fetch for '{}' was abandoned, retrying", key);
                            continue;
                        }
                    }
                }
            }
        }
    }

    /// Providers able to serve `shape`, primary first.
    fn chain_for(&self, shape: &QueryShape) -> Vec<Arc<dyn MarketDataProvider>> {
        self.inner
            .providers
            .iter()
            .filter(|p| p.supports(shape))
            .cloned()
            .collect()
    }

    async fn run_pipeline(
        &self,
        query: &Query,
        key: &CacheKey,
    ) -> Result<ProxyResponse, MarketDataError> {
        let mut trace = ResolutionTrace::new(key.clone());
        let plan = FallbackPlan::for_shape(&query.query_shape);
        let chain = self.chain_for(&query.query_shape);
        let primary = chain.first().cloned();
        let secondary = chain.get(1).cloned();

        let outcome = match &primary {
            None => {
                trace.record_skip(Stage::Primary, None, SkipReason::NoProvider);
                PrimaryOutcome::Failed
            }
            Some(provider) => {
                match self
                    .call_provider(provider.as_ref(), query, Stage::Primary, &mut trace)
                    .await
                {
                    Ok(result) if query.query_shape == QueryShape::BatchQuote => {
                        let response = self
                            .complete_batch(query, key, result, plan, secondary.as_deref(), &mut trace)
                            .await;
                        debug!("{}", trace.summary());
                        return Ok(response);
                    }
                    Ok(result) => {
                        debug!("{}", trace.summary());
                        return Ok(self.store(query, key, result, Provenance::Primary));
                    }
                    Err(e @ MarketDataError::NotFound(_)) => PrimaryOutcome::NotFound(e),
                    Err(_) => PrimaryOutcome::Failed,
                }
            }
        };

        self.degrade(query, key, plan, outcome, secondary.as_deref(), trace)
            .await
    }

    /// Walk the degradation chain after the primary failed or was denied.
    async fn degrade(
        &self,
        query: &Query,
        key: &CacheKey,
        plan: FallbackPlan,
        outcome: PrimaryOutcome,
        secondary: Option<&dyn MarketDataProvider>,
        mut trace: ResolutionTrace,
    ) -> Result<ProxyResponse, MarketDataError> {
        // Unknown entities skip every fallback that would hide the fact.
        if let PrimaryOutcome::NotFound(not_found) = outcome {
            if let (true, Some(provider)) = (plan.secondary, secondary) {
                if let Ok(result) = self
                    .call_provider(provider, query, Stage::Secondary, &mut trace)
                    .await
                {
                    debug!("{}", trace.summary());
                    return Ok(self.store(query, key, restrict(query, result), Provenance::Secondary));
                }
            }
            info!("{}", trace.summary());
            return Err(not_found);
        }

        // 1. Stale cache.
        if let Some(entry) = self.inner.cache.get(key) {
            trace.record_success(Stage::StaleCache, Some(entry.source.clone()));
            let retry_after = trace.earliest_retry_after();
            self.defer_refresh(query, key, &trace);
            info!("Serving stale data: {}", trace.summary());
            return Ok(from_entry(&entry, true, retry_after));
        }
        trace.record_skip(Stage::StaleCache, None, SkipReason::NothingStored);

        // 2. Secondary provider.
        match (plan.secondary, secondary) {
            (false, _) => trace.record_skip(Stage::Secondary, None, SkipReason::NotInPlan),
            (true, None) => trace.record_skip(Stage::Secondary, None, SkipReason::NoProvider),
            (true, Some(provider)) => {
                if let Ok(result) = self
                    .call_provider(provider, query, Stage::Secondary, &mut trace)
                    .await
                {
                    info!("Served from secondary: {}", trace.summary());
                    return Ok(self.store(query, key, restrict(query, result), Provenance::Secondary));
                }
            }
        }

        // 3. Last-known value for single-value feeds.
        if plan.last_known {
            if let Some(entry) = self.inner.last_known.get(&feed_name(query)) {
                trace.record_success(Stage::LastKnown, Some(entry.source.clone()));
                let retry_after = trace.earliest_retry_after();
                self.defer_refresh(query, key, &trace);
                info!("Serving last-known value: {}", trace.summary());
                let mut response = from_entry(&entry, true, retry_after);
                response.provenance = Provenance::LastKnown;
                return Ok(response);
            }
            trace.record_skip(Stage::LastKnown, None, SkipReason::NothingStored);
        } else {
            trace.record_skip(Stage::LastKnown, None, SkipReason::NotInPlan);
        }

        // 4. Synthetic chart filler. Never cached.
        if plan.synthetic {
            let now = Utc::now();
            if let Some(payload) = synthetic_payload(key, &query.query_shape, now) {
                trace.record_success(Stage::Synthetic, None);
                warn!("Serving synthetic data: {}", trace.summary());
                return Ok(ProxyResponse {
                    data: payload,
                    stale: false,
                    synthetic: true,
                    provenance: Provenance::Synthetic,
                    fetched_at: now,
                    retry_after_seconds: trace.earliest_retry_after().map(seconds_ceil),
                });
            }
        }
        trace.record_skip(Stage::Synthetic, None, SkipReason::NotInPlan);

        // 5. Nothing left.
        warn!("All sources exhausted: {}", trace.summary());
        Err(MarketDataError::AllSourcesExhausted {
            message: format!("No data available for '{}'", key),
            retry_after: trace.earliest_retry_after(),
        })
    }

    /// Finish a batch after a primary success: ask the secondary only for
    /// the symbols the primary did not supply, then merge.
    async fn complete_batch(
        &self,
        query: &Query,
        key: &CacheKey,
        primary: ProviderResult,
        plan: FallbackPlan,
        secondary: Option<&dyn MarketDataProvider>,
        trace: &mut ResolutionTrace,
    ) -> ProxyResponse {
        let requested = query.symbols();
        let primary_quotes = match &primary.data {
            MarketPayload::Quotes(quotes) => quotes.clone(),
            _ => BTreeMap::new(),
        };
        let missing = missing_symbols(&requested, &primary_quotes);

        let provider = match (missing.is_empty(), plan.secondary, secondary) {
            (true, _, _) => {
                trace.record_skip(Stage::Secondary, None, SkipReason::NothingMissing);
                None
            }
            (false, true, Some(provider)) => Some(provider),
            (false, _, _) => {
                trace.record_skip(Stage::Secondary, None, SkipReason::NoProvider);
                None
            }
        };

        let Some(provider) = provider else {
            return self.store(query, key, primary, Provenance::Primary);
        };

        debug!(
            "Batch '{}': primary missing {} of {} symbols, asking {}",
            key,
            missing.len(),
            requested.len(),
            provider.id()
        );
        let sub_query = query.with_symbols(&missing);
        let secondary_quotes = match self
            .call_provider(provider, &sub_query, Stage::Secondary, trace)
            .await
        {
            Ok(result) => only_symbols(result.data.into_quotes().unwrap_or_default(), &missing),
            Err(_) => BTreeMap::new(),
        };

        let merged = merge_quotes(primary_quotes, secondary_quotes);
        let result = ProviderResult {
            data: MarketPayload::Quotes(merged),
            provider_id: primary.provider_id,
            fetched_at: primary.fetched_at,
        };
        self.store(query, key, result, Provenance::Primary)
    }

    /// Admit, fetch with timeout, validate, and account the outcome.
    async fn call_provider(
        &self,
        provider: &dyn MarketDataProvider,
        query: &Query,
        stage: Stage,
        trace: &mut ResolutionTrace,
    ) -> Result<ProviderResult, MarketDataError> {
        let id = provider.id();
        let provider_id: ProviderId = Cow::Borrowed(id);

        let admission = self
            .inner
            .limiter
            .acquire_requests(
                id,
                query.priority,
                self.inner.options.background_max_wait,
                provider.request_cost(query),
            )
            .await;
        if let Admission::Denied { retry_after } = admission {
            trace.record_skip(stage, Some(provider_id), SkipReason::RateLimited { retry_after });
            return Err(MarketDataError::UpstreamRateLimited {
                provider: id.to_string(),
                retry_after: Some(retry_after),
            });
        }

        let timeout = query.query_shape.fetch_timeout();
        let fetched = match tokio::time::timeout(timeout, provider.fetch(query)).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::NetworkFailure {
                provider: id.to_string(),
                message: format!("timed out after {:?}", timeout),
            }),
        };
        let validated = fetched.and_then(|result| {
            self.inner.validator.validate(id, &result.data)?;
            Ok(result)
        });

        match validated {
            Ok(result) => {
                self.inner.limiter.record_success(id);
                trace.record_success(stage, Some(provider_id));
                debug!("Fetched {} from '{}'", result.data.describe(), id);
                Ok(result)
            }
            Err(error) => {
                if error.penalizes_provider() {
                    self.inner.limiter.record_failure(id, error.retry_after());
                }
                warn!("Provider '{}' failed for '{}': {}", id, query.cache_key(), error);
                trace.record_error(stage, Some(provider_id), error.to_string(), error.retry_after());
                Err(error)
            }
        }
    }

    /// Write a fetched result to the cache and build the fresh response.
    fn store(
        &self,
        query: &Query,
        key: &CacheKey,
        result: ProviderResult,
        provenance: Provenance,
    ) -> ProxyResponse {
        let entry = CacheEntry::from_result(result, provenance);
        if query.query_shape.is_single_value_feed() {
            self.inner.last_known.record(&feed_name(query), entry.clone());
        }
        let response = from_entry(&entry, false, None);
        self.inner.cache.put(key.clone(), entry);
        response
    }

    /// Schedule a background refresh when an interactive caller was turned
    /// away by the rate limiter.
    fn defer_refresh(&self, query: &Query, key: &CacheKey, trace: &ResolutionTrace) {
        if !self.inner.options.deferred_refresh || query.priority != Priority::Interactive {
            return;
        }
        let Some(delay) = trace.denied_retry_after() else {
            return;
        };
        self.inner.refresh.schedule(
            key.clone(),
            delay,
            self.clone().refresh_task(query.clone().background()),
        );
    }

    /// Boxed so the spawned future's type does not depend on `resolve_query`'s
    /// own future type.
    fn refresh_task(self, query: Query) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            match self.resolve_query(&query).await {
                Ok(response) => debug!(
                    "Deferred refresh of '{}' done (stale: {})",
                    query.cache_key(),
                    response.stale
                ),
                Err(e) => debug!("Deferred refresh of '{}' failed: {}", query.cache_key(), e),
            }
        })
    }

    /// Copy of a provider's limiter state.
    pub fn rate_limit_snapshot(&self, provider: &str) -> Option<RateLimitState> {
        self.inner.limiter.snapshot(provider)
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }

    /// Number of keys with a fetch currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.inflight.len()
    }

    pub fn pending_refreshes(&self) -> usize {
        self.inner.refresh.pending()
    }

    /// Abort every scheduled background refresh.
    pub fn cancel_refreshes(&self) {
        self.inner.refresh.cancel_all();
    }

    /// Provider ids in priority order.
    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.inner.providers.iter().map(|p| p.id()).collect()
    }
}

fn from_entry(entry: &CacheEntry, stale: bool, retry_after: Option<Duration>) -> ProxyResponse {
    ProxyResponse {
        data: entry.payload.clone(),
        stale,
        synthetic: false,
        provenance: entry.provenance,
        fetched_at: entry.fetched_at,
        retry_after_seconds: retry_after.map(seconds_ceil),
    }
}

fn feed_name(query: &Query) -> String {
    query.query_shape.tag()
}

fn only_symbols(
    quotes: BTreeMap<String, CoinQuote>,
    symbols: &[String],
) -> BTreeMap<String, CoinQuote> {
    quotes
        .into_iter()
        .filter(|(symbol, _)| symbols.contains(symbol))
        .collect()
}

/// Drop secondary batch entries nobody asked for.
fn restrict(query: &Query, mut result: ProviderResult) -> ProviderResult {
    if let MarketPayload::Quotes(quotes) = result.data {
        result.data = MarketPayload::Quotes(only_symbols(quotes, &query.symbols()));
    }
    result
}
