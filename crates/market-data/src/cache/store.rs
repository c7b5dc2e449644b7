use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;

use crate::models::{CacheKey, MarketPayload, Provenance, ProviderId, ProviderResult};

/// A cached payload with the time it was fetched and who produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub payload: MarketPayload,
    pub fetched_at: DateTime<Utc>,
    pub source: ProviderId,
    /// Role of `source` in the provider chain when the entry was written.
    pub provenance: Provenance,
}

impl CacheEntry {
    pub fn new(
        payload: MarketPayload,
        fetched_at: DateTime<Utc>,
        source: ProviderId,
        provenance: Provenance,
    ) -> Self {
        Self {
            payload,
            fetched_at,
            source,
            provenance,
        }
    }

    pub fn from_result(result: ProviderResult, provenance: Provenance) -> Self {
        Self {
            payload: result.data,
            fetched_at: result.fetched_at,
            source: result.provider_id,
            provenance,
        }
    }

    /// Time since fetch; zero when the fetch time lies in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Whether an entry is still within its TTL at `now`.
///
/// Pure function of `now - fetched_at` against `ttl`; once false for a given
/// entry it stays false as `now` advances.
pub fn is_fresh(entry: &CacheEntry, ttl: Duration, now: DateTime<Utc>) -> bool {
    entry.age(now) < ttl
}

/// Outcome of a cache lookup. Staleness and absence are distinct.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheLookup {
    Fresh(CacheEntry),
    Stale(CacheEntry),
    Missing,
}

impl CacheLookup {
    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            Self::Fresh(entry) | Self::Stale(entry) => Some(entry),
            Self::Missing => None,
        }
    }

    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            Self::Fresh(entry) | Self::Stale(entry) => Some(entry),
            Self::Missing => None,
        }
    }
}

/// Keyed store holding at most one entry (the latest) per key.
///
/// Sharded by key, so writes to unrelated keys never contend.
#[derive(Default)]
pub struct CacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Replace the entry for `key`.
    ///
    /// An entry fetched earlier than the one already stored is discarded, so a
    /// slow writer can never roll the cache back.
    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if entry.fetched_at >= occupied.get().fetched_at {
                    occupied.insert(entry);
                } else {
                    debug!(
                        "Cache: discarding out-of-order write for '{}'",
                        occupied.key()
                    );
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
    }

    pub fn lookup(&self, key: &CacheKey, ttl: Duration, now: DateTime<Utc>) -> CacheLookup {
        match self.get(key) {
            Some(entry) if is_fresh(&entry, ttl, now) => CacheLookup::Fresh(entry),
            Some(entry) => CacheLookup::Stale(entry),
            None => CacheLookup::Missing,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Last successful value per single-value feed, regardless of age.
#[derive(Default)]
pub struct LastKnownStore {
    values: DashMap<String, CacheEntry>,
}

impl LastKnownStore {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
        }
    }

    pub fn get(&self, feed: &str) -> Option<CacheEntry> {
        self.values.get(feed).map(|entry| entry.value().clone())
    }

    pub fn record(&self, feed: &str, entry: CacheEntry) {
        match self.values.entry(feed.to_string()) {
            Entry::Occupied(mut occupied) => {
                if entry.fetched_at >= occupied.get().fetched_at {
                    occupied.insert(entry);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SentimentReading;
    use std::borrow::Cow;

    fn entry_at(fetched_at: DateTime<Utc>, value: u8) -> CacheEntry {
        CacheEntry::new(
            MarketPayload::Sentiment(SentimentReading {
                value,
                classification: "Neutral".to_string(),
                timestamp: fetched_at,
            }),
            fetched_at,
            Cow::Borrowed("ALTERNATIVE_ME"),
            Provenance::Primary,
        )
    }

    #[test]
    fn test_fresh_then_stale() {
        let fetched = Utc::now();
        let entry = entry_at(fetched, 50);
        let ttl = Duration::from_secs(60);

        assert!(is_fresh(&entry, ttl, fetched));
        assert!(is_fresh(&entry, ttl, fetched + chrono::Duration::seconds(59)));
        assert!(!is_fresh(&entry, ttl, fetched + chrono::Duration::seconds(60)));
        assert!(!is_fresh(&entry, ttl, fetched + chrono::Duration::hours(5)));
    }

    #[test]
    fn test_future_fetch_time_counts_as_fresh() {
        let now = Utc::now();
        let entry = entry_at(now + chrono::Duration::seconds(10), 50);
        assert!(is_fresh(&entry, Duration::from_secs(1), now));
    }

    #[test]
    fn test_lookup_distinguishes_stale_from_missing() {
        let store = CacheStore::new();
        let key = CacheKey::from_raw("index:fear-greed");
        let now = Utc::now();

        assert_eq!(store.lookup(&key, Duration::from_secs(60), now), CacheLookup::Missing);

        store.put(key.clone(), entry_at(now - chrono::Duration::minutes(5), 40));
        match store.lookup(&key, Duration::from_secs(60), now) {
            CacheLookup::Stale(entry) => assert_eq!(entry.age(now), Duration::from_secs(300)),
            other => panic!("expected stale entry, got {:?}", other),
        }
    }

    #[test]
    fn test_put_replaces_whole_entry() {
        let store = CacheStore::new();
        let key = CacheKey::from_raw("k");
        let t0 = Utc::now();

        store.put(key.clone(), entry_at(t0, 10));
        store.put(key.clone(), entry_at(t0 + chrono::Duration::seconds(1), 20));

        assert_eq!(store.len(), 1);
        let entry = store.get(&key).unwrap();
        assert_eq!(
            entry.payload,
            entry_at(t0 + chrono::Duration::seconds(1), 20).payload
        );
    }

    #[test]
    fn test_put_ignores_older_write() {
        let store = CacheStore::new();
        let key = CacheKey::from_raw("k");
        let t0 = Utc::now();

        store.put(key.clone(), entry_at(t0, 10));
        store.put(key.clone(), entry_at(t0 - chrono::Duration::seconds(30), 99));

        assert_eq!(store.get(&key).unwrap().fetched_at, t0);
    }

    #[test]
    fn test_last_known_keeps_latest() {
        let store = LastKnownStore::new();
        let t0 = Utc::now();

        assert!(store.get("fear-greed").is_none());
        store.record("fear-greed", entry_at(t0, 30));
        store.record("fear-greed", entry_at(t0 - chrono::Duration::days(1), 80));

        assert_eq!(store.get("fear-greed").unwrap().fetched_at, t0);
    }
}
