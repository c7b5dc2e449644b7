//! Request coalescing.
//!
//! At most one upstream fetch per cache key runs at a time. The first caller
//! becomes the leader and runs the pipeline; later callers subscribe to the
//! leader's broadcast and receive the same result.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use tokio::sync::broadcast;

use crate::errors::MarketDataError;
use crate::models::{CacheKey, ProxyResponse};

pub(crate) type SharedOutcome = Result<ProxyResponse, MarketDataError>;

/// Role assigned to a caller for a key.
pub(crate) enum Join<'a> {
    Leader(LeaderGuard<'a>),
    Follower(broadcast::Receiver<SharedOutcome>),
}

#[derive(Default)]
pub(crate) struct InFlight {
    fetches: DashMap<CacheKey, broadcast::Sender<SharedOutcome>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, key: &CacheKey) -> Join<'_> {
        match self.fetches.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                debug!("Coalescing request for '{}' onto in-flight fetch", key);
                Join::Follower(occupied.get().subscribe())
            }
            Entry::Vacant(vacant) => {
                let (sender, _) = broadcast::channel(1);
                vacant.insert(sender.clone());
                Join::Leader(LeaderGuard {
                    owner: self,
                    key: key.clone(),
                    sender,
                    published: false,
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fetches.len()
    }

    fn release(&self, key: &CacheKey, sender: &broadcast::Sender<SharedOutcome>) {
        self.fetches
            .remove_if(key, |_, current| current.same_channel(sender));
    }
}

/// Held by the caller running the fetch for a key.
///
/// Dropping the guard without publishing (cancelled caller, panic) releases
/// the key; waiting followers see the channel close and retry on their own.
pub(crate) struct LeaderGuard<'a> {
    owner: &'a InFlight,
    key: CacheKey,
    sender: broadcast::Sender<SharedOutcome>,
    published: bool,
}

impl LeaderGuard<'_> {
    /// Release the key and hand `outcome` to every follower.
    ///
    /// The key is released before sending, so a caller arriving after this
    /// point starts fresh (and finds the cache already written).
    pub fn publish(mut self, outcome: SharedOutcome) {
        self.owner.release(&self.key, &self.sender);
        self.published = true;
        let followers = self.sender.send(outcome).unwrap_or(0);
        if followers > 0 {
            debug!("Shared result for '{}' with {} follower(s)", self.key, followers);
        }
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.owner.release(&self.key, &self.sender);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketPayload, Provenance, SentimentReading};
    use chrono::Utc;

    fn response() -> ProxyResponse {
        ProxyResponse {
            data: MarketPayload::Sentiment(SentimentReading {
                value: 50,
                classification: "Neutral".to_string(),
                timestamp: Utc::now(),
            }),
            stale: false,
            synthetic: false,
            provenance: Provenance::Primary,
            fetched_at: Utc::now(),
            retry_after_seconds: None,
        }
    }

    #[tokio::test]
    async fn test_follower_receives_leader_result() {
        let inflight = InFlight::new();
        let key = CacheKey::from_raw("index:fear-greed");

        let Join::Leader(guard) = inflight.join(&key) else {
            panic!("first caller must lead");
        };
        let Join::Follower(mut rx) = inflight.join(&key) else {
            panic!("second caller must follow");
        };
        assert_eq!(inflight.len(), 1);

        guard.publish(Ok(response()));
        assert_eq!(inflight.len(), 0);
        assert!(rx.recv().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_dropped_leader_closes_channel() {
        let inflight = InFlight::new();
        let key = CacheKey::from_raw("k");

        let guard = match inflight.join(&key) {
            Join::Leader(guard) => guard,
            Join::Follower(_) => panic!("first caller must lead"),
        };
        let mut rx = match inflight.join(&key) {
            Join::Follower(rx) => rx,
            Join::Leader(_) => panic!("second caller must follow"),
        };

        drop(guard);
        assert!(rx.recv().await.is_err());
        assert!(matches!(inflight.join(&key), Join::Leader(_)));
    }

    #[test]
    fn test_unrelated_keys_do_not_coalesce() {
        let inflight = InFlight::new();
        let _a = inflight.join(&CacheKey::from_raw("a"));
        assert!(matches!(inflight.join(&CacheKey::from_raw("b")), Join::Leader(_)));
        assert_eq!(inflight.len(), 2);
    }
}
