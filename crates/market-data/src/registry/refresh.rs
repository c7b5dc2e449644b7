//! Deferred refresh scheduling.
//!
//! An interactive caller that was denied by the rate limiter gets stale data
//! right away; the refresh it could not trigger is scheduled for when the
//! limiter will admit it. At most one pending refresh exists per key.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use tokio::task::JoinHandle;

use crate::models::CacheKey;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct RefreshScheduler {
    pending: Arc<DashMap<CacheKey, Pending>>,
    generation: AtomicU64,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, replacing any refresh already pending for `key`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&self, key: CacheKey, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let task_key = key.clone();
        let spawn = move || {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                task.await;
                pending.remove_if(&task_key, |_, p| p.generation == generation);
            })
        };

        debug!("Deferred refresh for '{}' in {:?}", key, delay);
        // Spawn under the entry lock so a finished task cannot miss its own entry.
        match self.pending.entry(key) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(Pending {
                    generation,
                    handle: spawn(),
                });
                previous.handle.abort();
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Pending {
                    generation,
                    handle: spawn(),
                });
            }
        }
    }

    /// Abort the pending refresh for `key`, if any.
    pub fn cancel(&self, key: &CacheKey) -> bool {
        match self.pending.remove(key) {
            Some((_, p)) => {
                p.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every pending refresh.
    pub fn cancel_all(&self) {
        let keys: Vec<CacheKey> = self.pending.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            self.cancel(&key);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
