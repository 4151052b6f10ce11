//! Shared response cache keyed by query.
//!
//! Reads populate the cache; only successful mutations invalidate it. An
//! invalidation marks every entry in a scope stale and is broadcast to
//! subscribers so that live views can refetch.

use crate::error::Error;
use crate::pagination::ListParams;
use crate::types::files::FileListing;
use crate::types::stats::StorageStats;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Scope names. Upload/delete code and read code both go through these.
pub mod keys {
    pub const LISTING: &str = "files";
    pub const STATS: &str = "stats";
}

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Listing(ListParams),
    Stats,
}

impl QueryKey {
    pub fn listing(page: u32, per_page: u32) -> Self {
        Self::Listing(ListParams::new(page, per_page))
    }

    pub fn scope(&self) -> &'static str {
        match self {
            Self::Listing(_) => keys::LISTING,
            Self::Stats => keys::STATS,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Listing(Arc<FileListing>),
    Stats(Arc<StorageStats>),
}

/// Types that can live in the cache.
pub trait Cacheable: Sized {
    fn into_cached(value: Arc<Self>) -> CachedValue;
    fn from_cached(value: &CachedValue) -> Option<Arc<Self>>;
}

impl Cacheable for FileListing {
    fn into_cached(value: Arc<Self>) -> CachedValue {
        CachedValue::Listing(value)
    }

    fn from_cached(value: &CachedValue) -> Option<Arc<Self>> {
        match value {
            CachedValue::Listing(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl Cacheable for StorageStats {
    fn into_cached(value: Arc<Self>) -> CachedValue {
        CachedValue::Stats(value)
    }

    fn from_cached(value: &CachedValue) -> Option<Arc<Self>> {
        match value {
            CachedValue::Stats(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Published whenever a scope is invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub scope: &'static str,
}

struct Entry {
    value: CachedValue,
    stale: bool,
}

#[derive(Default)]
struct State {
    entries: HashMap<QueryKey, Entry>,
    /// Bumped on every invalidation of a scope.
    generations: HashMap<&'static str, u64>,
}

impl State {
    fn generation(&self, scope: &str) -> u64 {
        self.generations.get(scope).copied().unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct QueryCache {
    state: Arc<Mutex<State>>,
    events: broadcast::Sender<Invalidation>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            events,
        }
    }

    /// Returns the cached value for `key` if it is fresh, otherwise runs
    /// `fetcher` and stores its result. Errors are not cached.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Arc<T>, Error>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        {
            let state = self.state.lock();
            if let Some(entry) = state.entries.get(&key) {
                if !entry.stale {
                    if let Some(value) = T::from_cached(&entry.value) {
                        debug!(?key, "cache hit");
                        return Ok(value);
                    }
                }
            }
        }
        self.refetch(key, fetcher).await
    }

    /// Always runs `fetcher`, replacing whatever is cached for `key`.
    pub async fn refetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Arc<T>, Error>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let started_at = self.state.lock().generation(key.scope());
        debug!(?key, "fetching");
        let value = Arc::new(fetcher().await?);

        let mut state = self.state.lock();
        // invalidated while in flight: keep the data but do not trust it
        let stale = state.generation(key.scope()) != started_at;
        state.entries.insert(
            key,
            Entry {
                value: T::into_cached(value.clone()),
                stale,
            },
        );
        Ok(value)
    }

    /// Last stored value for `key`, fresh or not.
    pub fn peek<T: Cacheable>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let state = self.state.lock();
        state
            .entries
            .get(key)
            .and_then(|entry| T::from_cached(&entry.value))
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        let state = self.state.lock();
        state.entries.get(key).map(|e| e.stale).unwrap_or(true)
    }

    /// Marks every entry under `scope` stale and notifies subscribers.
    pub fn invalidate(&self, scope: &'static str) {
        {
            let mut state = self.state.lock();
            *state.generations.entry(scope).or_insert(0) += 1;
            for (key, entry) in state.entries.iter_mut() {
                if key.scope() == scope {
                    entry.stale = true;
                }
            }
        }
        debug!(scope, "cache invalidated");
        // no receivers is fine
        let _ = self.events.send(Invalidation { scope });
    }

    /// Called after every successful upload or delete.
    pub fn invalidate_after_mutation(&self) {
        self.invalidate(keys::LISTING);
        self.invalidate(keys::STATS);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.events.subscribe()
    }
}
