use crate::cache::{keys, QueryCache, QueryKey};
use crate::error::Error;
use crate::format::format_size;
use crate::resources::stats::Stats;
use crate::types::stats::StorageStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const STATS_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Everything the stats screen renders, derived from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsView {
    pub total_files: u64,
    pub total_size_bytes: u64,
    pub total_size_formatted: String,
    pub max_file_size: u64,
    pub max_file_size_formatted: String,
    pub allowed_extensions: Vec<String>,
}

impl StatsView {
    pub fn from_stats(stats: &StorageStats) -> Self {
        Self {
            total_files: stats.total_files,
            total_size_bytes: stats.total_size_bytes,
            total_size_formatted: stats.total_size_formatted.clone(),
            max_file_size: stats.max_file_size,
            max_file_size_formatted: format_size(stats.max_file_size),
            allowed_extensions: stats.allowed_extensions.clone(),
        }
    }

    pub fn extension_count(&self) -> usize {
        self.allowed_extensions.len()
    }
}

#[derive(Clone)]
pub struct StatsPanel {
    stats: Stats,
    cache: QueryCache,
}

impl StatsPanel {
    pub fn new(stats: Stats, cache: QueryCache) -> Self {
        Self { stats, cache }
    }

    /// Cached snapshot if fresh, otherwise a new fetch.
    pub async fn load(&self) -> Result<Arc<StorageStats>, Error> {
        let stats = self.stats.clone();
        self.cache
            .fetch(QueryKey::Stats, || async move { stats.get().await })
            .await
    }

    /// Always fetches.
    pub async fn refresh(&self) -> Result<Arc<StorageStats>, Error> {
        let stats = self.stats.clone();
        self.cache
            .refetch(QueryKey::Stats, || async move { stats.get().await })
            .await
    }

    /// Latest snapshot, however old.
    pub fn snapshot(&self) -> Option<Arc<StorageStats>> {
        self.cache.peek(&QueryKey::Stats)
    }

    pub fn view(&self) -> Option<StatsView> {
        self.snapshot().map(|s| StatsView::from_stats(&s))
    }

    /// Refetches every `interval` and whenever the stats scope is
    /// invalidated, until the handle is stopped or dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_refresher(&self, interval: Duration) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let panel = self.clone();
        let mut events = self.cache.subscribe();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                    event = events.recv() => match event {
                        Ok(inv) if inv.scope == keys::STATS => {}
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "stats refresher lagged behind invalidations");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }

                if let Err(err) = panel.refresh().await {
                    warn!(error = %err, "stats refresh failed");
                }
            }
        });

        RefreshHandle { cancel, task }
    }
}

pub struct RefreshHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Err(err) = (&mut self.task).await {
            warn!(error = %err, "stats refresher panicked");
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
