//! Headless controllers for the three screens and the tab shell.
//!
//! Panels never talk to each other. Uploads and deletes invalidate the
//! shared [`QueryCache`], and readers refetch on their next load.

pub mod file_list;
pub mod stats;
pub mod upload;

use crate::cache::QueryCache;
use crate::client::FileManager;
use crate::notify::Notifier;
use std::sync::Arc;

pub use file_list::{Confirm, FileListPanel};
pub use stats::{RefreshHandle, StatsPanel, StatsView, STATS_REFRESH_INTERVAL};
pub use upload::{UploadBatch, UploadOptions, UploadPanel, UploadStatus, UploadTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Upload,
    Files,
    Stats,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Upload, Tab::Files, Tab::Stats];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Upload => "Upload",
            Tab::Files => "Files",
            Tab::Stats => "Stats",
        }
    }
}

pub struct Shell {
    active: Tab,
    pub upload: UploadPanel,
    pub files: FileListPanel,
    pub stats: StatsPanel,
}

impl Shell {
    /// Wires all panels to one client and one cache.
    pub fn new(client: &FileManager, notifier: Arc<dyn Notifier>, options: UploadOptions) -> Self {
        let cache = QueryCache::new();
        Self {
            active: Tab::default(),
            upload: UploadPanel::new(
                client.files.clone(),
                cache.clone(),
                notifier.clone(),
                options,
            ),
            files: FileListPanel::new(client.files.clone(), cache.clone(), notifier),
            stats: StatsPanel::new(client.stats.clone(), cache),
        }
    }

    pub fn active(&self) -> Tab {
        self.active
    }

    pub fn select(&mut self, tab: Tab) {
        self.active = tab;
    }
}
