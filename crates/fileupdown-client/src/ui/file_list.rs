use crate::cache::{QueryCache, QueryKey};
use crate::error::Error;
use crate::notify::{Notification, Notifier};
use crate::pagination::{ListParams, Pagination, DEFAULT_PER_PAGE};
use crate::resources::files::Files;
use crate::types::files::{DeletedFile, FileListing, FileRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const NO_FILES_MESSAGE: &str = "No files uploaded yet.";
pub const NO_MATCH_MESSAGE: &str = "No files match your search.";

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Case-insensitive substring match on filename or description.
pub fn filter_files<'a>(files: &'a [FileRecord], term: &str) -> Vec<&'a FileRecord> {
    let needle = term.to_lowercase();
    files
        .iter()
        .filter(|file| {
            file.original_filename.to_lowercase().contains(&needle)
                || file
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        })
        .collect()
}

pub struct FileListPanel {
    files: Files,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    page: u32,
    per_page: u32,
    search: String,
    /// What is on screen. Survives page changes and failed loads.
    displayed: Option<Arc<FileListing>>,
}

impl FileListPanel {
    pub fn new(files: Files, cache: QueryCache, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            files,
            cache,
            notifier,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: String::new(),
            displayed: None,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn listing(&self) -> Option<&FileListing> {
        self.displayed.as_deref()
    }

    /// Loads the current page, from cache when it is still fresh.
    ///
    /// On failure the previously displayed page stays in place.
    pub async fn load(&mut self) -> Result<Arc<FileListing>, Error> {
        self.load_page(self.page).await
    }

    /// Moves to `page`. The page number only changes once its listing has
    /// loaded, so a failure leaves page and listing consistent.
    pub async fn set_page(&mut self, page: u32) -> Result<Arc<FileListing>, Error> {
        self.load_page(page.max(1)).await
    }

    async fn load_page(&mut self, page: u32) -> Result<Arc<FileListing>, Error> {
        let params = ListParams::new(page, self.per_page);
        let files = self.files.clone();
        let result = self
            .cache
            .fetch(QueryKey::Listing(params), || async move {
                files.list(Some(params)).await
            })
            .await;

        match result {
            Ok(listing) => {
                self.page = page;
                self.displayed = Some(listing.clone());
                Ok(listing)
            }
            Err(err) => {
                warn!(page, error = %err, "failed to load files");
                Err(err)
            }
        }
    }

    /// Returns `false` without a request when already on the last page.
    pub async fn next_page(&mut self) -> Result<bool, Error> {
        match self.pagination() {
            Some(p) if p.has_next() => {
                self.set_page(self.page + 1).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Returns `false` without a request when already on the first page.
    pub async fn previous_page(&mut self) -> Result<bool, Error> {
        if self.page <= 1 {
            return Ok(false);
        }
        self.set_page(self.page - 1).await?;
        Ok(true)
    }

    pub fn pagination(&self) -> Option<Pagination> {
        self.displayed
            .as_deref()
            .map(|listing| Pagination::new(self.page, self.per_page, listing))
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    /// Displayed records matching the search term. Only the loaded page is
    /// searched.
    pub fn visible_files(&self) -> Vec<&FileRecord> {
        match self.displayed.as_deref() {
            Some(listing) => filter_files(&listing.files, &self.search),
            None => Vec::new(),
        }
    }

    pub fn empty_message(&self) -> Option<&'static str> {
        if !self.visible_files().is_empty() {
            return None;
        }
        if self.search.is_empty() {
            Some(NO_FILES_MESSAGE)
        } else {
            Some(NO_MATCH_MESSAGE)
        }
    }

    /// Deletes `record` after the user confirms.
    ///
    /// `Ok(None)` means the user declined and nothing was sent. Nothing is
    /// removed from the displayed page until the backend has confirmed.
    pub async fn delete(
        &mut self,
        record: &FileRecord,
        confirm: &dyn Confirm,
    ) -> Result<Option<DeletedFile>, Error> {
        let prompt = format!(
            "Are you sure you want to delete \"{}\"?",
            record.original_filename
        );
        if !confirm.confirm(&prompt) {
            debug!(file_id = %record.file_id, "delete declined");
            return Ok(None);
        }

        match self.files.delete(&record.file_id).await {
            Ok(deleted) => {
                self.notifier
                    .notify(Notification::success("File deleted successfully!"));
                self.cache.invalidate_after_mutation();
                self.reload_after_delete().await;
                Ok(Some(deleted))
            }
            Err(err) => {
                self.notifier.notify(Notification::error(format!(
                    "Failed to delete file: {}",
                    err.user_message()
                )));
                Err(err)
            }
        }
    }

    async fn reload_after_delete(&mut self) {
        match self.load().await {
            // the last record of the last page went away
            Ok(listing) if listing.total_pages > 0 && self.page > listing.total_pages => {
                let last = listing.total_pages;
                if let Err(err) = self.set_page(last).await {
                    warn!(error = %err, "failed to step back a page");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to refresh files after delete"),
        }
    }

    /// Downloads `record` into `dir` under its original filename.
    pub async fn download(&self, record: &FileRecord, dir: &Path) -> Result<PathBuf, Error> {
        let result = async {
            let download = self
                .files
                .download_file(&record.file_id, Some(&record.original_filename))
                .await?;
            download.save_to(dir).await
        }
        .await;

        match result {
            Ok(path) => {
                self.notifier
                    .notify(Notification::success("File downloaded successfully!"));
                Ok(path)
            }
            Err(err) => {
                self.notifier.notify(Notification::error(format!(
                    "Failed to download file: {}",
                    err.user_message()
                )));
                Err(err)
            }
        }
    }
}
