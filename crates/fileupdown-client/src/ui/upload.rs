use crate::cache::QueryCache;
use crate::error::Error;
use crate::notify::{Notification, Notifier};
use crate::resources::files::{Files, UploadFile, UploadParams};
use crate::types::files::FileRecord;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Larger files are rejected before any request is made.
    pub max_file_size: u64,
    /// `None` starts every accepted file immediately.
    pub max_concurrent: Option<usize>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            max_file_size: MAX_UPLOAD_SIZE,
            max_concurrent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Uploading,
    Completed,
    Error,
}

impl UploadStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Uploading => "Uploading...",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadTask {
    pub id: TaskId,
    pub filename: String,
    pub size: u64,
    /// 0..=100
    pub progress: u8,
    pub status: UploadStatus,
    pub error: Option<String>,
    pub record: Option<FileRecord>,
}

#[derive(Debug, Clone)]
pub struct RejectedFile {
    pub filename: String,
    pub size: u64,
    pub message: String,
}

/// Result of one drop. Uploads keep running whether or not it is joined.
#[derive(Debug)]
pub struct UploadBatch {
    pub accepted: Vec<TaskId>,
    pub rejected: Vec<RejectedFile>,
    handles: Vec<JoinHandle<()>>,
}

impl UploadBatch {
    /// Waits until every upload of this batch has settled.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "upload task panicked");
            }
        }
    }
}

struct Shared {
    files: Files,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    tasks: Mutex<Vec<UploadTask>>,
    limiter: Option<Arc<Semaphore>>,
}

impl Shared {
    fn update<F: FnOnce(&mut UploadTask)>(&self, id: TaskId, f: F) {
        let mut tasks = self.tasks.lock();
        // the row may have been removed; the upload still runs to the end
        if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
            f(task);
        }
    }
}

pub struct UploadPanel {
    shared: Arc<Shared>,
    options: UploadOptions,
    description: String,
    next_id: AtomicU64,
}

impl UploadPanel {
    pub fn new(
        files: Files,
        cache: QueryCache,
        notifier: Arc<dyn Notifier>,
        options: UploadOptions,
    ) -> Self {
        let limiter = options
            .max_concurrent
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        Self {
            shared: Arc::new(Shared {
                files,
                cache,
                notifier,
                tasks: Mutex::new(Vec::new()),
                limiter,
            }),
            options,
            description: String::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Applies to every file of the next drop.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Accepts a batch of files and starts one upload per accepted file.
    ///
    /// Must be called from within a tokio runtime.
    pub fn drop_files(&self, files: Vec<UploadFile>) -> UploadBatch {
        let description = Some(self.description.clone()).filter(|d| !d.is_empty());
        let mut batch = UploadBatch {
            accepted: Vec::new(),
            rejected: Vec::new(),
            handles: Vec::new(),
        };

        for file in files {
            if file.size() > self.options.max_file_size {
                let err = Error::FileTooLarge {
                    filename: file.name().to_string(),
                    size: file.size(),
                    limit: self.options.max_file_size,
                };
                warn!(filename = file.name(), size = file.size(), "rejected oversized file");
                let message = err.user_message();
                self.shared.notifier.notify(Notification::error(format!(
                    "Failed to upload \"{}\": {message}",
                    file.name()
                )));
                batch.rejected.push(RejectedFile {
                    filename: file.name().to_string(),
                    size: file.size(),
                    message,
                });
                continue;
            }

            let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
            self.shared.tasks.lock().push(UploadTask {
                id,
                filename: file.name().to_string(),
                size: file.size(),
                progress: 0,
                status: UploadStatus::Uploading,
                error: None,
                record: None,
            });

            let params = UploadParams {
                file,
                description: description.clone(),
            };
            batch.accepted.push(id);
            batch
                .handles
                .push(tokio::spawn(run_upload(self.shared.clone(), id, params)));
        }

        batch
    }

    pub fn tasks(&self) -> Vec<UploadTask> {
        self.shared.tasks.lock().clone()
    }

    pub fn task(&self, id: TaskId) -> Option<UploadTask> {
        self.shared.tasks.lock().iter().find(|t| t.id == id).cloned()
    }

    /// Hides a row. An upload still in flight is not cancelled.
    pub fn remove_task(&self, id: TaskId) -> bool {
        let mut tasks = self.shared.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        tasks.len() != before
    }

    /// Drops every settled row, successful or failed.
    pub fn clear_completed(&self) {
        self.shared
            .tasks
            .lock()
            .retain(|t| t.status == UploadStatus::Uploading);
    }
}

async fn run_upload(shared: Arc<Shared>, id: TaskId, params: UploadParams) {
    let _permit = match &shared.limiter {
        Some(limiter) => limiter.clone().acquire_owned().await.ok(),
        None => None,
    };

    let filename = params.file.name().to_string();
    let progress = shared.clone();
    let result = shared
        .files
        .upload_with_progress(params, move |pct| {
            progress.update(id, |task| {
                if task.status == UploadStatus::Uploading && pct > task.progress {
                    task.progress = pct;
                }
            })
        })
        .await;

    match result {
        Ok(record) => {
            debug!(?id, file_id = %record.file_id, "upload settled");
            shared.update(id, |task| {
                task.status = UploadStatus::Completed;
                task.progress = 100;
                task.record = Some(record);
            });
            shared.notifier.notify(Notification::success(format!(
                "File \"{filename}\" uploaded successfully!"
            )));
            shared.cache.invalidate_after_mutation();
        }
        Err(err) => {
            let message = err.user_message();
            warn!(?id, filename = %filename, error = %err, "upload failed");
            shared.update(id, |task| {
                task.status = UploadStatus::Error;
                task.error = Some(message.clone());
            });
            shared.notifier.notify(Notification::error(format!(
                "Failed to upload \"{filename}\": {message}"
            )));
        }
    }
}
