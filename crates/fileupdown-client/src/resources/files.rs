use crate::client::{ApiResponse, Inner};
use crate::error::Error;
use crate::pagination::ListParams;
use crate::types::files::{DeletedFile, FileListing, FileRecord};
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_DISPOSITION};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, Url};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone)]
pub struct Files {
    inner: Arc<Inner>,
}

impl Files {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub(crate) fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// `prefix` followed by `file_id` as a single percent-encoded segment.
    fn file_path(&self, prefix: &str, file_id: &str) -> Result<String, Error> {
        let mut url = self.inner.build_url(prefix)?;
        url.path_segments_mut()
            .map_err(|_| Error::Internal(format!("base url cannot take path segments: {prefix}")))?
            .push(file_id);
        Ok(url.path().to_string())
    }

    pub async fn list(&self, params: Option<ListParams>) -> Result<FileListing, Error> {
        Ok(self.list_with_response(params).await?.data)
    }

    pub async fn list_with_response(
        &self,
        params: Option<ListParams>,
    ) -> Result<ApiResponse<FileListing>, Error> {
        let params = params.unwrap_or_default();
        if params.page == 0 || params.per_page == 0 {
            return Err(Error::Internal(format!(
                "page and per_page must be positive, got page={} per_page={}",
                params.page, params.per_page
            )));
        }

        self.inner
            .request_json(
                Method::GET,
                "/api/v1/files",
                Some(params.to_query()),
                Option::<&()>::None,
            )
            .await
    }

    pub async fn retrieve(&self, file_id: &str) -> Result<FileRecord, Error> {
        Ok(self.retrieve_with_response(file_id).await?.data)
    }

    pub async fn retrieve_with_response(
        &self,
        file_id: &str,
    ) -> Result<ApiResponse<FileRecord>, Error> {
        self.inner
            .request_json(
                Method::GET,
                &self.file_path("/api/v1/files", file_id)?,
                None,
                Option::<&()>::None,
            )
            .await
    }

    pub async fn delete(&self, file_id: &str) -> Result<DeletedFile, Error> {
        Ok(self.delete_with_response(file_id).await?.data)
    }

    pub async fn delete_with_response(
        &self,
        file_id: &str,
    ) -> Result<ApiResponse<DeletedFile>, Error> {
        let resp = self
            .inner
            .request_json(
                Method::DELETE,
                &self.file_path("/api/v1/files", file_id)?,
                None,
                Option::<&()>::None,
            )
            .await?;
        info!(file_id, "file deleted");
        Ok(resp)
    }

    pub async fn download(&self, file_id: &str) -> Result<Bytes, Error> {
        Ok(self.download_with_response(file_id).await?.data)
    }

    pub async fn download_with_response(&self, file_id: &str) -> Result<ApiResponse<Bytes>, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

        let resp = self
            .inner
            .request_raw(
                Method::GET,
                &self.file_path("/api/v1/download", file_id)?,
                None,
                Option::<&()>::None,
                headers,
            )
            .await?;
        debug!(file_id, len = resp.data.len(), "download finished");
        Ok(resp)
    }

    /// Downloads content together with the name it should be saved under.
    ///
    /// `filename` is normally the record's original filename. Without one the
    /// server's `Content-Disposition` is consulted, then the id itself.
    pub async fn download_file(
        &self,
        file_id: &str,
        filename: Option<&str>,
    ) -> Result<Download, Error> {
        let resp = self.download_with_response(file_id).await?;
        let filename = filename
            .map(|s| s.to_string())
            .or_else(|| disposition_filename(&resp.headers))
            .unwrap_or_else(|| file_id.to_string());
        Ok(Download {
            filename,
            bytes: resp.data,
        })
    }

    pub async fn upload(&self, params: UploadParams) -> Result<FileRecord, Error> {
        Ok(self.upload_with_response(params, |_| {}).await?.data)
    }

    /// Uploads and reports send progress as a percentage.
    ///
    /// Progress tops out at 99 while the request is in flight; the caller
    /// decides when a settled upload counts as complete.
    pub async fn upload_with_progress<P>(
        &self,
        params: UploadParams,
        on_progress: P,
    ) -> Result<FileRecord, Error>
    where
        P: Fn(u8) + Send + Sync + 'static,
    {
        Ok(self.upload_with_response(params, on_progress).await?.data)
    }

    pub async fn upload_with_response<P>(
        &self,
        params: UploadParams,
        on_progress: P,
    ) -> Result<ApiResponse<FileRecord>, Error>
    where
        P: Fn(u8) + Send + Sync + 'static,
    {
        let file = params.file;
        let data = file.read().await?;
        let total = data.len() as u64;

        let sent = Arc::new(AtomicU64::new(0));
        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
            .collect();
        let stream = futures_util::stream::iter(chunks).map(move |chunk| {
            let so_far = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            if total > 0 {
                on_progress(((so_far * 100) / total).min(99) as u8);
            }
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let mut part =
            Part::stream_with_length(Body::wrap_stream(stream), total).file_name(file.name.clone());
        if let Some(mime) = &file.mime_type {
            part = part
                .mime_str(mime)
                .map_err(|e| Error::Internal(e.to_string()))?;
        }

        let mut form = Form::new().part("file", part);
        if let Some(description) = params.description.filter(|d| !d.is_empty()) {
            form = form.text("description", description);
        }

        debug!(filename = %file.name, size = total, "uploading file");
        let resp = self
            .inner
            .request_multipart_json::<FileRecord>(Method::POST, "/api/v1/upload", form)
            .await?;
        info!(file_id = %resp.data.file_id, filename = %file.name, "upload complete");
        Ok(resp)
    }
}

#[derive(Debug, Clone)]
pub struct UploadParams {
    pub file: UploadFile,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Memory(Bytes),
}

/// A file selected for upload.
///
/// Path-backed files are only read when the upload starts, so their size
/// can be checked without touching the content.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    size: u64,
    mime_type: Option<String>,
    source: Source,
}

impl UploadFile {
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            Error::Internal(format!("failed to stat file '{}': {e}", path.display()))
        })?;
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Ok(Self {
            name,
            size: meta.len(),
            mime_type: None,
            source: Source::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            mime_type: None,
            source: Source::Memory(bytes),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    async fn read(&self) -> Result<Bytes, Error> {
        match &self.source {
            Source::Memory(bytes) => Ok(bytes.clone()),
            Source::Path(path) => tokio::fs::read(path).await.map(Bytes::from).map_err(|e| {
                Error::Internal(format!("failed to read file '{}': {e}", path.display()))
            }),
        }
    }
}

/// Downloaded content and the name it should be saved under.
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub bytes: Bytes,
}

impl Download {
    /// Writes the content into `dir`, named after the suggested filename.
    /// Directory components in the name are ignored. An existing file is
    /// never overwritten: the name gets a ` (n)` suffix instead, e.g.
    /// `report (1).pdf`.
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let name = Path::new(&self.filename)
            .file_name()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::Internal(format!("unusable filename '{}'", self.filename)))?;
        let dir = dir.as_ref();

        for attempt in 0..MAX_SAVE_ATTEMPTS {
            let target = dir.join(numbered_name(Path::new(name), attempt));
            let open = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .await;
            match open {
                Ok(mut file) => {
                    file.write_all(&self.bytes).await?;
                    file.flush().await?;
                    return Ok(target);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(Error::Internal(format!(
            "no free name for '{}' in '{}'",
            self.filename,
            dir.display()
        )))
    }
}

const MAX_SAVE_ATTEMPTS: u32 = 1000;

fn numbered_name(name: &Path, n: u32) -> OsString {
    if n == 0 {
        return name.as_os_str().to_os_string();
    }
    let stem = name.file_stem().unwrap_or(name.as_os_str());
    let mut out = stem.to_os_string();
    out.push(format!(" ({n})"));
    if let Some(ext) = name.extension() {
        out.push(".");
        out.push(ext);
    }
    out
}

fn disposition_filename(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    value.split(';').map(str::trim).find_map(|param| {
        let name = param.strip_prefix("filename=")?;
        let name = name.trim_matches('"');
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    })
}
