use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Opaque, server-assigned identifier used in every path.
    pub file_id: String,
    pub original_filename: String,
    /// Includes the leading dot, e.g. `.pdf`.
    #[serde(default)]
    pub file_extension: String,
    pub file_size: u64,
    pub upload_date: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Database row id.
    #[serde(default)]
    pub id: Option<i64>,

    /// Name the backend stored the bytes under.
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub mime_type: Option<String>,

    #[serde(default)]
    pub download_url: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileListing {
    #[serde(default)]
    pub files: Vec<FileRecord>,

    #[serde(default)]
    pub total: u64,

    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default)]
    pub per_page: u32,

    #[serde(default)]
    pub total_pages: u32,
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedFile {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub file_id: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
