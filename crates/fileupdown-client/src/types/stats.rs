use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Aggregate storage counters. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    #[serde(default)]
    pub total_files: u64,

    #[serde(default)]
    pub total_size_bytes: u64,

    #[serde(default)]
    pub total_size_formatted: String,

    #[serde(default)]
    pub max_file_size: u64,

    #[serde(default)]
    pub allowed_extensions: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
