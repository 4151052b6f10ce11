mod client;
mod error;
pub mod cache;
pub mod format;
pub mod notify;
pub mod pagination;
pub mod resources;
pub mod types;
pub mod ui;

pub use crate::client::{ApiResponse, ClientOptions, FileManager, BASE_URL_ENV, DEFAULT_TIMEOUT};
pub use crate::error::{normalize_message, ApiError, Error, HttpApiError};
