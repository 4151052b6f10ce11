use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub(crate) const MSG_TOO_LARGE: &str = "File too large. Please choose a smaller file.";
pub(crate) const MSG_INVALID_REQUEST: &str = "Invalid request";
pub(crate) const MSG_NOT_FOUND: &str = "File not found";
pub(crate) const MSG_SERVER_ERROR: &str = "Server error. Please try again later.";
pub(crate) const MSG_GENERIC: &str = "An error occurred";

/// Maps a failed exchange to the message shown to the user.
///
/// `status` is `None` when no response was received at all (unreachable
/// host, timeout). The result depends only on the status code and the
/// `detail` field of the response body.
pub fn normalize_message(status: Option<StatusCode>, body: Option<&Value>) -> String {
    let detail = body
        .and_then(|v| v.as_object())
        .and_then(|obj| obj.get("detail"))
        .and_then(|d| d.as_str())
        .filter(|d| !d.is_empty());

    match status.map(|s| s.as_u16()) {
        Some(413) => MSG_TOO_LARGE.to_string(),
        Some(400) => detail.unwrap_or(MSG_INVALID_REQUEST).to_string(),
        Some(404) => MSG_NOT_FOUND.to_string(),
        Some(s) if s >= 500 => MSG_SERVER_ERROR.to_string(),
        _ => detail.unwrap_or(MSG_GENERIC).to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: Option<StatusCode>,
    /// Normalized, user-facing message.
    pub message: String,
    /// `detail` as sent by the server, if any.
    pub detail: Option<String>,
    pub body: Option<Value>,
}

impl ApiError {
    pub fn new(status: Option<StatusCode>, body: Option<Value>) -> Self {
        let message = normalize_message(status, body.as_ref());
        let detail = body
            .as_ref()
            .and_then(|v| v.get("detail"))
            .and_then(|d| d.as_str())
            .map(|s| s.to_string());

        Self {
            status,
            message,
            detail,
            body,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Error)]
pub enum HttpApiError {
    #[error("400 Bad Request: {0}")]
    BadRequest(ApiError),
    #[error("404 Not Found: {0}")]
    NotFound(ApiError),
    #[error("413 Payload Too Large: {0}")]
    PayloadTooLarge(ApiError),
    #[error("422 Unprocessable Entity: {0}")]
    UnprocessableEntity(ApiError),
    #[error("5xx Internal Server Error: {0}")]
    InternalServer(ApiError),
    #[error("API Error: {0}")]
    Other(ApiError),
}

impl HttpApiError {
    pub fn from_status(status: Option<StatusCode>, err: ApiError) -> Self {
        match status.map(|s| s.as_u16()) {
            Some(400) => Self::BadRequest(err),
            Some(404) => Self::NotFound(err),
            Some(413) => Self::PayloadTooLarge(err),
            Some(422) => Self::UnprocessableEntity(err),
            Some(s) if s >= 500 => Self::InternalServer(err),
            _ => Self::Other(err),
        }
    }

    pub fn api_error(&self) -> &ApiError {
        match self {
            Self::BadRequest(e)
            | Self::NotFound(e)
            | Self::PayloadTooLarge(e)
            | Self::UnprocessableEntity(e)
            | Self::InternalServer(e)
            | Self::Other(e) => e,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.api_error().status
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] HttpApiError),

    #[error("request timed out")]
    Timeout,

    #[error("file \"{filename}\" is {size} bytes, over the {limit} byte limit")]
    FileTooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    #[error(transparent)]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The message a UI should display for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Error::Http(err) => err.api_error().message.clone(),
            Error::FileTooLarge { .. } => MSG_TOO_LARGE.to_string(),
            _ => normalize_message(None, None),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Http(HttpApiError::NotFound(_)))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http(err) => err.status(),
            _ => None,
        }
    }
}
