//! The `error` module defines the error types used within `classlink`.
//!
//! Every transport failure, whatever its origin (reqwest, an HTTP status with
//! a JSON body, a WebSocket handshake), is normalized into an [`ApiError`] or
//! one of the [`ClientError`] variants so callers deal with a single shape.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Normalized transport failure with an optional HTTP status and a
/// user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    /// A failure that never produced an HTTP response.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Build an error from a non-success response. The message comes from the
    /// body's `message`, `error` or `detail` field when the body is JSON and
    /// carries one, otherwise from the status.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = message_from_body(body).unwrap_or_else(|| default_message(status));
        Self {
            status: Some(status),
            message,
        }
    }

    /// Server-side failures, throttling and network errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self.status {
            None => true,
            Some(status) => status >= 500 || status == 429,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        let status = error.status().map(|s| s.as_u16());
        let message = if error.is_timeout() {
            "The request timed out.".to_string()
        } else if error.is_connect() {
            "Could not reach the server.".to_string()
        } else if error.is_decode() {
            format!("The server response was malformed: {error}")
        } else if let Some(status) = status {
            default_message(status)
        } else {
            format!("Request failed: {error}")
        };
        Self { status, message }
    }
}

fn message_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .filter_map(|field| value.get(field).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

fn default_message(status: u16) -> String {
    match status {
        400 => "The request was invalid.".to_string(),
        401 => "Your session has expired. Please sign in again.".to_string(),
        403 => "You do not have permission to do that.".to_string(),
        404 => "The requested resource was not found.".to_string(),
        409 => "The resource was changed by someone else.".to_string(),
        429 => "Too many requests. Please try again later.".to_string(),
        s if s >= 500 => "The server encountered an error. Please try again.".to_string(),
        s => format!("Request failed with status {s}."),
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("unauthorized: the stored session was cleared")]
    Unauthorized,
    #[error("realtime error: {0}")]
    Realtime(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid topic: {0}")]
    Topic(String),
    #[error("invalid comment key: {0}")]
    Key(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Api(api) => api.is_retryable(),
            ClientError::Realtime(_) => true,
            _ => false,
        }
    }

    /// HTTP status of the underlying failure, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api(api) => api.status,
            ClientError::Unauthorized => Some(401),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        ClientError::Api(ApiError::from(error))
    }
}

impl From<sled::Error> for ClientError {
    fn from(error: sled::Error) -> Self {
        ClientError::Storage(error.to_string())
    }
}

impl From<tungstenite::Error> for ClientError {
    fn from(error: tungstenite::Error) -> Self {
        ClientError::Realtime(error.to_string())
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(error: config::ConfigError) -> Self {
        ClientError::Config(error.to_string())
    }
}
