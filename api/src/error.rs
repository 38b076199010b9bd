use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Failure of a single API call (after the retry budget is spent).
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The base URL and path did not form a valid URL.
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Connection, DNS, or transport failure.
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    /// No complete response within the request timeout.
    #[error("request to {url} timed out after {}ms", timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    /// The server answered with a non-success status.
    ///
    /// `body` is the parsed error payload: JSON when the body parses, else the
    /// raw text, else the status reason phrase. `should_retry` is the
    /// server's `x-should-retry` verdict, when it sent one.
    #[error("HTTP {status} from {url}")]
    Http {
        status: u16,
        body: Value,
        url: String,
        should_retry: Option<bool>,
    },

    /// A success response claimed JSON but did not parse.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::InvalidUrl { url, .. }
            | Self::Network { url, .. }
            | Self::Timeout { url, .. }
            | Self::Http { url, .. }
            | Self::Decode { url, .. } => url,
        }
    }

    /// HTTP status, when the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Best-effort human message from an error payload (`message` or `error` field).
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        let Self::Http { body, .. } = self else {
            return None;
        };
        match body {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map
                .get("message")
                .or_else(|| map.get("error"))
                .and_then(Value::as_str),
            _ => None,
        }
    }
}
