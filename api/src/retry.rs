//! Retry policy.
//!
//! Retries are fixed-delay and bounded by the per-call `retry` count. What
//! differs between policies is which failures qualify:
//!
//! - [`RetryPolicy::Uniform`] (default): every failure is retried, a 400 exactly
//!   like a timeout.
//! - [`RetryPolicy::Classified`]: only transient failures are retried:
//!   - connection errors and timeouts
//!   - HTTP 408, 409, 429, 500, 502, 503, 504, 520-599
//!
//!   An `x-should-retry: true|false` response header overrides the status
//!   classification.

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::error::ApiError;

pub const SHOULD_RETRY_HEADER: &str = "x-should-retry";

/// Delay between attempts when none is configured.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicy {
    #[default]
    Uniform,
    Classified,
}

impl RetryPolicy {
    /// Whether `error` may be retried under this policy (budget permitting).
    #[must_use]
    pub fn allows(self, error: &ApiError) -> bool {
        match self {
            Self::Uniform => true,
            Self::Classified => is_transient(error),
        }
    }
}

/// Determine if a failure is worth repeating.
#[must_use]
pub fn is_transient(error: &ApiError) -> bool {
    match error {
        ApiError::Network { .. } | ApiError::Timeout { .. } => true,
        ApiError::Http {
            status,
            should_retry,
            ..
        } => should_retry.unwrap_or_else(|| is_retryable_status(*status)),
        ApiError::InvalidUrl { .. } | ApiError::Decode { .. } => false,
    }
}

/// Statuses that usually clear up on their own.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 429 | 500 | 502 | 503 | 504 | 520..=599)
}

/// Server override from the `x-should-retry` header, if present and valid.
#[must_use]
pub fn should_retry_header(headers: &HeaderMap) -> Option<bool> {
    let value = headers.get(SHOULD_RETRY_HEADER)?.to_str().ok()?;
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn http(status: u16) -> ApiError {
        ApiError::Http {
            status,
            body: Value::Null,
            url: "http://localhost/x".into(),
            should_retry: None,
        }
    }

    fn overridden(status: u16, should_retry: bool) -> ApiError {
        ApiError::Http {
            status,
            body: Value::Null,
            url: "http://localhost/x".into(),
            should_retry: Some(should_retry),
        }
    }

    #[test]
    fn uniform_retries_everything() {
        let policy = RetryPolicy::default();
        assert!(policy.allows(&http(400)));
        assert!(policy.allows(&http(404)));
        assert!(policy.allows(&ApiError::Decode {
            url: String::new(),
            message: String::new(),
        }));
    }

    #[test]
    fn classified_retries_transient_statuses_only() {
        let policy = RetryPolicy::Classified;
        assert!(policy.allows(&http(429)));
        assert!(policy.allows(&http(500)));
        assert!(policy.allows(&http(503)));
        assert!(policy.allows(&http(408)));

        assert!(!policy.allows(&http(400)));
        assert!(!policy.allows(&http(401)));
        assert!(!policy.allows(&http(404)));
    }

    #[test]
    fn classified_retries_transport_failures() {
        let policy = RetryPolicy::Classified;
        assert!(policy.allows(&ApiError::Timeout {
            url: String::new(),
            timeout: Duration::from_millis(10),
        }));
        assert!(policy.allows(&ApiError::Network {
            url: String::new(),
            message: "connection refused".into(),
        }));
        assert!(!policy.allows(&ApiError::InvalidUrl {
            url: String::new(),
            message: String::new(),
        }));
    }

    #[test]
    fn server_header_overrides_classification() {
        let policy = RetryPolicy::Classified;
        let forced = overridden(404, true);
        let forbidden = overridden(503, false);
        assert!(policy.allows(&forced));
        assert!(!policy.allows(&forbidden));
        assert!(RetryPolicy::Uniform.allows(&forbidden));
    }

    #[test]
    fn should_retry_header_parses_booleans_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(should_retry_header(&headers), None);
        headers.insert(SHOULD_RETRY_HEADER, "TRUE".parse().unwrap());
        assert_eq!(should_retry_header(&headers), Some(true));
        headers.insert(SHOULD_RETRY_HEADER, "false".parse().unwrap());
        assert_eq!(should_retry_header(&headers), Some(false));
        headers.insert(SHOULD_RETRY_HEADER, "maybe".parse().unwrap());
        assert_eq!(should_retry_header(&headers), None);
    }
}
