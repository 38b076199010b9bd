//! Request/response hooks and the built-in ones.

use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};

use crate::request::{RequestParts, ResponseParts};

/// Runs against every outgoing request, in registration order.
pub type RequestInterceptor = Arc<dyn Fn(&mut RequestParts) + Send + Sync>;

/// Runs against every response head, in registration order.
pub type ResponseInterceptor = Arc<dyn Fn(&ResponseParts) + Send + Sync>;

/// Header carrying the anti-forgery token on mutating requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Attach `token` to POST/PUT/PATCH/DELETE requests.
///
/// Returns `None` if the token is not a valid header value.
#[must_use]
pub fn csrf_header(token: &str) -> Option<RequestInterceptor> {
    let value = match HeaderValue::from_str(token) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("CSRF token is not a valid header value; ignoring it");
            return None;
        }
    };
    let name = HeaderName::from_static(CSRF_HEADER);
    Some(Arc::new(move |parts: &mut RequestParts| {
        if parts.is_mutating() {
            parts.headers.insert(name.clone(), value.clone());
        }
    }))
}

#[must_use]
pub fn debug_request_logger() -> RequestInterceptor {
    Arc::new(|parts: &mut RequestParts| {
        tracing::debug!(
            method = %parts.method,
            url = %parts.url,
            timeout_ms = parts.timeout.as_millis() as u64,
            has_body = parts.body.is_some(),
            "API request"
        );
    })
}

#[must_use]
pub fn debug_response_logger() -> ResponseInterceptor {
    Arc::new(|parts: &ResponseParts| {
        tracing::debug!(
            method = %parts.method,
            url = %parts.url,
            status = parts.status.as_u16(),
            elapsed_ms = parts.elapsed.as_millis() as u64,
            "API response"
        );
    })
}
