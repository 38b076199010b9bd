//! JSON API client.
//!
//! Every call runs the same pipeline:
//!
//! 1. Build the URL from the base URL, path and non-null query parameters.
//! 2. Serve fresh cached GET responses without touching the network.
//! 3. Merge default and per-call headers, then run request interceptors.
//! 4. Send under the effective timeout and run response interceptors.
//! 5. Parse the payload (JSON by content type, else text), record statistics
//!    and announce the attempt on the event bus.
//! 6. On failure, retry after a fixed delay while the budget and
//!    [`RetryPolicy`] allow.
//!
//! Mutations never invalidate cached reads. Pass `cache(false)` to read
//! through after a write.

mod cache;
mod client;
mod config;
mod error;
mod interceptor;
mod request;
mod retry;
mod stats;

pub use cache::{DEFAULT_MAX_ENTRIES, ResponseCache, cache_key};
pub use client::ApiClient;
pub use config::{ApiConfig, DEFAULT_BASE_URL, DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT};
pub use error::ApiError;
pub use interceptor::{
    CSRF_HEADER, RequestInterceptor, ResponseInterceptor, csrf_header, debug_request_logger,
    debug_response_logger,
};
pub use request::{Payload, RequestOptions, RequestParts, ResponseParts, build_url};
pub use reqwest::Method;
pub use retry::{
    DEFAULT_RETRY_DELAY, RetryPolicy, SHOULD_RETRY_HEADER, is_retryable_status, is_transient,
    should_retry_header,
};
pub use stats::ApiStats;
