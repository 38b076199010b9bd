use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};

use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::retry::{DEFAULT_RETRY_DELAY, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "http://localhost/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Client-wide settings. Per-call [`RequestOptions`](crate::RequestOptions)
/// override the timeout and add headers.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Absolute URL every relative path is joined onto.
    pub base_url: String,
    pub timeout: Duration,
    pub default_headers: HeaderMap,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub retry_delay: Duration,
    pub retry_policy: RetryPolicy,
    /// Install the request/response debug loggers.
    pub debug: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        default_headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            default_headers,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_policy: RetryPolicy::default(),
            debug: false,
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, ttl: Duration, max_entries: usize) -> Self {
        self.cache_ttl = ttl;
        self.cache_max_entries = max_entries;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
