use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::ApiError;

/// Per-call options.
///
/// `cache`, `retry` and `params` steer the client and never reach the transport.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    /// Query parameters; `None` values are skipped.
    pub params: Vec<(String, Option<String>)>,
    /// Allow serving/storing this call from the response cache (GET only).
    pub cache: bool,
    /// Additional attempts after the first failure.
    pub retry: u32,
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            body: None,
            params: Vec::new(),
            cache: true,
            retry: 0,
            timeout: None,
        }
    }

    #[must_use]
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    #[must_use]
    pub fn post(body: Value) -> Self {
        Self::new(Method::POST).json(body)
    }

    #[must_use]
    pub fn put(body: Value) -> Self {
        Self::new(Method::PUT).json(body)
    }

    #[must_use]
    pub fn patch(body: Value) -> Self {
        Self::new(Method::PATCH).json(body)
    }

    #[must_use]
    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Add a header. Invalid names or values are dropped with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "Ignoring invalid request header"),
        }
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), Some(value.to_string())));
        self
    }

    /// Add a parameter that is omitted from the URL when `None`.
    pub fn param_opt<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.params.push((key.into(), value.map(|v| v.to_string())));
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Only safe reads are ever cached.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.cache && self.method == Method::GET
    }
}

/// Join `base` and `path` and append non-null query parameters.
///
/// Absolute `http(s)` paths bypass the base.
pub fn build_url(
    base: &str,
    path: &str,
    params: &[(String, Option<String>)],
) -> Result<Url, ApiError> {
    let absolute = path.starts_with("http://") || path.starts_with("https://");
    let joined = if absolute || base.is_empty() {
        path.to_string()
    } else if path.is_empty() {
        base.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };

    let mut url = Url::parse(&joined).map_err(|e| ApiError::InvalidUrl {
        url: joined.clone(),
        message: e.to_string(),
    })?;

    let present: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
        .collect();
    if !present.is_empty() {
        url.query_pairs_mut().extend_pairs(present);
    }
    Ok(url)
}

/// Outgoing request as seen (and mutated) by request interceptors.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl RequestParts {
    /// POST, PUT, PATCH and DELETE.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self.method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        )
    }
}

/// Incoming response head as seen by response interceptors.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub method: Method,
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub elapsed: Duration,
}

/// Parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Json(_) => None,
        }
    }

    /// JSON value; text payloads become a JSON string.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::Json(v) => v,
            Self::Text(s) => Value::String(s),
        }
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(self, url: &str) -> Result<T, ApiError> {
        serde_json::from_value(self.into_json()).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
