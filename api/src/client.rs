use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use atlas_events::EventBus;
use atlas_types::{ApiFailure, ApiSuccess, Event};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::cache::{ResponseCache, cache_key};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::interceptor::{
    RequestInterceptor, ResponseInterceptor, debug_request_logger, debug_response_logger,
};
use crate::request::{Payload, RequestOptions, RequestParts, ResponseParts, build_url};
use crate::retry::should_retry_header;
use crate::stats::{ApiStats, Counters};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 32;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

struct Inner {
    config: ApiConfig,
    http: reqwest::Client,
    bus: EventBus,
    cache: ResponseCache,
    stats: Counters,
    request_interceptors: RwLock<Vec<RequestInterceptor>>,
    response_interceptors: RwLock<Vec<ResponseInterceptor>>,
}

/// JSON API client.
///
/// Cloning yields another handle sharing the cache, statistics and interceptors.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url)
            .field("cached", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build a client that reports every attempt on `bus`.
    pub fn new(config: ApiConfig, bus: EventBus) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
            .build()
            .map_err(|e| ApiError::Network {
                url: config.base_url.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let cache = ResponseCache::new(config.cache_ttl, config.cache_max_entries);
        let debug = config.debug;
        let client = Self {
            inner: Arc::new(Inner {
                config,
                http,
                bus,
                cache,
                stats: Counters::default(),
                request_interceptors: RwLock::new(Vec::new()),
                response_interceptors: RwLock::new(Vec::new()),
            }),
        };

        if debug {
            client.add_request_interceptor(debug_request_logger());
            client.add_response_interceptor(debug_response_logger());
        }
        Ok(client)
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    pub fn add_request_interceptor(&self, interceptor: RequestInterceptor) {
        self.inner
            .request_interceptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(interceptor);
    }

    pub fn add_response_interceptor(&self, interceptor: ResponseInterceptor) {
        self.inner
            .response_interceptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(interceptor);
    }

    pub async fn get(&self, path: &str) -> Result<Payload, ApiError> {
        self.request(path, RequestOptions::get()).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Payload, ApiError> {
        self.request(path, RequestOptions::post(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Payload, ApiError> {
        self.request(path, RequestOptions::put(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<Payload, ApiError> {
        self.request(path, RequestOptions::patch(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Payload, ApiError> {
        self.request(path, RequestOptions::delete()).await
    }

    /// [`request`](Self::request) and deserialize the payload into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let url = build_url(&self.inner.config.base_url, path, &options.params)?;
        let payload = self.request(path, options).await?;
        payload.deserialize(url.as_str())
    }

    /// Run one call through the full pipeline.
    ///
    /// A fresh cache hit returns without touching the network. Otherwise the
    /// call is attempted, and on failure repeated after a fixed delay while
    /// `options.retry` allows and the retry policy accepts the error.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Payload, ApiError> {
        let url = build_url(&self.inner.config.base_url, path, &options.params)?;
        let key = options
            .is_cacheable()
            .then(|| cache_key(&options.method, &url));
        let mut retries_left = options.retry;

        loop {
            if let Some(key) = &key
                && let Some(hit) = self.inner.cache.get(key)
            {
                self.inner.stats.record_cache_hit();
                tracing::debug!(url = %url, "Cache hit");
                return Ok(hit);
            }

            match self.attempt(&url, &options).await {
                Ok(payload) => {
                    if let Some(key) = key {
                        self.inner.cache.insert(key, payload.clone());
                    }
                    return Ok(payload);
                }
                Err(err) if retries_left > 0 && self.inner.config.retry_policy.allows(&err) => {
                    retries_left -= 1;
                    tracing::debug!(
                        url = %url,
                        error = %err,
                        retries_left,
                        delay_ms = self.inner.config.retry_delay.as_millis() as u64,
                        "Retrying request"
                    );
                    tokio::time::sleep(self.inner.config.retry_delay).await;
                }
                Err(err) => {
                    tracing::warn!(method = %options.method, url = %url, error = %err, "API request failed");
                    return Err(err);
                }
            }
        }
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.inner.cache.len()
    }

    #[must_use]
    pub fn stats(&self) -> ApiStats {
        self.inner.stats.snapshot()
    }

    async fn attempt(&self, url: &Url, options: &RequestOptions) -> Result<Payload, ApiError> {
        let mut headers = self.inner.config.default_headers.clone();
        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }

        let mut parts = RequestParts {
            method: options.method.clone(),
            url: url.clone(),
            headers,
            body: options.body.clone(),
            timeout: options.timeout.unwrap_or(self.inner.config.timeout),
        };
        for interceptor in self.request_interceptors() {
            interceptor(&mut parts);
        }

        let started = Instant::now();
        let outcome = match tokio::time::timeout(parts.timeout, self.exchange(&parts, started)).await
        {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout {
                url: parts.url.to_string(),
                timeout: parts.timeout,
            }),
        };
        let elapsed = started.elapsed();

        self.inner.stats.record_attempt(elapsed, outcome.is_err());
        self.announce(&parts, &outcome, elapsed);
        outcome.map(|(_, payload)| payload)
    }

    async fn exchange(
        &self,
        parts: &RequestParts,
        started: Instant,
    ) -> Result<(StatusCode, Payload), ApiError> {
        let mut builder = self
            .inner
            .http
            .request(parts.method.clone(), parts.url.clone())
            .headers(parts.headers.clone());
        if let Some(body) = &parts.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(parts, &e))?;

        let head = ResponseParts {
            method: parts.method.clone(),
            url: parts.url.clone(),
            status: response.status(),
            headers: response.headers().clone(),
            elapsed: started.elapsed(),
        };
        for interceptor in self.response_interceptors() {
            interceptor(&head);
        }

        let payload = parse_response(response, parts).await?;
        Ok((head.status, payload))
    }

    fn announce(
        &self,
        parts: &RequestParts,
        outcome: &Result<(StatusCode, Payload), ApiError>,
        elapsed: Duration,
    ) {
        let url = parts.url.to_string();
        let method = parts.method.to_string();
        let duration_ms = elapsed.as_millis() as u64;

        let event = match outcome {
            Ok((status, _)) => Event::ApiSuccess(ApiSuccess {
                url,
                method,
                status: status.as_u16(),
                duration_ms,
            }),
            Err(err) => {
                tracing::debug!(url = %url, error = %err, duration_ms, "API attempt failed");
                Event::ApiError(ApiFailure {
                    url,
                    method,
                    status: err.status(),
                    error: err.to_string(),
                    duration_ms,
                })
            }
        };
        self.inner.bus.emit(&event);
    }

    fn request_interceptors(&self) -> Vec<RequestInterceptor> {
        self.inner
            .request_interceptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn response_interceptors(&self) -> Vec<ResponseInterceptor> {
        self.inner
            .response_interceptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn transport_error(parts: &RequestParts, error: &reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout {
            url: parts.url.to_string(),
            timeout: parts.timeout,
        }
    } else {
        ApiError::Network {
            url: parts.url.to_string(),
            message: error.to_string(),
        }
    }
}

async fn parse_response(response: Response, parts: &RequestParts) -> Result<Payload, ApiError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("application/json") || ct.contains("+json")
        });
    let should_retry = should_retry_header(response.headers());

    let text = response
        .text()
        .await
        .map_err(|e| transport_error(parts, &e))?;

    if !status.is_success() {
        return Err(ApiError::Http {
            status: status.as_u16(),
            body: error_body(status, text),
            url: parts.url.to_string(),
            should_retry,
        });
    }

    if !is_json {
        return Ok(Payload::Text(text));
    }
    if text.trim().is_empty() {
        return Ok(Payload::Json(Value::Null));
    }
    serde_json::from_str(&text)
        .map(Payload::Json)
        .map_err(|e| ApiError::Decode {
            url: parts.url.to_string(),
            message: e.to_string(),
        })
}

/// Error payload: JSON if it parses, else the raw text, else the reason phrase.
fn error_body(status: StatusCode, text: String) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(&text) {
        return value;
    }
    if !text.trim().is_empty() {
        return Value::String(text);
    }
    Value::String(
        status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string(),
    )
}
