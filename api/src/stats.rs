use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Cumulative counters for the lifetime of a client.
///
/// `requests` counts network attempts (each retry is an attempt); cache hits
/// never reach the network and are counted separately.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    requests: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    total_time_us: AtomicU64,
}

impl Counters {
    pub(crate) fn record_attempt(&self, elapsed: Duration, failed: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_time_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ApiStats {
        ApiStats::from_totals(
            self.requests.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
            self.cache_hits.load(Ordering::Relaxed),
            Duration::from_micros(self.total_time_us.load(Ordering::Relaxed)),
        )
    }
}

/// Point-in-time statistics with derived rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStats {
    pub requests: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub total_time_ms: f64,
    /// Mean attempt latency; 0 before the first attempt.
    pub average_time_ms: f64,
    /// `errors / requests`.
    pub error_rate: f64,
    /// `cache_hits / (requests + cache_hits)`: share of calls answered from cache.
    pub cache_hit_rate: f64,
}

impl ApiStats {
    fn from_totals(requests: u64, errors: u64, cache_hits: u64, total: Duration) -> Self {
        let total_time_ms = total.as_secs_f64() * 1000.0;
        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        Self {
            requests,
            errors,
            cache_hits,
            total_time_ms,
            average_time_ms: if requests == 0 {
                0.0
            } else {
                total_time_ms / requests as f64
            },
            error_rate: ratio(errors, requests),
            cache_hit_rate: ratio(cache_hits, requests + cache_hits),
        }
    }
}
