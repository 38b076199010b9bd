//! In-memory TTL cache for GET responses.
//!
//! - Keys are derived from method + full URL (query included)
//! - Entries are valid while `age < ttl`; stale entries are dropped on read
//! - Once the entry cap is exceeded, the single oldest-inserted entry is evicted
//!
//! Eviction is insertion-ordered, not recency-ordered: reading an entry does
//! not protect it from eviction, and refreshing an existing key keeps its
//! original position.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use reqwest::Method;
use url::Url;

use crate::Payload;

/// Default cap on cached responses.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Build the cache key for a request.
#[must_use]
pub fn cache_key(method: &Method, url: &Url) -> String {
    format!("{method} {url}")
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Payload,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    /// Keys in insertion order.
    order: VecDeque<String>,
}

impl Entries {
    fn remove(&mut self, key: &str) {
        if self.map.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<Entries>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A fresh value for `key`. Stale entries are removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Payload> {
        let mut entries = self.lock();
        let entry = entries.map.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            return Some(entry.value.clone());
        }
        entries.remove(key);
        None
    }

    /// Store `value` under `key` with the current timestamp.
    pub fn insert(&self, key: String, value: Payload) {
        let mut entries = self.lock();
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };

        if let Some(existing) = entries.map.get_mut(&key) {
            *existing = entry;
            return;
        }

        entries.order.push_back(key.clone());
        entries.map.insert(key, entry);

        if entries.map.len() > self.max_entries
            && let Some(oldest) = entries.order.pop_front()
        {
            entries.map.remove(&oldest);
            tracing::debug!(key = %oldest, "Evicted oldest cache entry");
        }
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.map.clear();
        entries.order.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
