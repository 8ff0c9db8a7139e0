//! Synthesis result caching
//!
//! An LRU cache with per-entry TTL over top-level synthesis calls. Keys are a
//! SHA-256 over the canonical schema JSON plus the call options, so two
//! documents differing only in key order share an entry.

use lru::LruCache;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Stable hash of (schema, strict, hint)
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(schema: &Value, strict: bool, hint: Option<&str>) -> Self {
        let canonical = canonicalize(schema).to_string();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hasher.update([0u8, strict as u8]);
        if let Some(hint) = hint {
            hasher.update([1u8]);
            hasher.update(hint.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Copy of `value` with every object's keys in sorted order
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    value: Value,
    inserted_at: Instant,
    last_accessed: Instant,
}

/// Statistics about cache performance
#[derive(Clone, Debug, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

pub struct SynthesisCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl SynthesisCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch a live entry and mark it most recently used. Expired entries are
    /// evicted and reported as absent.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let mut entries = self.lock();
        let expired = match entries.get_mut(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                entry.last_accessed = Instant::now();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Whether a live entry exists. Does not touch recency.
    pub fn has(&self, key: &CacheKey) -> bool {
        self.lock()
            .peek(key)
            .map(|entry| entry.inserted_at.elapsed() <= self.ttl)
            .unwrap_or(false)
    }

    /// Insert or replace an entry, evicting the least recently used one when full
    pub fn set(&self, key: CacheKey, value: Value) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            inserted_at: now,
            last_accessed: now,
        };
        let mut entries = self.lock();
        if let Some((old_key, _)) = entries.push(key.clone(), entry) {
            if old_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Time since the entry was last inserted or read through [`Self::get`].
    /// Does not touch recency.
    pub fn idle_for(&self, key: &CacheKey) -> Option<Duration> {
        self.lock()
            .peek(key)
            .map(|entry| entry.last_accessed.elapsed())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
