//! Content-addressed result cache with TTL expiry and LRU capacity bound.
//!
//! - Keys are hex SHA-256 digests over the guidance type, method, size, a
//!   digest of the source content (raw samples or glyph text) and a digest of
//!   the sorted parameter set.
//! - `get` drops entries older than the TTL; `put` sweeps expired entries and
//!   then evicts least-recently-accessed entries until the size bound holds.
//! - Results are stored behind `Arc`; callers get a handle, never a mutable
//!   alias into storage, so eviction cannot disturb a returned result.
//!
//! Recency is a global access counter rather than a timestamp, so two
//! accesses never tie.
use crate::conditioning::{ConditioningResult, ConditioningType, Params};
use crate::config::CacheConfig;
use crate::image::Raster;
use dashmap::DashMap;
use log::debug;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey(String);

/// What a result was computed from.
#[derive(Clone, Copy, Debug)]
pub enum CacheSource<'a> {
    Image(&'a Raster),
    Glyph(&'a str),
}

impl CacheKey {
    pub fn derive(
        kind: ConditioningType,
        method: &str,
        width: u32,
        height: u32,
        source: CacheSource<'_>,
        params: &Params,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.name().as_bytes());
        hasher.update([0]);
        hasher.update(method.as_bytes());
        hasher.update([0]);
        hasher.update(width.to_le_bytes());
        hasher.update(height.to_le_bytes());
        hasher.update(content_digest(source));
        hasher.update(params_digest(params));
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn content_digest(source: CacheSource<'_>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    match source {
        CacheSource::Image(raster) => {
            hasher.update(b"image");
            hasher.update(raster.width().to_le_bytes());
            hasher.update(raster.height().to_le_bytes());
            hasher.update([raster.channels()]);
            hasher.update(raster.data());
        }
        CacheSource::Glyph(text) => {
            hasher.update(b"glyph");
            hasher.update(text.as_bytes());
        }
    }
    hasher.finalize().into()
}

fn params_digest(params: &Params) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for (name, value) in params {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.canonical().as_bytes());
        hasher.update(b";");
    }
    hasher.finalize().into()
}

#[derive(Debug)]
struct CacheEntry {
    result: Arc<ConditioningResult>,
    created_at: Instant,
    last_access: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
pub struct ConditioningCache {
    entries: DashMap<CacheKey, CacheEntry>,
    max_size: usize,
    ttl: Duration,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ConditioningCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_size,
            ttl,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_size, Duration::from_secs(config.ttl_secs))
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ConditioningResult>> {
        {
            let Some(entry) = self.entries.get(key) else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("cache miss {}", key);
                return None;
            };
            if entry.created_at.elapsed() <= self.ttl {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("cache hit {}", key);
                return Some(Arc::clone(&entry.result));
            }
        }
        if self.entries.remove(key).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("cache entry {} expired", key);
        None
    }

    /// Store a successful result; failed results are ignored. Returns whether
    /// the result was stored.
    pub fn put(&self, key: CacheKey, result: Arc<ConditioningResult>) -> bool {
        if !result.success || self.max_size == 0 {
            return false;
        }
        let entry = CacheEntry {
            result,
            created_at: Instant::now(),
            last_access: AtomicU64::new(self.tick()),
        };
        self.entries.insert(key, entry);
        self.evict_expired();
        self.evict_to_capacity();
        true
    }

    fn evict_expired(&self) {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.created_at.elapsed() <= ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!("cache swept {} expired entries", removed);
        }
    }

    fn evict_to_capacity(&self) {
        while self.entries.len() > self.max_size {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().last_access.load(Ordering::Relaxed))
                .map(|e| e.key().clone());
            let Some(key) = oldest else { break };
            if self.entries.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("cache evicted least recently used {}", key);
            }
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConditioningCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
