//! Decision cache for the policy and scope steps
//!
//! Only the outcome of the realm-pair, gate and scope checks is cached.
//! Session validity is always evaluated fresh by the engine, so a
//! revocation or expiry is never served stale. Keys cover the token id,
//! the policy version and the authorization-relevant claims, so a policy
//! swap misses the cache by construction.

use blake3::Hasher;
use dashmap::DashMap;
use icom_core::{Channel, Realm};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::decision::AuthorizationDecision;
use crate::session::Session;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub capacity: usize,

    /// Time-to-live for cached decisions
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Duration::from_secs(60),
        }
    }
}

/// Cache key type (BLAKE3 hash)
type CacheKey = [u8; 32];

/// Cached entry with TTL
#[derive(Clone)]
struct CachedEntry {
    decision: AuthorizationDecision,
    cached_at: Instant,
}

impl CachedEntry {
    fn new(decision: AuthorizationDecision) -> Self {
        Self {
            decision,
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Thread-safe decision cache
pub struct DecisionCache {
    memory_cache: DashMap<CacheKey, CachedEntry>,
    config: CacheConfig,
    hits: AtomicUsize,
    misses: AtomicUsize,
    expirations: AtomicUsize,
}

impl DecisionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            memory_cache: DashMap::new(),
            config,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            expirations: AtomicUsize::new(0),
        }
    }

    /// Get a cached decision
    pub fn get(
        &self,
        session: &Session,
        policy_version: u64,
        target: Realm,
        channel: Channel,
    ) -> Option<AuthorizationDecision> {
        let key = Self::compute_key(session, policy_version, target, channel);

        if let Some(entry) = self.memory_cache.get(&key) {
            if entry.is_expired(self.config.ttl) {
                drop(entry);
                self.memory_cache.remove(&key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }

            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.decision.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a decision
    pub fn put(
        &self,
        session: &Session,
        policy_version: u64,
        target: Realm,
        channel: Channel,
        decision: AuthorizationDecision,
    ) {
        let key = Self::compute_key(session, policy_version, target, channel);

        if self.memory_cache.len() >= self.config.capacity {
            self.evict();
        }

        self.memory_cache.insert(key, CachedEntry::new(decision));
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.memory_cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.memory_cache.len(),
            max_entries: self.config.capacity,
        }
    }

    fn compute_key(
        session: &Session,
        policy_version: u64,
        target: Realm,
        channel: Channel,
    ) -> CacheKey {
        let mut hasher = Hasher::new();

        hasher.update(session.token_id().as_bytes());
        hasher.update(&[0]);
        hasher.update(&policy_version.to_le_bytes());
        hasher.update(target.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(channel.as_str().as_bytes());
        hasher.update(&[0]);

        // Token ids are not authenticated, so the claims that feed the
        // decision are part of the key too.
        hasher.update(session.realm().as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(session.network_type().as_str().as_bytes());
        for scope in session.scopes().literals() {
            hasher.update(&[0]);
            hasher.update(scope.as_bytes());
        }

        *hasher.finalize().as_bytes()
    }

    /// Drop expired entries, then roughly 10% of the rest if still full
    fn evict(&self) {
        let ttl = self.config.ttl;
        self.memory_cache.retain(|_, entry| !entry.is_expired(ttl));

        if self.memory_cache.len() < self.config.capacity {
            return;
        }

        let to_remove = (self.config.capacity / 10).max(1);
        let mut removed = 0;
        self.memory_cache.retain(|_, _| {
            if removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
