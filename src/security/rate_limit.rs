//! Per-client token bucket rate limiting.
//!
//! Buckets refill lazily on access; there is no background timer. The bucket
//! map is a `DashMap` so different clients never contend on one lock, and each
//! bucket carries its own mutex for the refill-and-take step. Once more than
//! `max_tracked_clients` buckets exist, the least recently used ones are
//! evicted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Result of a single `try_acquire` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Bucket capacity, reported as `X-RateLimit-Limit`.
    pub limit: u64,
    /// Whole tokens left after this call.
    pub remaining: u64,
    /// Seconds until at least one token is available (0 when allowed).
    pub reset_seconds: u64,
}

/// A token bucket for one client.
#[derive(Debug)]
struct ClientBucket {
    tokens: f64,
    last_refill: Instant,
}

impl ClientBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn try_take(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        // `now` can trail `last_refill` when callers race; never refill backwards.
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct TrackedBucket {
    bucket: Mutex<ClientBucket>,
    /// Access tick used for LRU eviction.
    last_used: AtomicU64,
}

/// Process-wide per-client rate limiter.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    buckets: DashMap<String, Arc<TrackedBucket>>,
    capacity: f64,
    refill_rate: f64,
    max_tracked: usize,
    tick: AtomicU64,
}

impl TokenBucketLimiter {
    /// Create a limiter where an empty bucket refills fully over `refill_period`.
    pub fn new(capacity: u32, refill_period: Duration, max_tracked: usize) -> Self {
        let capacity = f64::from(capacity.max(1));
        let period = refill_period.as_secs_f64().max(f64::EPSILON);
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_rate: capacity / period,
            max_tracked: max_tracked.max(1),
            tick: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.refill_period(), config.max_tracked_clients)
    }

    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }

    /// Number of client buckets currently held.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Refill the client's bucket and try to take one token.
    pub fn try_acquire(&self, client_key: &str) -> RateLimitDecision {
        self.try_acquire_at(client_key, Instant::now())
    }

    pub(crate) fn try_acquire_at(&self, client_key: &str, now: Instant) -> RateLimitDecision {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);

        let (tracked, created) = match self.buckets.entry(client_key.to_owned()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let tracked = Arc::new(TrackedBucket {
                    bucket: Mutex::new(ClientBucket::new(self.capacity, now)),
                    last_used: AtomicU64::new(tick),
                });
                entry.insert(tracked.clone());
                (tracked, true)
            }
        };
        tracked.last_used.fetch_max(tick, Ordering::Relaxed);

        if created {
            if self.buckets.len() > self.max_tracked {
                self.evict_least_recent();
            }
            metrics::record_tracked_clients(self.buckets.len());
        }

        // An evicted bucket stays alive through `tracked` until this update finishes.
        let mut bucket = tracked.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        if bucket.try_take(self.capacity, self.refill_rate, now) {
            RateLimitDecision {
                allowed: true,
                limit: self.capacity(),
                remaining: bucket.tokens.floor() as u64,
                reset_seconds: 0,
            }
        } else {
            let missing = (1.0 - bucket.tokens).max(0.0);
            RateLimitDecision {
                allowed: false,
                limit: self.capacity(),
                remaining: 0,
                reset_seconds: (missing / self.refill_rate).ceil() as u64,
            }
        }
    }

    /// Drop the least recently used buckets until the map is back under its
    /// bound. A tenth of the bound is freed at once so a steady stream of new
    /// clients does not rescan the map on every insert.
    fn evict_least_recent(&self) {
        let len = self.buckets.len();
        if len <= self.max_tracked {
            return;
        }
        let target = self.max_tracked - self.max_tracked / 10;
        let excess = len - target.min(len);

        let mut by_age: Vec<(String, u64)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_used.load(Ordering::Relaxed)))
            .collect();
        by_age.sort_unstable_by_key(|(_, tick)| *tick);

        for (key, seen) in by_age.into_iter().take(excess) {
            // Skip buckets touched since the snapshot was taken.
            self.buckets
                .remove_if(&key, |_, tracked| tracked.last_used.load(Ordering::Relaxed) == seen);
        }

        tracing::debug!(
            evicted = len.saturating_sub(self.buckets.len()),
            tracked = self.buckets.len(),
            "Evicted idle rate limit buckets"
        );
    }
}
