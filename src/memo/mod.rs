//! Time-bounded memoization of recomputed results.
//!
//! Entries carry their insertion instant. An entry is served while
//! `now - inserted_at < ttl` and never afterwards; inserting past
//! `max_entries` evicts the oldest entry first.

pub mod fingerprint;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_ENTRIES: usize = 1;

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct MemoCache<K, V> {
    entries: VecDeque<Entry<K, V>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K: PartialEq, V: Clone> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

impl<K: PartialEq, V: Clone> MemoCache<K, V> {
    /// A `max_entries` of zero is treated as one.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        self.purge_expired_at(now);
        self.entries
            .iter()
            .find(|e| &e.key == key)
            .map(|e| e.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        self.purge_expired_at(now);
        self.entries.retain(|e| e.key != key);
        while self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(Entry {
            key,
            value,
            inserted_at: now,
        });
    }

    pub fn get_or_try_insert_with<E, F>(&mut self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.get_or_try_insert_with_at(key, Instant::now(), compute)
    }

    /// Returns the cached value for `key`, or computes and stores it.
    /// A failed computation leaves the cache unchanged.
    pub fn get_or_try_insert_with_at<E, F>(
        &mut self,
        key: K,
        now: Instant,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(hit) = self.get_at(&key, now) {
            tracing::debug!("memo hit");
            return Ok(hit);
        }
        let value = compute()?;
        self.insert_at(key, value.clone(), now);
        Ok(value)
    }

    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|e| now.saturating_duration_since(e.inserted_at) < ttl);
        before - self.entries.len()
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/memo/mod.rs"]
mod tests;
