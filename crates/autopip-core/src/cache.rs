//! Bounded-staleness caches.
//!
//! Values are served until `ttl_ms` has elapsed since they were stored, or
//! until explicitly invalidated. A clock that moves backwards invalidates.

use crate::config::Config;

/// Freshness window for configuration snapshots.
pub const CONFIG_FRESHNESS_MS: u64 = 1_000;
/// Freshness window for the measured viewport size.
pub const VIEWPORT_FRESHNESS_MS: u64 = 50;
/// Freshness window for the enumerated video list.
pub const VIDEO_LIST_FRESHNESS_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct FreshCache<T> {
    entry: Option<(T, u64)>,
    ttl_ms: u64,
}

impl<T> FreshCache<T> {
    pub fn new(ttl_ms: u64) -> Self {
        Self { entry: None, ttl_ms }
    }

    pub fn get(&self, now_ms: u64) -> Option<&T> {
        match &self.entry {
            Some((value, stored_at)) if now_ms >= *stored_at && now_ms - stored_at < self.ttl_ms => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn store(&mut self, value: T, now_ms: u64) {
        self.entry = Some((value, now_ms));
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }
}

pub type ConfigCache = FreshCache<Config>;

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new(CONFIG_FRESHNESS_MS)
    }
}
