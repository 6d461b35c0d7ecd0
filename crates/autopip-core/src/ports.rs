//! Ports shared by the Decision Engine and the Orchestrator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::config::Config;
use crate::error::ConfigError;

/// Read side of the settings store.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn get(&self) -> Result<Config, ConfigError>;
}

/// A fixed snapshot, for contexts without a live store.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig(pub Config);

#[async_trait]
impl ConfigSource for StaticConfig {
    async fn get(&self) -> Result<Config, ConfigError> {
        Ok(self.0.clone())
    }
}

/// Time source in epoch milliseconds plus a way to wait.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
    async fn sleep_ms(&self, ms: u64);
}

/// Wall clock backed by `chrono`, for contexts that drive their own timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn epoch_ms() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Virtual clock. `sleep_ms` advances time instantly; shared by clones.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
    }
}
