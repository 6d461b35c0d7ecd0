use async_trait::async_trait;
use tokio::time::{Duration, Instant};

use autopip_core::ports::{Clock, SystemClock};

/// Wall-clock epoch milliseconds that advance with the tokio timer.
///
/// The epoch is sampled once; later readings add elapsed tokio time, so a
/// paused test runtime sees time move only when it is advanced.
#[derive(Debug, Clone)]
pub struct TokioClock {
    epoch_ms: u64,
    started: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(SystemClock::epoch_ms())
    }

    pub fn starting_at(epoch_ms: u64) -> Self {
        Self {
            epoch_ms,
            started: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.epoch_ms.saturating_add(elapsed)
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_paused_tokio_time() {
        let clock = TokioClock::starting_at(1_000_000);
        assert_eq!(clock.now_ms(), 1_000_000);
        clock.sleep_ms(250).await;
        assert_eq!(clock.now_ms(), 1_000_250);
        tokio::time::advance(Duration::from_millis(750)).await;
        assert_eq!(clock.now_ms(), 1_001_000);
    }
}
