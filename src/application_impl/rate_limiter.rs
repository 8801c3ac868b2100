use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_MAX_PER_SEC: u32 = 10;
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_per_sec: u32,
    pub min_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_sec: DEFAULT_MAX_PER_SEC,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

#[derive(Debug, Default)]
struct RateWindow {
    // admit instants of the last second, oldest first
    admitted: VecDeque<Instant>,
}

impl RateWindow {
    /// Admit a call at `now`, or report the instant to retry at.
    fn admit(&mut self, now: Instant, config: &RateLimitConfig) -> Result<(), Instant> {
        if let Some(&last) = self.admitted.back() {
            let earliest = last + config.min_interval;
            if now < earliest {
                return Err(earliest);
            }
        }

        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) < WINDOW {
                break;
            }
            self.admitted.pop_front();
        }

        if self.admitted.len() >= config.max_per_sec.max(1) as usize
            && let Some(&oldest) = self.admitted.front()
        {
            return Err(oldest + WINDOW);
        }

        self.admitted.push_back(now);
        Ok(())
    }
}

/// Bounds outbound calls to `max_per_sec` in any rolling second, spaced at
/// least `min_interval` apart. Waiters are admitted in arrival order.
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<RateWindow>,
    // tokio's mutex queues waiters FIFO
    turnstile: tokio::sync::Mutex<()>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            window: Mutex::new(RateWindow::default()),
            turnstile: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Suspend until a call is permitted.
    pub async fn acquire(&self) {
        let _turn = self.turnstile.lock().await;
        loop {
            let retry_at = {
                let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
                match window.admit(Instant::now(), &self.config) {
                    Ok(()) => return,
                    Err(at) => at,
                }
            };
            tracing::trace!(
                "rate limiter waiting {:?}",
                retry_at.saturating_duration_since(Instant::now())
            );
            tokio::time::sleep_until(retry_at).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn admitted_offsets(limiter: Arc<RateLimiter>, calls: usize) -> Vec<Duration> {
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..calls {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now() - start
            }));
        }
        let mut offsets = Vec::new();
        for handle in handles {
            offsets.push(handle.await.unwrap());
        }
        offsets.sort();
        offsets
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_spaced_by_min_interval() {
        let limiter = Arc::new(RateLimiter::default());
        let offsets = admitted_offsets(limiter, 5).await;
        for pair in offsets.windows(2) {
            assert!(pair[1] - pair[0] >= DEFAULT_MIN_INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn window_caps_calls_per_second() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            max_per_sec: 3,
            min_interval: Duration::from_millis(10),
        }));
        let offsets = admitted_offsets(limiter, 7).await;

        for (i, offset) in offsets.iter().enumerate() {
            let in_window = offsets
                .iter()
                .skip(i)
                .take_while(|o| **o - *offset < WINDOW)
                .count();
            assert!(in_window <= 3, "window starting at {offset:?} admitted {in_window}");
        }
        assert!(offsets[3] >= WINDOW);
        assert!(offsets[6] >= 2 * WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_fifteen_spills_into_next_second() {
        let limiter = Arc::new(RateLimiter::default());
        let offsets = admitted_offsets(limiter, 15).await;
        assert_eq!(offsets.len(), 15);
        assert_eq!(offsets.iter().filter(|o| **o < WINDOW).count(), 10);
        assert_eq!(offsets.iter().filter(|o| **o >= WINDOW).count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn late_calls_do_not_overfill_the_next_second() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            max_per_sec: 3,
            min_interval: Duration::from_millis(10),
        }));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(980)).await;

        let mut offsets = vec![Duration::ZERO];
        offsets.extend(
            admitted_offsets(limiter, 5)
                .await
                .into_iter()
                .map(|o| o + Duration::from_millis(980)),
        );

        for (i, offset) in offsets.iter().enumerate() {
            let in_window = offsets
                .iter()
                .skip(i)
                .take_while(|o| **o - *offset < WINDOW)
                .count();
            assert!(in_window <= 3, "window starting at {offset:?} admitted {in_window}");
        }
        assert_eq!(offsets[3], WINDOW);
        assert!(offsets[4] >= Duration::from_millis(1980));
    }
}
