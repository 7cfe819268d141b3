//! Sliding-window throttle for market data API calls.
//!
//! Bounds the number of calls issued inside any window of `period` to
//! `max_calls`, by keeping a queue of recent call timestamps. Callers that
//! would exceed the bound sleep until the oldest timestamp ages out of the
//! window. One instance is shared by every concurrent worker of a run.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

/// Throttle window configuration: at most `max_calls` within `period`.
#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Maximum calls allowed inside one sliding window.
    pub max_calls: usize,
    /// Width of the sliding window.
    pub period: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_calls: 300,
            period: Duration::from_secs(60),
        }
    }
}

/// Observability snapshot of a throttle instance.
///
/// Copied into the run summary so operators can see how close a run came to
/// the provider's limit and how long it spent waiting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThrottleStats {
    /// Deepest the timestamp queue ever got.
    pub max_depth: usize,
    /// How many times a caller had to wait.
    pub wait_count: u64,
    /// Cumulative wait time in milliseconds.
    pub total_wait_ms: u64,
}

/// Sliding-window rate limiter.
///
/// Thread-safe: the timestamp queue sits behind a single mutex, and the
/// mutex is released while a caller sleeps, so waiting callers never block
/// callers that still have window capacity.
pub struct SlidingWindowThrottle {
    config: ThrottleConfig,
    window: Mutex<VecDeque<Instant>>,
    max_depth: AtomicUsize,
    wait_count: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl SlidingWindowThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            window: Mutex::new(VecDeque::with_capacity(config.max_calls)),
            max_depth: AtomicUsize::new(0),
            wait_count: AtomicU64::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Lock the window mutex, recovering from poison if necessary.
    ///
    /// The worst case of recovering is a slightly miscounted window, which
    /// beats panicking mid-run.
    fn lock_window(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.window.lock().unwrap_or_else(|poisoned| {
            warn!("Throttle window mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Blocks (asynchronously) until a call slot is available, then claims it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.lock_window();
                let now = Instant::now();

                // Drop timestamps that have aged out of the window.
                while let Some(oldest) = window.front() {
                    if now.duration_since(*oldest) >= self.config.period {
                        window.pop_front();
                    } else {
                        break;
                    }
                }

                if window.len() < self.config.max_calls {
                    window.push_back(now);
                    self.max_depth.fetch_max(window.len(), Ordering::Relaxed);
                    return;
                }

                // Window is full: wait until the oldest entry expires.
                // A zero-call budget has no oldest entry and waits a full period.
                match window.front() {
                    Some(oldest) => self.config.period - now.duration_since(*oldest),
                    None => self.config.period,
                }
            };

            debug!("Throttle: window full, waiting {:?}", wait);
            self.wait_count.fetch_add(1, Ordering::Relaxed);
            self.total_wait_ms
                .fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
            tokio::time::sleep(wait).await;
        }
    }

    /// Snapshot of the accumulated throttle counters.
    pub fn stats(&self) -> ThrottleStats {
        ThrottleStats {
            max_depth: self.max_depth.load(Ordering::Relaxed),
            wait_count: self.wait_count.load(Ordering::Relaxed),
            total_wait_ms: self.total_wait_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_calls_under_capacity_do_not_wait() {
        let throttle = SlidingWindowThrottle::new(ThrottleConfig {
            max_calls: 3,
            period: Duration::from_secs(60),
        });

        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(throttle.stats().wait_count, 0);
        assert_eq!(throttle.stats().max_depth, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_bound_is_enforced() {
        // max_calls=2, period=60s: the third back-to-back call must start
        // at least 60s after the first.
        let throttle = SlidingWindowThrottle::new(ThrottleConfig {
            max_calls: 2,
            period: Duration::from_secs(60),
        });

        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(60));

        let stats = throttle.stats();
        assert_eq!(stats.wait_count, 1);
        assert!(stats.total_wait_ms >= 59_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_timestamps_free_capacity() {
        let throttle = SlidingWindowThrottle::new(ThrottleConfig {
            max_calls: 1,
            period: Duration::from_secs(10),
        });

        throttle.acquire().await;
        tokio::time::sleep(Duration::from_secs(11)).await;

        let start = Instant::now();
        throttle.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_across_tasks() {
        use std::sync::Arc;

        let throttle = Arc::new(SlidingWindowThrottle::new(ThrottleConfig {
            max_calls: 2,
            period: Duration::from_secs(30),
        }));

        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let throttle = throttle.clone();
            handles.push(tokio::spawn(async move {
                throttle.acquire().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Four calls through a 2-per-30s window need at least one full period.
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(throttle.stats().max_depth, 2);
    }
}
