//! Backoff policy and the cancelable scheduler for delayed redelivery

use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Exponential backoff with additive jitter and a hard ceiling.
///
/// `delay = min(max_delay, base_delay * 2^(retry_count - 1) + jitter)`
/// where jitter is drawn uniformly from `[0, max_jitter]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            max_jitter: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    /// Delay before redelivery number `retry_count` (1-based), without jitter
    pub fn base_delay_for(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay.saturating_mul(factor)
    }

    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };
        self.base_delay_for(retry_count)
            .saturating_add(jitter)
            .min(self.max_delay)
    }
}

/// Tracks delayed redeliveries so they can be observed and cancelled.
#[derive(Clone)]
pub struct RetryScheduler {
    tracker: TaskTracker,
    cancel: CancellationToken,
    pending: Arc<AtomicUsize>,
}

impl RetryScheduler {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `task` after `delay` unless the scheduler is shut down first
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let pending = self.pending.clone();
        pending.fetch_add(1, Ordering::SeqCst);

        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Scheduled redelivery cancelled");
                }
                _ = async {
                    tokio::time::sleep(delay).await;
                    task.await;
                } => {}
            }
            pending.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Number of redeliveries waiting or in progress
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel every pending redelivery and wait for the tasks to exit.
    ///
    /// Returns how many were still pending when shutdown began.
    pub async fn shutdown(&self) -> usize {
        let dropped = self.pending();
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        dropped
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("pending", &self.pending())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            max_jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_exponential_growth() {
        let policy = no_jitter();

        assert_eq!(policy.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(16_000));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = no_jitter();

        assert_eq!(policy.delay_for(6), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy::default();

        for _ in 0..100 {
            let delay = policy.delay_for(2);
            assert!(delay >= Duration::from_millis(2_000));
            assert!(delay <= Duration::from_millis(3_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_task_runs_after_delay() {
        let scheduler = RetryScheduler::new();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = ran.clone();
        scheduler.schedule(Duration::from_secs(5), async move {
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending() {
        let scheduler = RetryScheduler::new();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = ran.clone();
        scheduler.schedule(Duration::from_secs(60), async move {
            flag.store(true, Ordering::SeqCst);
        });

        let dropped = scheduler.shutdown().await;

        assert_eq!(dropped, 1);
        assert!(scheduler.is_shut_down());
        assert_eq!(scheduler.pending(), 0);
        assert!(!ran.load(Ordering::SeqCst));
    }
}
