//! Deadline enforcement with a forced-stop callback.

use std::future::Future;
use std::time::Duration;

use crate::config::ExecutionConfig;
use crate::error::WatchdogError;

#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    deadline: Duration,
    stop_grace: Duration,
}

impl Watchdog {
    #[must_use]
    pub fn new(deadline: Duration, stop_grace: Duration) -> Self {
        Self {
            deadline,
            stop_grace,
        }
    }

    #[must_use]
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            Duration::from_millis(config.timeout_ms),
            Duration::from_millis(config.stop_grace_ms),
        )
    }

    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run `action` under the deadline.
    ///
    /// If the deadline elapses first, `on_timeout` is called once to force the
    /// action to stop, the action gets at most the stop grace period to wind
    /// down, and any result it produces is discarded. The call therefore
    /// returns within `deadline + stop_grace` even if the action never yields.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::Timeout`] when the deadline elapses.
    pub async fn run_watched<T, F, C>(&self, action: F, on_timeout: C) -> Result<T, WatchdogError>
    where
        F: Future<Output = T>,
        C: FnOnce(),
    {
        let mut action = std::pin::pin!(action);
        if let Ok(value) = tokio::time::timeout(self.deadline, &mut action).await {
            return Ok(value);
        }

        tracing::warn!(deadline = ?self.deadline, "deadline elapsed, forcing stop");
        on_timeout();
        let stopped = tokio::time::timeout(self.stop_grace, action).await.is_ok();
        if !stopped {
            tracing::warn!(
                grace = ?self.stop_grace,
                "action did not stop within grace period, abandoning it"
            );
        }
        Err(WatchdogError::Timeout {
            deadline: self.deadline,
            stopped,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio_util::sync::CancellationToken;

    use super::*;

    fn watchdog() -> Watchdog {
        Watchdog::new(Duration::from_millis(100), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn fast_action_returns_value() {
        let calls = AtomicUsize::new(0);
        let result = watchdog()
            .run_watched(async { 7 }, || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn action_error_propagates() {
        let result: Result<Result<(), &str>, _> =
            watchdog().run_watched(async { Err("boom") }, || {}).await;
        assert_eq!(result, Ok(Err("boom")));
    }

    #[tokio::test(start_paused = true)]
    async fn cooperative_action_is_stopped() {
        let token = CancellationToken::new();
        let observed = token.clone();
        let result = watchdog()
            .run_watched(async move { observed.cancelled().await }, || token.cancel())
            .await;
        assert_eq!(
            result,
            Err(WatchdogError::Timeout {
                deadline: Duration::from_millis(100),
                stopped: true
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn uncooperative_action_is_abandoned() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let started = tokio::time::Instant::now();
        let result = watchdog()
            .run_watched(std::future::pending::<()>(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(
            result,
            Err(WatchdogError::Timeout {
                deadline: Duration::from_millis(100),
                stopped: false
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() <= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn blocking_task_that_ignores_stop_still_returns() {
        let wd = Watchdog::new(Duration::from_millis(50), Duration::from_millis(50));
        let task = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_millis(500)));
        let started = std::time::Instant::now();
        let result = wd.run_watched(task, || {}).await;
        assert!(matches!(
            result,
            Err(WatchdogError::Timeout { stopped: false, .. })
        ));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn from_config() {
        let wd = Watchdog::from_config(&ExecutionConfig::default());
        assert_eq!(wd.deadline(), Duration::from_millis(5_000));
    }
}
