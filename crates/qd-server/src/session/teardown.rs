//! One-shot session teardown
//!
//! Several I/O bridges of one session can reach end-of-stream at the same
//! time. Each of them triggers the guard; only the first trigger wins, and
//! the single task awaiting [`TeardownGuard::triggered`] runs the close
//! sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Inner {
    fired: AtomicBool,
    token: CancellationToken,
}

/// Close-once primitive shared by all bridges of a session
#[derive(Debug, Clone, Default)]
pub struct TeardownGuard {
    inner: Arc<Inner>,
}

impl TeardownGuard {
    /// Create an untriggered guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Request teardown.
    ///
    /// Returns `true` for exactly one caller over the guard's lifetime.
    pub fn trigger(&self) -> bool {
        let first = self
            .inner
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.inner.token.cancel();
        }
        first
    }

    /// Whether teardown has been requested
    pub fn is_triggered(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Wait until some caller has triggered teardown
    pub async fn triggered(&self) {
        self.inner.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_only_first_trigger_wins() {
        let guard = TeardownGuard::new();
        assert!(!guard.is_triggered());
        assert!(guard.trigger());
        assert!(!guard.trigger());
        assert!(guard.is_triggered());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_triggers_run_teardown_once() {
        let guard = TeardownGuard::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let guard = guard.clone();
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                if guard.trigger() {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_waiter_wakes_after_trigger() {
        let guard = TeardownGuard::new();
        let waiter = {
            let guard = guard.clone();
            tokio::spawn(async move { guard.triggered().await })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        guard.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_waiting_after_trigger_returns_immediately() {
        let guard = TeardownGuard::new();
        guard.trigger();
        guard.triggered().await;
    }

    #[test]
    fn test_trigger_from_blocking_thread() {
        let guard = TeardownGuard::new();
        let remote = guard.clone();
        let fired = std::thread::spawn(move || remote.trigger()).join().unwrap();
        assert!(fired);
        assert!(!guard.trigger());
    }
}
