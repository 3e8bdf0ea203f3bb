//! At-most-one-concurrent-primary-task gate with cooperative cancellation.
//!
//! Used to guarantee a full DocId listing never overlaps itself: a
//! second trigger while one is already running executes the fallback
//! (by default, a log-and-drop) instead of queuing or running alongside
//! the first.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Guards a single named primary task. Cloning shares the same
/// underlying gate — every clone sees the same "is a primary running"
/// state.
#[derive(Clone)]
pub struct OneShotGate {
    name: String,
    inner: Arc<Mutex<Option<Inflight>>>,
}

struct Inflight {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl OneShotGate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs `primary` if no primary task is currently in flight;
    /// otherwise runs `fallback`. `primary` receives a [`CancellationToken`]
    /// it should poll cooperatively so [`OneShotGate::stop`] can request
    /// early termination.
    pub async fn run<P, PF, F, FF>(&self, primary: P, fallback: F)
    where
        P: FnOnce(CancellationToken) -> PF + Send + 'static,
        PF: Future<Output = ()> + Send + 'static,
        F: FnOnce() -> FF,
        FF: Future<Output = ()>,
    {
        let mut guard = self.inner.lock().await;
        if let Some(inflight) = guard.as_ref() {
            if !inflight.handle.is_finished() {
                drop(guard);
                tracing::debug!(gate = %self.name, "primary already in flight, running fallback");
                fallback().await;
                return;
            }
        }

        let cancel = CancellationToken::new();
        let cancel_for_task = cancel.clone();
        let handle = tokio::spawn(primary(cancel_for_task));
        *guard = Some(Inflight { handle, cancel });
    }

    /// Requests cancellation of the in-flight primary task, if any, and
    /// waits for it to finish (bounded by `max_wait`). Returns `true` if
    /// a primary was signalled.
    pub async fn stop(&self, max_wait: std::time::Duration) -> bool {
        let inflight = {
            let mut guard = self.inner.lock().await;
            guard.take()
        };
        let Some(inflight) = inflight else {
            return false;
        };
        inflight.cancel.cancel();
        let _ = tokio::time::timeout(max_wait, inflight.handle).await;
        true
    }

    pub async fn is_running(&self) -> bool {
        match self.inner.lock().await.as_ref() {
            Some(inflight) => !inflight.handle.is_finished(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn fallback_runs_while_primary_is_in_flight() {
        let gate = OneShotGate::new("test");
        let primary_started = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let fallback_count = Arc::new(AtomicUsize::new(0));

        {
            let started = primary_started.clone();
            let release = release.clone();
            gate.run(
                move |_cancel| async move {
                    started.notify_one();
                    release.notified().await;
                },
                || async {},
            )
            .await;
        }
        primary_started.notified().await;

        let count = fallback_count.clone();
        gate.run(
            |_cancel| async move {},
            move || {
                count.fetch_add(1, Ordering::SeqCst);
                async {}
            },
        )
        .await;

        assert_eq!(fallback_count.load(Ordering::SeqCst), 1);
        release.notify_one();
    }

    #[tokio::test]
    async fn stop_cancels_primary_and_future_run_proceeds() {
        let gate = OneShotGate::new("test");
        let cancelled = Arc::new(AtomicUsize::new(0));
        let c = cancelled.clone();
        gate.run(
            move |cancel| async move {
                cancel.cancelled().await;
                c.fetch_add(1, Ordering::SeqCst);
            },
            || async {},
        )
        .await;

        let stopped = gate.stop(Duration::from_secs(1)).await;
        assert!(stopped);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert!(!gate.is_running().await);
    }

    #[tokio::test]
    async fn second_run_after_first_finishes_executes_primary_again() {
        let gate = OneShotGate::new("test");
        gate.run(|_c| async {}, || async {}).await;
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let ran_primary = Arc::new(AtomicUsize::new(0));
        let flag = ran_primary.clone();
        gate.run(
            move |_c| async move {
                flag.fetch_add(1, Ordering::SeqCst);
            },
            || async {},
        )
        .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ran_primary.load(Ordering::SeqCst), 1);
    }
}
