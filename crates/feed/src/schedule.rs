//! Ties the cron evaluator to the one-shot gate: a background task
//! wakes once a minute, checks whether the current minute matches the
//! stored expression, and if so fires the gate's primary task.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::cron::{CronParseError, CronSchedule};
use crate::gate::OneShotGate;

/// Handle to a running schedule. Dropping this does not stop the
/// background task — call [`ScheduleHandle::cancel`] explicitly, the
/// same way the rest of this workspace prefers explicit over
/// drop-driven cancellation.
pub struct ScheduleHandle {
    expr: Arc<RwLock<CronSchedule>>,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Spawns the tick loop. `on_due` is invoked through `gate` every
    /// time the stored expression matches the current UTC minute.
    pub fn spawn<F, Fut>(initial: CronSchedule, gate: OneShotGate, on_due: F) -> Self
    where
        F: Fn(tokio_util::sync::CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let expr = Arc::new(RwLock::new(initial));
        let expr_for_task = expr.clone();
        let on_due = Arc::new(on_due);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let now = Utc::now();
                let matches = expr_for_task.read().matches(&now);
                if matches {
                    let on_due = on_due.clone();
                    gate.run(
                        move |cancel| {
                            let on_due = on_due.clone();
                            async move { on_due(cancel).await }
                        },
                        || async {
                            tracing::debug!("scheduled push skipped: previous run still in flight");
                        },
                    )
                    .await;
                }
            }
        });

        Self { expr, task }
    }

    /// Replaces the stored expression under the same lock rather than
    /// spawning a second tick loop. An invalid expression is rejected
    /// and the previous schedule is kept.
    pub fn reschedule(&self, new_expr: &str) -> Result<(), CronParseError> {
        let parsed = CronSchedule::parse(new_expr)?;
        *self.expr.write() = parsed;
        Ok(())
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}
