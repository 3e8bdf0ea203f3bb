//! In-memory counters describing the adaptor's recent push/serve activity.
//!
//! Exposed via the admin/health surface in `adaptor-server`. Nothing here
//! is persisted; a restart resets the journal, matching the "no durable
//! queue" non-goal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Latency histogram bucket upper bounds, in milliseconds. The last
/// bucket is unbounded.
const LATENCY_BUCKETS_MS: [u64; 6] = [10, 50, 100, 500, 1_000, 5_000];

/// Counters for one push/serve cycle. Every field is independently
/// atomic rather than guarded by one lock, since readers (the health
/// endpoint) and writers (the feed sender, document handler) never need
/// a consistent joint snapshot across fields.
#[derive(Debug, Default)]
pub struct Journal {
    pushed_success: AtomicU64,
    pushed_transient_fail: AtomicU64,
    pushed_permanent_fail: AtomicU64,
    docs_served: AtomicU64,
    docs_not_found: AtomicU64,
    docs_not_modified: AtomicU64,
    authz_denied: AtomicU64,
    last_full_push: RwLock<Option<DateTime<Utc>>>,
    latency_buckets: [AtomicU64; LATENCY_BUCKETS_MS.len() + 1],
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_push_success(&self, count: u64) {
        self.pushed_success.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_push_transient_fail(&self) {
        self.pushed_transient_fail.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_push_permanent_fail(&self) {
        self.pushed_permanent_fail.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_full_push_completed(&self, at: DateTime<Utc>) {
        *self.last_full_push.write() = Some(at);
    }

    pub fn last_full_push(&self) -> Option<DateTime<Utc>> {
        *self.last_full_push.read()
    }

    pub fn record_doc_served(&self) {
        self.docs_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_doc_not_found(&self) {
        self.docs_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_doc_not_modified(&self) {
        self.docs_not_modified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_authz_denied(&self) {
        self.authz_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        let idx = LATENCY_BUCKETS_MS
            .iter()
            .position(|bound| ms <= *bound)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.latency_buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> JournalSnapshot {
        JournalSnapshot {
            pushed_success: self.pushed_success.load(Ordering::Relaxed),
            pushed_transient_fail: self.pushed_transient_fail.load(Ordering::Relaxed),
            pushed_permanent_fail: self.pushed_permanent_fail.load(Ordering::Relaxed),
            docs_served: self.docs_served.load(Ordering::Relaxed),
            docs_not_found: self.docs_not_found.load(Ordering::Relaxed),
            docs_not_modified: self.docs_not_modified.load(Ordering::Relaxed),
            authz_denied: self.authz_denied.load(Ordering::Relaxed),
            last_full_push: self.last_full_push(),
            latency_buckets: self
                .latency_buckets
                .iter()
                .map(|c| c.load(Ordering::Relaxed))
                .collect(),
        }
    }
}

/// A point-in-time, serializable copy of [`Journal`]'s counters.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JournalSnapshot {
    pub pushed_success: u64,
    pub pushed_transient_fail: u64,
    pub pushed_permanent_fail: u64,
    pub docs_served: u64,
    pub docs_not_found: u64,
    pub docs_not_modified: u64,
    pub authz_denied: u64,
    pub last_full_push: Option<DateTime<Utc>>,
    pub latency_buckets: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let j = Journal::new();
        j.record_push_success(3);
        j.record_push_success(2);
        j.record_push_transient_fail();
        j.record_doc_served();
        j.record_doc_served();
        let snap = j.snapshot();
        assert_eq!(snap.pushed_success, 5);
        assert_eq!(snap.pushed_transient_fail, 1);
        assert_eq!(snap.docs_served, 2);
    }

    #[test]
    fn latency_falls_into_expected_bucket() {
        let j = Journal::new();
        j.record_latency(Duration::from_millis(5));
        j.record_latency(Duration::from_millis(10_000));
        let snap = j.snapshot();
        assert_eq!(snap.latency_buckets[0], 1);
        assert_eq!(*snap.latency_buckets.last().unwrap(), 1);
    }

    #[test]
    fn last_full_push_starts_unset_and_updates() {
        let j = Journal::new();
        assert!(j.last_full_push().is_none());
        let now = Utc::now();
        j.record_full_push_completed(now);
        assert_eq!(j.last_full_push(), Some(now));
    }
}
