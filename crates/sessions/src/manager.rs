use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;

use adaptor_domain::config::SessionsConfig;
use adaptor_domain::TraceEvent;

use crate::session::Session;
use crate::session_id::SessionId;

/// Sharded, TTL-swept session store.
///
/// The teacher's `SessionStore` holds every session behind one
/// `RwLock<HashMap<..>>`; that serializes unrelated sessions against
/// each other under contention. Splitting into `shard_count` buckets,
/// keyed by `session_id % shard_count`, keeps two different sessions'
/// operations from ever touching the same lock while still giving each
/// individual session a consistent, serialized view of its own state.
pub struct SessionManager {
    shards: Vec<RwLock<HashMap<SessionId, Arc<Session>>>>,
    ttl: chrono::Duration,
    max_cleanup_interval: Duration,
    last_sweep_unix_ms: AtomicI64,
}

impl SessionManager {
    pub fn new(config: &SessionsConfig) -> Self {
        let shard_count = config.shard_count.max(1);
        let shards = (0..shard_count).map(|_| RwLock::new(HashMap::new())).collect();
        Self {
            shards,
            ttl: chrono::Duration::seconds(config.ttl_secs as i64),
            max_cleanup_interval: Duration::from_secs(config.max_cleanup_interval_secs),
            last_sweep_unix_ms: AtomicI64::new(0),
        }
    }

    fn shard(&self, id: SessionId) -> &RwLock<HashMap<SessionId, Arc<Session>>> {
        &self.shards[id.shard_index(self.shards.len())]
    }

    pub fn create_session(&self) -> Arc<Session> {
        let id = SessionId::generate();
        let session = Arc::new(Session::new(id));
        self.shard(id).write().insert(id, session.clone());
        TraceEvent::SessionCreated {
            session_id: &id.to_string(),
        }
        .emit();
        session
    }

    /// Looks up an existing, non-expired session. Does not create one —
    /// callers that want create-on-miss use [`SessionManager::create_session`]
    /// explicitly, keeping "a cookie with no session behind it" and "no
    /// cookie at all" distinguishable.
    pub fn get_session(&self, id: SessionId) -> Option<Arc<Session>> {
        let session = self.shard(id).read().get(&id).cloned()?;
        if self.is_expired(&session) {
            self.delete(id);
            return None;
        }
        session.touch();
        Some(session)
    }

    pub fn delete(&self, id: SessionId) {
        self.shard(id).write().remove(&id);
    }

    fn is_expired(&self, session: &Session) -> bool {
        Utc::now() - session.last_access() > self.ttl
    }

    /// Sweeps every shard for expired sessions, but never more often
    /// than `max_cleanup_interval` — a caller driving this from a tight
    /// loop (e.g. on every request) degrades to a no-op between sweeps
    /// rather than a full-map scan per call.
    pub fn sweep_if_due(&self) -> usize {
        let now_ms = Utc::now().timestamp_millis();
        let last = self.last_sweep_unix_ms.load(Ordering::Relaxed);
        if now_ms - last < self.max_cleanup_interval.as_millis() as i64 {
            return 0;
        }
        if self
            .last_sweep_unix_ms
            .compare_exchange(last, now_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return 0;
        }
        self.sweep_now()
    }

    /// Unconditional sweep, independent of the throttle. Exposed for
    /// tests and for an explicit admin-triggered cleanup.
    pub fn sweep_now(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut guard = shard.write();
            let before = guard.len();
            guard.retain(|_, session| !self.is_expired(session));
            removed += before - guard.len();
        }
        if removed > 0 {
            tracing::debug!(removed, "session sweep reclaimed expired sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(ttl_secs: u64) -> SessionManager {
        SessionManager::new(&SessionsConfig {
            ttl_secs,
            max_cleanup_interval_secs: 0,
            shard_count: 4,
        })
    }

    #[test]
    fn create_then_get_returns_same_session() {
        let mgr = manager(900);
        let created = mgr.create_session();
        let fetched = mgr.get_session(created.id).unwrap();
        assert_eq!(fetched.id, created.id);
    }

    #[test]
    fn get_session_returns_none_for_unknown_id() {
        let mgr = manager(900);
        assert!(mgr.get_session(SessionId::generate()).is_none());
    }

    #[test]
    fn expired_session_is_evicted_on_access() {
        let mgr = manager(0);
        let created = mgr.create_session();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(mgr.get_session(created.id).is_none());
        assert_eq!(mgr.len(), 0);
    }

    #[test]
    fn sweep_now_removes_only_expired_entries() {
        let mgr = manager(0);
        let expired = mgr.create_session();
        let _ = expired;
        std::thread::sleep(std::time::Duration::from_millis(5));
        let removed = mgr.sweep_now();
        assert_eq!(removed, 1);
        assert_eq!(mgr.len(), 0);
    }

    #[test]
    fn delete_removes_session_immediately() {
        let mgr = manager(900);
        let created = mgr.create_session();
        mgr.delete(created.id);
        assert!(mgr.get_session(created.id).is_none());
    }

    #[test]
    fn distinct_sessions_land_in_possibly_different_shards_without_losing_either() {
        let mgr = manager(900);
        let a = mgr.create_session();
        let b = mgr.create_session();
        assert!(mgr.get_session(a.id).is_some());
        assert!(mgr.get_session(b.id).is_some());
    }
}
