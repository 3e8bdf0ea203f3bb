use std::any::Any;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use adaptor_domain::Principal;

use crate::session_id::SessionId;

/// SAML authn state tracked between the redirect to the IdP and the
/// assertion-consumer POST: the `InResponseTo` value the adaptor must
/// see echoed back, consumed exactly once.
#[derive(Debug, Clone)]
pub struct SamlInFlight {
    pub request_id: String,
    pub issued_at: DateTime<Utc>,
}

/// A per-client session: an authenticated principal (once SAML authn
/// completes), in-flight SAML request state, and an escape hatch for
/// anything else a future slot needs without widening this struct.
pub struct Session {
    pub id: SessionId,
    created_at: DateTime<Utc>,
    last_access: RwLock<DateTime<Utc>>,
    principal: RwLock<Option<Principal>>,
    saml_in_flight: Mutex<Option<SamlInFlight>>,
    extra: Mutex<HashMap<&'static str, Box<dyn Any + Send + Sync>>>,
}

impl Session {
    pub(crate) fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_access: RwLock::new(now),
            principal: RwLock::new(None),
            saml_in_flight: Mutex::new(None),
            extra: Mutex::new(HashMap::new()),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        *self.last_access.read()
    }

    pub fn touch(&self) {
        *self.last_access.write() = Utc::now();
    }

    pub fn principal(&self) -> Option<Principal> {
        self.principal.read().clone()
    }

    pub fn set_principal(&self, principal: Principal) {
        *self.principal.write() = Some(principal);
    }

    pub fn clear_principal(&self) {
        *self.principal.write() = None;
    }

    /// Stashes the pending SAML request id, returning the previous one
    /// if a second AuthnRequest was started before the first completed.
    pub fn begin_saml_authn(&self, request_id: impl Into<String>) -> Option<SamlInFlight> {
        self.saml_in_flight.lock().replace(SamlInFlight {
            request_id: request_id.into(),
            issued_at: Utc::now(),
        })
    }

    /// Consumes the in-flight SAML state iff `in_response_to` matches
    /// the stored request id. A mismatch or an absent slot leaves the
    /// slot untouched and returns `None` — the caller must treat this
    /// as a hard authentication failure (anti-replay).
    pub fn take_saml_in_flight_if_matches(&self, in_response_to: &str) -> Option<SamlInFlight> {
        let mut slot = self.saml_in_flight.lock();
        match slot.as_ref() {
            Some(pending) if pending.request_id == in_response_to => slot.take(),
            _ => None,
        }
    }

    /// Unconditionally drops any pending SAML request state. Any
    /// validation failure (bad signature, expired window, mismatched
    /// issuer) transitions the session back to UNAUTHED, which means
    /// discarding the in-flight record regardless of whether its
    /// `InResponseTo` was ever checked against the failed response.
    pub fn clear_saml_in_flight(&self) {
        self.saml_in_flight.lock().take();
    }

    pub fn set_extra<T: Any + Send + Sync>(&self, key: &'static str, value: T) {
        self.extra.lock().insert(key, Box::new(value));
    }

    pub fn get_extra<T: Any + Send + Sync + Clone>(&self, key: &'static str) -> Option<T> {
        self.extra
            .lock()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("last_access", &self.last_access())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saml_in_flight_is_consumed_only_on_matching_response() {
        let s = Session::new(SessionId::generate());
        s.begin_saml_authn("req-1");
        assert!(s.take_saml_in_flight_if_matches("req-2").is_none());
        let consumed = s.take_saml_in_flight_if_matches("req-1");
        assert!(consumed.is_some());
        assert!(s.take_saml_in_flight_if_matches("req-1").is_none());
    }

    #[test]
    fn clear_saml_in_flight_drops_a_pending_request_regardless_of_id() {
        let s = Session::new(SessionId::generate());
        s.begin_saml_authn("req-1");
        s.clear_saml_in_flight();
        assert!(s.take_saml_in_flight_if_matches("req-1").is_none());
    }

    #[test]
    fn extra_slot_round_trips_by_type() {
        let s = Session::new(SessionId::generate());
        s.set_extra("counter", 42u32);
        assert_eq!(s.get_extra::<u32>("counter"), Some(42));
        assert_eq!(s.get_extra::<String>("counter"), None);
    }

    #[test]
    fn touch_advances_last_access() {
        let s = Session::new(SessionId::generate());
        let before = s.last_access();
        std::thread::sleep(std::time::Duration::from_millis(5));
        s.touch();
        assert!(s.last_access() >= before);
    }
}
