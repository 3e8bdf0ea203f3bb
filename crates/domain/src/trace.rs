//! Structured trace events emitted to `tracing` as a single `tracing`
//! field holding the event's JSON, rather than as ad-hoc log lines. This
//! gives log consumers one field (`trace_event`) to filter on instead of
//! parsing message text.

use serde::Serialize;

use crate::docid::DocId;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent<'a> {
    PushStarted {
        schedule: &'a str,
    },
    PushCompleted {
        schedule: &'a str,
        pushed: usize,
        failed: usize,
    },
    PushAborted {
        schedule: &'a str,
        reason: &'a str,
    },
    SessionCreated {
        session_id: &'a str,
    },
    SessionExpired {
        session_id: &'a str,
    },
    AuthnSucceeded {
        session_id: &'a str,
        username: &'a str,
    },
    AuthnFailed {
        reason: &'a str,
    },
    AuthzDecision {
        doc_id: &'a DocId,
        username: Option<&'a str>,
        permit: bool,
    },
    DocServed {
        doc_id: &'a DocId,
        status: &'a str,
    },
    ConfigReloaded {
        error_count: usize,
        warning_count: usize,
    },
}

impl<'a> TraceEvent<'a> {
    /// Serialize to JSON and emit at `info` level under the
    /// `trace_event` field. Serialization failure is logged instead of
    /// propagated — a broken trace event must never interrupt request
    /// handling.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => tracing::info!(trace_event = %json, "adaptor_event"),
            Err(err) => tracing::warn!(error = %err, "failed to serialize trace event"),
        }
    }
}
