//! The `Adaptor` capability interface.
//!
//! This crate ships only the interface and a minimal in-memory reference
//! implementation used by the test suite — a real repository connector
//! is an external collaborator, out of scope per the top-level design.
//!
//! Rather than a deep wrapper hierarchy (one interface per optional
//! capability, each wrapping the last), the capability set is a single
//! struct of booleans returned by [`Adaptor::capabilities`]. Components
//! that only make sense for opted-in adaptors (the incremental poller,
//! config-change fan-out) probe this struct instead of downcasting a
//! trait object.

use async_trait::async_trait;

use crate::config::Config;
use crate::docid::{Acl, DocId, DocIdRecord, Metadata};
use crate::error::Result;

/// An authenticated end-user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub groups: Vec<String>,
    pub password: Option<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            groups: Vec::new(),
            password: None,
        }
    }
}

/// The outcome of an authorization check. `Indeterminate` is treated the
/// same as `Deny` by every caller in this workspace (spec invariant),
/// but is kept distinct because the batch authz wire format reports it
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzDecision {
    Permit,
    Deny,
    Indeterminate,
}

impl AuthzDecision {
    pub fn is_permit(self) -> bool {
        matches!(self, AuthzDecision::Permit)
    }
}

/// Optional capabilities an adaptor may opt into beyond the mandatory set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    /// Implements a meaningful `poll_incremental`.
    pub incremental: bool,
    /// Wants to be notified of config reloads.
    pub config_listener: bool,
}

/// A single incoming content request, after DocId decoding and
/// authorization have already happened.
#[derive(Debug, Clone)]
pub struct DocRequest {
    pub doc_id: DocId,
    pub if_modified_since: Option<chrono::DateTime<chrono::Utc>>,
}

impl DocRequest {
    /// `false` iff `last_modified` is present and not strictly after the
    /// client's `If-Modified-Since` header.
    pub fn has_changed_since_last_access(
        &self,
        last_modified: Option<chrono::DateTime<chrono::Utc>>,
    ) -> bool {
        match (last_modified, self.if_modified_since) {
            (Some(lm), Some(ims)) => lm > ims,
            (Some(_), None) => true,
            (None, _) => true,
        }
    }
}

/// What the adaptor decided to do with a content request.
///
/// This replaces the exception-driven `FileNotFoundException`-for-404
/// pattern with an explicit result variant, per the redesign notes.
#[derive(Debug)]
pub enum DocOutcome {
    Found { body: Vec<u8>, content_type: Option<String> },
    NotModified,
    NotFound,
}

/// Full result of `Adaptor::get_doc_content`: the outcome plus whatever
/// metadata/ACL the adaptor wants attached. Metadata and ACL are frozen
/// at this point — there is no way to mutate them once this value is
/// constructed, matching the "must be set before the first byte of
/// body" invariant structurally instead of by convention.
#[derive(Debug)]
pub struct DocContentResult {
    pub outcome: DocOutcome,
    pub metadata: Metadata,
    pub acl: Option<Acl>,
}

impl DocContentResult {
    pub fn not_found() -> Self {
        Self {
            outcome: DocOutcome::NotFound,
            metadata: Metadata::new(),
            acl: None,
        }
    }

    pub fn not_modified() -> Self {
        Self {
            outcome: DocOutcome::NotModified,
            metadata: Metadata::new(),
            acl: None,
        }
    }

    pub fn found(body: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            outcome: DocOutcome::Found { body, content_type },
            metadata: Metadata::new(),
            acl: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = Some(acl);
        self
    }
}

/// Abstract sink the adaptor pushes batches of records into. The
/// concrete implementation (composing + sending one feed per call, and
/// updating the journal) lives in `adaptor-feed`; this trait exists so
/// `adaptor-domain` has no dependency on the feed crate.
#[async_trait]
pub trait DocIdPusher: Send + Sync {
    async fn push_records(&mut self, batch: Vec<DocIdRecord>) -> Result<()>;
}

/// The repository-specific business logic an operator plugs in.
///
/// Only `init`, `destroy`, `get_doc_ids`, `get_doc_content`, and
/// `is_user_authorized` are mandatory; `poll_incremental` has a no-op
/// default and should only be treated as meaningful when
/// `capabilities().incremental` is `true`.
#[async_trait]
pub trait Adaptor: Send + Sync {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn destroy(&self) {}

    /// Enumerate all DocIds, handing batches to `pusher.push_records`.
    async fn get_doc_ids(&self, pusher: &mut dyn DocIdPusher) -> Result<()>;

    async fn get_doc_content(&self, req: &DocRequest) -> Result<DocContentResult>;

    /// `principal = None` means the anonymous identity.
    async fn is_user_authorized(
        &self,
        principal: Option<&Principal>,
        doc_id: &DocId,
    ) -> AuthzDecision;

    /// Batched authorization check. The default loops over
    /// `is_user_authorized`; adaptors with a bulk ACL store can override
    /// this for a single round-trip.
    async fn is_user_authorized_batch(
        &self,
        queries: &[(Option<Principal>, DocId)],
    ) -> Vec<AuthzDecision> {
        let mut out = Vec::with_capacity(queries.len());
        for (principal, doc_id) in queries {
            out.push(self.is_user_authorized(principal.as_ref(), doc_id).await);
        }
        out
    }

    /// Only called when `capabilities().incremental` is `true`.
    async fn poll_incremental(&self, _pusher: &mut dyn DocIdPusher) -> Result<()> {
        Ok(())
    }

    /// Only called when `capabilities().config_listener` is `true`. Fires
    /// after the controller has already swapped in the new snapshot and
    /// rescheduled the cron push, so the adaptor always observes state
    /// consistent with what the rest of the process is now running with.
    async fn on_config_changed(&self, _config: &Config) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_changed_false_only_when_not_after_if_modified_since() {
        let req = DocRequest {
            doc_id: DocId::try_from("x").unwrap(),
            if_modified_since: Some(chrono::Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap()),
        };
        use chrono::TimeZone;
        let earlier = chrono::Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let later = chrono::Utc.with_ymd_and_hms(2020, 1, 3, 0, 0, 0).unwrap();
        assert!(!req.has_changed_since_last_access(Some(earlier)));
        assert!(req.has_changed_since_last_access(Some(later)));
        assert!(req.has_changed_since_last_access(None));
    }

    #[test]
    fn has_changed_true_when_no_if_modified_since_header() {
        let req = DocRequest {
            doc_id: DocId::try_from("x").unwrap(),
            if_modified_since: None,
        };
        use chrono::TimeZone;
        let lm = chrono::Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(req.has_changed_since_last_access(Some(lm)));
    }
}
