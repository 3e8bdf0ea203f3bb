//! Core document-identity types shared by every crate in the workspace.
//!
//! The codec that turns a [`DocId`] into a URL and back lives in the
//! sibling `adaptor-docid` crate — this module only owns the value types.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An opaque, non-empty, repository-scoped document identifier.
///
/// Equality is by string value. Construction is fallible (`TryFrom`)
/// because the empty string is never a valid DocId.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocId(String);

impl DocId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A DocId was constructed from an empty string.
#[derive(Debug, thiserror::Error)]
#[error("DocId must not be empty")]
pub struct EmptyDocId;

impl TryFrom<String> for DocId {
    type Error = EmptyDocId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(EmptyDocId);
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for DocId {
    type Error = EmptyDocId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_owned())
    }
}

/// One row of a feed batch. DocId is the only mandatory field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocIdRecord {
    pub doc_id: DocId,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub crawl_immediately: bool,
    #[serde(default)]
    pub lock: bool,
    #[serde(default)]
    pub result_link: Option<String>,
}

impl DocIdRecord {
    pub fn new(doc_id: DocId) -> Self {
        Self {
            doc_id,
            last_modified: None,
            delete: false,
            crawl_immediately: false,
            lock: false,
            result_link: None,
        }
    }
}

/// A DocId carrying only ACL metadata, no content — used to propagate
/// inheritance roots independent of a document push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedResource {
    pub doc_id: DocId,
    pub acl: Acl,
}

/// How an ACL's own permit/deny rules combine with its parent's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InheritanceRule {
    LeafDominates,
    ParentDominates,
    AndBothPermit,
    OrEitherPermit,
}

/// A structured authorization descriptor.
///
/// Empty sets mean "no rule on this dimension". `inherit_from`, when
/// present, must be resolvable by the DocId codec to a URL — that
/// invariant is enforced at the codec boundary, not here, since this
/// type has no codec access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Acl {
    #[serde(default)]
    pub permit_users: HashSet<String>,
    #[serde(default)]
    pub deny_users: HashSet<String>,
    #[serde(default)]
    pub permit_groups: HashSet<String>,
    #[serde(default)]
    pub deny_groups: HashSet<String>,
    #[serde(default)]
    pub inherit_from: Option<DocId>,
    #[serde(default)]
    pub inheritance: Option<InheritanceRule>,
}

/// An unordered *logically*, but insertion-ordered *physically*, set of
/// (key, value) pairs emitted as `X-Gsa-External-Metadata` headers.
/// Ordering is preserved so header emission is deterministic, which
/// matters for the feed composer's determinism invariant and for tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata(Vec<(String, String)>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_rejects_empty() {
        assert!(DocId::try_from(String::new()).is_err());
        assert!(DocId::try_from("hello").is_ok());
    }

    #[test]
    fn doc_id_display_roundtrips_value() {
        let id = DocId::try_from("report-42").unwrap();
        assert_eq!(id.to_string(), "report-42");
        assert_eq!(id.as_str(), "report-42");
    }

    #[test]
    fn metadata_preserves_insertion_order() {
        let mut m = Metadata::new();
        m.push("b", "2");
        m.push("a", "1");
        let pairs: Vec<_> = m.iter().collect();
        assert_eq!(pairs, vec![("b", "2"), ("a", "1")]);
    }

    #[test]
    fn doc_id_record_defaults_are_minimal() {
        let rec = DocIdRecord::new(DocId::try_from("x").unwrap());
        assert!(!rec.delete);
        assert!(rec.last_modified.is_none());
        assert!(rec.result_link.is_none());
    }
}
