//! A minimal in-memory [`Adaptor`] — the only concrete implementation
//! this workspace ships. A real repository connector is an external
//! collaborator's job; this one exists so the binary has something to
//! run out of the box and so the test suite has a stand-in that
//! exercises the full `Adaptor` surface.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::adaptor::{
    Adaptor, AuthzDecision, Capabilities, DocContentResult, DocIdPusher, DocRequest, Principal,
};
use crate::docid::{Acl, DocId, DocIdRecord, Metadata};
use crate::error::Result;

struct Document {
    body: Vec<u8>,
    content_type: Option<String>,
    metadata: Metadata,
    acl: Option<Acl>,
}

/// Holds documents in a plain `HashMap` behind a `RwLock` — there is no
/// need for the sessions crate's sharding here since this adaptor is a
/// reference/demo implementation, not a contended hot path.
#[derive(Default)]
pub struct InMemoryAdaptor {
    documents: RwLock<HashMap<DocId, Document>>,
}

impl InMemoryAdaptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document, public and world-readable unless
    /// `with_acl` is also called for the same id.
    pub fn put_document(&self, doc_id: DocId, body: Vec<u8>, content_type: Option<String>) {
        self.documents.write().insert(
            doc_id,
            Document {
                body,
                content_type,
                metadata: Metadata::new(),
                acl: None,
            },
        );
    }

    pub fn set_metadata(&self, doc_id: &DocId, metadata: Metadata) {
        if let Some(doc) = self.documents.write().get_mut(doc_id) {
            doc.metadata = metadata;
        }
    }

    pub fn set_acl(&self, doc_id: &DocId, acl: Acl) {
        if let Some(doc) = self.documents.write().get_mut(doc_id) {
            doc.acl = Some(acl);
        }
    }

    pub fn remove_document(&self, doc_id: &DocId) {
        self.documents.write().remove(doc_id);
    }
}

#[async_trait]
impl Adaptor for InMemoryAdaptor {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            incremental: false,
            config_listener: false,
        }
    }

    async fn get_doc_ids(&self, pusher: &mut dyn DocIdPusher) -> Result<()> {
        let ids: Vec<DocId> = self.documents.read().keys().cloned().collect();
        let batch = ids.into_iter().map(DocIdRecord::new).collect();
        pusher.push_records(batch).await
    }

    async fn get_doc_content(&self, req: &DocRequest) -> Result<DocContentResult> {
        let docs = self.documents.read();
        match docs.get(&req.doc_id) {
            None => Ok(DocContentResult::not_found()),
            Some(doc) => {
                let mut result =
                    DocContentResult::found(doc.body.clone(), doc.content_type.clone())
                        .with_metadata(clone_metadata(&doc.metadata));
                if let Some(acl) = &doc.acl {
                    result = result.with_acl(acl.clone());
                }
                Ok(result)
            }
        }
    }

    async fn is_user_authorized(
        &self,
        principal: Option<&Principal>,
        doc_id: &DocId,
    ) -> AuthzDecision {
        let docs = self.documents.read();
        let Some(doc) = docs.get(doc_id) else {
            return AuthzDecision::Indeterminate;
        };
        let Some(acl) = &doc.acl else {
            // No ACL attached: public document, same as the Appliance's
            // own "no security" default.
            return AuthzDecision::Permit;
        };
        match principal {
            None => {
                if acl.permit_users.is_empty() && acl.permit_groups.is_empty() {
                    AuthzDecision::Permit
                } else {
                    AuthzDecision::Deny
                }
            }
            Some(principal) => {
                if acl.deny_users.contains(&principal.username)
                    || principal.groups.iter().any(|g| acl.deny_groups.contains(g))
                {
                    AuthzDecision::Deny
                } else if acl.permit_users.contains(&principal.username)
                    || principal.groups.iter().any(|g| acl.permit_groups.contains(g))
                {
                    AuthzDecision::Permit
                } else if acl.permit_users.is_empty() && acl.permit_groups.is_empty() {
                    AuthzDecision::Permit
                } else {
                    AuthzDecision::Deny
                }
            }
        }
    }
}

fn clone_metadata(metadata: &Metadata) -> Metadata {
    let mut cloned = Metadata::new();
    for (k, v) in metadata.iter() {
        cloned.push(k, v);
    }
    cloned
}
