//! Shared types for the adaptor toolkit: document identity, the
//! `Adaptor` trait, configuration, journaling, and structured trace
//! events. Every other crate in the workspace depends on this one;
//! this crate depends on none of them.

pub mod adaptor;
pub mod config;
pub mod docid;
pub mod error;
pub mod journal;
pub mod reference;
pub mod trace;

pub use adaptor::{
    Adaptor, AuthzDecision, Capabilities, DocContentResult, DocIdPusher, DocOutcome, DocRequest,
    Principal,
};
pub use config::{Config, ConfigChangePublisher};
pub use docid::{Acl, DocId, DocIdRecord, InheritanceRule, Metadata, NamedResource};
pub use error::{Error, Result};
pub use journal::{Journal, JournalSnapshot};
pub use reference::InMemoryAdaptor;
pub use trace::TraceEvent;
