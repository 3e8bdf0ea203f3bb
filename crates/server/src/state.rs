use std::sync::Arc;

use adaptor_domain::{Adaptor, Config, Journal};
use adaptor_docid::DocIdCodec;
use adaptor_sessions::SessionManager;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::ip_allowlist::IpAllowList;

/// Everything a request handler needs, cloned cheaply (every field is
/// an `Arc` or `Copy`) the way the teacher's gateway `AppState` is laid
/// out flat rather than nested.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<parking_lot::RwLock<Arc<Config>>>,
    pub adaptor: Arc<dyn Adaptor>,
    pub codec: Arc<DocIdCodec>,
    pub sessions: Arc<SessionManager>,
    pub journal: Arc<Journal>,
    pub ip_allowlist: Arc<IpAllowList>,
    pub saml_sp_key: Arc<RsaPrivateKey>,
    pub saml_idp_key: Arc<RsaPublicKey>,
}

impl AppState {
    pub fn config_snapshot(&self) -> Arc<Config> {
        self.config.read().clone()
    }

    pub fn replace_config(&self, new_config: Arc<Config>) {
        *self.config.write() = new_config;
    }
}
