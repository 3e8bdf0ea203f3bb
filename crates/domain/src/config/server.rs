use serde::{Deserialize, Serialize};

fn d_port() -> u16 {
    38080
}

fn d_host() -> String {
    "0.0.0.0".to_string()
}

fn d_doc_id_path() -> String {
    "/doc/".to_string()
}

/// The adaptor's own HTTPS listener: where the Appliance fetches document
/// content, posts SAML assertions, and queries batch authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    /// URL path prefix DocIds are framed under, e.g. `/doc/`.
    #[serde(default = "d_doc_id_path")]
    pub doc_id_path: String,
    #[serde(default)]
    pub require_client_cert_paths: Vec<String>,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            doc_id_path: d_doc_id_path(),
            require_client_cert_paths: Vec::new(),
            tls: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
    /// PEM bundle of CAs trusted for *client* certificates. Client auth
    /// is requested, never required: a connection without a cert (or
    /// with one that doesn't chain to this store) is still accepted at
    /// the TLS layer; `server.require_client_cert_paths` is what turns
    /// "no cert presented" into a rejection, and only for the paths it lists.
    #[serde(default)]
    pub client_trust_store_path: Option<String>,
}
