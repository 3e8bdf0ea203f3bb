use serde::{Deserialize, Serialize};

fn d_clock_skew_secs() -> i64 {
    60
}

fn d_acs_path() -> String {
    "/samlassertionconsumer".to_string()
}

fn d_authz_path() -> String {
    "/saml-authz".to_string()
}

/// SAML 2.0 SP-side configuration: this adaptor's own identity plus the
/// IdP it trusts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamlConfig {
    pub entity_id: String,
    pub idp_sso_url: String,
    /// The IdP's entityID, distinct from `idp_sso_url` — a real IdP's
    /// `Response/Issuer` names its entityID, not the SSO redirect
    /// endpoint it was reached at, so this is what an inbound
    /// assertion's `Issuer` is checked against.
    pub idp_entity_id: String,
    /// PEM file containing the IdP's signing certificate.
    pub idp_cert_path: String,
    /// PEM file containing this adaptor's private key, used to sign
    /// AuthnRequests and, optionally, AuthzDecisionStatement responses.
    pub sp_key_path: String,
    pub sp_cert_path: String,
    #[serde(default = "d_acs_path")]
    pub acs_path: String,
    #[serde(default = "d_authz_path")]
    pub authz_path: String,
    #[serde(default)]
    pub sign_authz_responses: bool,
    #[serde(default = "d_clock_skew_secs")]
    pub clock_skew_secs: i64,
}
