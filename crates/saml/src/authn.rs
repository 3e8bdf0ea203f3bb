//! Builds and signs the SP-initiated AuthnRequest for the HTTP-Redirect
//! binding.

use std::io::Write;

use adaptor_domain::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;

use crate::xml_writer::XmlWriter;

pub const SIG_ALG_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// A freshly built AuthnRequest, before encoding for transport.
pub struct AuthnRequest {
    pub id: String,
    pub xml: String,
}

/// Builds a minimal SP-initiated AuthnRequest. `id` is returned to the
/// caller so it can be stashed as the session's `SamlInFlight::request_id`
/// and checked against the IdP's `InResponseTo` on the way back.
pub fn build_authn_request(entity_id: &str, acs_url: &str, destination: &str) -> AuthnRequest {
    let id = format!("_{}", uuid::Uuid::new_v4());
    let issue_instant = Utc::now().to_rfc3339();

    let mut w = XmlWriter::new();
    w.open_tag(
        "samlp:AuthnRequest",
        &[
            ("xmlns:samlp", "urn:oasis:names:tc:SAML:2.0:protocol"),
            ("xmlns:saml", "urn:oasis:names:tc:SAML:2.0:assertion"),
            ("ID", &id),
            ("Version", "2.0"),
            ("IssueInstant", &issue_instant),
            ("Destination", destination),
            ("AssertionConsumerServiceURL", acs_url),
            ("ProtocolBinding", "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST"),
        ],
    );
    w.open_tag("saml:Issuer", &[]).text(entity_id).close_tag("saml:Issuer");
    w.self_closing_tag(
        "samlp:NameIDPolicy",
        &[
            ("Format", "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified"),
            ("AllowCreate", "true"),
        ],
    );
    w.close_tag("samlp:AuthnRequest");

    AuthnRequest {
        id,
        xml: w.into_string(),
    }
}

/// Encodes `request` per the HTTP-Redirect binding (raw DEFLATE, then
/// base64) and signs the resulting query string per the binding's
/// "simple signing" scheme: RSA-SHA256 over the exact bytes of
/// `SAMLRequest=...&RelayState=...&SigAlg=...`, never over the XML
/// itself. Returns the full redirect URL the adaptor should 302 the
/// browser to.
pub fn encode_redirect_url(
    idp_sso_url: &str,
    request: &AuthnRequest,
    relay_state: Option<&str>,
    signing_key: &RsaPrivateKey,
) -> Result<String> {
    let mut deflater = DeflateEncoder::new(Vec::new(), Compression::default());
    deflater
        .write_all(request.xml.as_bytes())
        .map_err(|e| Error::Other(format!("deflate failed: {e}")))?;
    let compressed = deflater
        .finish()
        .map_err(|e| Error::Other(format!("deflate failed: {e}")))?;
    let encoded_request = BASE64.encode(compressed);

    let mut query = format!(
        "SAMLRequest={}",
        percent_encoding::utf8_percent_encode(&encoded_request, percent_encoding::NON_ALPHANUMERIC)
    );
    if let Some(relay) = relay_state {
        query.push_str(&format!(
            "&RelayState={}",
            percent_encoding::utf8_percent_encode(relay, percent_encoding::NON_ALPHANUMERIC)
        ));
    }
    query.push_str(&format!(
        "&SigAlg={}",
        percent_encoding::utf8_percent_encode(SIG_ALG_RSA_SHA256, percent_encoding::NON_ALPHANUMERIC)
    ));

    let signing_key = SigningKey::<Sha256>::new(signing_key.clone());
    let signature = signing_key.sign(query.as_bytes());
    let encoded_signature = BASE64.encode(signature.to_bytes());

    query.push_str(&format!(
        "&Signature={}",
        percent_encoding::utf8_percent_encode(&encoded_signature, percent_encoding::NON_ALPHANUMERIC)
    ));

    let separator = if idp_sso_url.contains('?') { '&' } else { '?' };
    Ok(format!("{idp_sso_url}{separator}{query}"))
}
