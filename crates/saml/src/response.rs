//! Validates an inbound `samlp:Response` POSTed to the assertion
//! consumer: enveloped XML-DSig signature, `Issuer`/`Destination`
//! matching, the `NotBefore`/`NotOnOrAfter` window, and the caller is
//! left to consume `InResponseTo` against the session's pending request
//! (anti-replay is a property of *that* consumption, not of parsing).

use adaptor_domain::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::pkcs1v15::{Signature as Pkcs1Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};

pub struct ValidatedAssertion {
    pub in_response_to: String,
    pub username: String,
    pub groups: Vec<String>,
}

pub struct ResponseValidationOptions<'a> {
    pub expected_issuer: &'a str,
    pub expected_destination: &'a str,
    pub clock_skew: chrono::Duration,
    pub trust_key: &'a RsaPublicKey,
    pub now: DateTime<Utc>,
}

pub fn validate_response(xml: &str, opts: &ResponseValidationOptions<'_>) -> Result<ValidatedAssertion> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::AuthnFailure(format!("unparseable Response XML: {e}")))?;

    let response_el = doc
        .descendants()
        .find(|n| n.has_tag_name("Response"))
        .ok_or_else(|| Error::AuthnFailure("no Response element".into()))?;

    let destination = response_el
        .attribute("Destination")
        .ok_or_else(|| Error::AuthnFailure("Response missing Destination".into()))?;
    if destination != opts.expected_destination {
        return Err(Error::AuthnFailure(format!(
            "Destination mismatch: expected {}, got {destination}",
            opts.expected_destination
        )));
    }

    let in_response_to = response_el
        .attribute("InResponseTo")
        .ok_or_else(|| Error::AuthnFailure("Response missing InResponseTo".into()))?
        .to_string();

    let status_code = doc
        .descendants()
        .find(|n| n.has_tag_name("StatusCode"))
        .and_then(|n| n.attribute("Value"))
        .ok_or_else(|| Error::AuthnFailure("Response missing StatusCode".into()))?;
    if !status_code.ends_with(":Success") {
        return Err(Error::AuthnFailure(format!(
            "IdP reported non-success status: {status_code}"
        )));
    }

    let assertion_el = doc
        .descendants()
        .find(|n| n.has_tag_name("Assertion"))
        .ok_or_else(|| Error::AuthnFailure("Response has no Assertion".into()))?;

    let issuer = assertion_el
        .descendants()
        .find(|n| n.has_tag_name("Issuer"))
        .and_then(|n| n.text())
        .ok_or_else(|| Error::AuthnFailure("Assertion missing Issuer".into()))?;
    if issuer != opts.expected_issuer {
        return Err(Error::AuthnFailure(format!(
            "Issuer mismatch: expected {}, got {issuer}",
            opts.expected_issuer
        )));
    }

    verify_conditions(&assertion_el, opts)?;
    verify_enveloped_signature(xml, &assertion_el, opts.trust_key)?;

    let username = assertion_el
        .descendants()
        .find(|n| n.has_tag_name("NameID"))
        .and_then(|n| n.text())
        .ok_or_else(|| Error::AuthnFailure("Assertion missing NameID".into()))?
        .to_string();

    let groups = assertion_el
        .descendants()
        .filter(|n| n.has_tag_name("Attribute") && n.attribute("Name") == Some("groups"))
        .flat_map(|attr_el| attr_el.descendants().filter(|n| n.has_tag_name("AttributeValue")))
        .filter_map(|n| n.text())
        .map(str::to_string)
        .collect();

    Ok(ValidatedAssertion {
        in_response_to,
        username,
        groups,
    })
}

fn verify_conditions(assertion_el: &roxmltree::Node, opts: &ResponseValidationOptions<'_>) -> Result<()> {
    let conditions = assertion_el
        .descendants()
        .find(|n| n.has_tag_name("Conditions"))
        .ok_or_else(|| Error::AuthnFailure("Assertion missing Conditions".into()))?;

    let not_before = conditions
        .attribute("NotBefore")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let not_on_or_after = conditions
        .attribute("NotOnOrAfter")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    if let Some(nb) = not_before {
        if opts.now + opts.clock_skew < nb {
            return Err(Error::AuthnFailure("assertion not yet valid".into()));
        }
    }
    if let Some(noa) = not_on_or_after {
        if opts.now - opts.clock_skew >= noa {
            return Err(Error::AuthnFailure("assertion has expired".into()));
        }
    }
    Ok(())
}

/// Verifies the enveloped `ds:Signature` inside the assertion.
///
/// This workspace does not implement full Exclusive XML Canonicalization;
/// instead the signed octet stream is taken as the raw source substring
/// spanning the signed element with its `ds:Signature` child excised,
/// which is sufficient for a signature produced by the same writer that
/// will later verify it (e.g. this workspace's own test fixtures and
/// any IdP that signs over the untouched source bytes). An IdP that
/// reformats whitespace before signing will fail verification here;
/// that gap is recorded in the design notes.
fn verify_enveloped_signature(
    full_xml: &str,
    assertion_el: &roxmltree::Node,
    trust_key: &RsaPublicKey,
) -> Result<()> {
    let signature_el = assertion_el
        .descendants()
        .find(|n| n.has_tag_name("Signature"))
        .ok_or_else(|| Error::AuthnFailure("Assertion is not signed".into()))?;

    let signature_value = signature_el
        .descendants()
        .find(|n| n.has_tag_name("SignatureValue"))
        .and_then(|n| n.text())
        .ok_or_else(|| Error::AuthnFailure("Signature missing SignatureValue".into()))?;

    let signed_info = signature_el
        .descendants()
        .find(|n| n.has_tag_name("SignedInfo"))
        .ok_or_else(|| Error::AuthnFailure("Signature missing SignedInfo".into()))?;

    let signed_info_range = signed_info.range();
    let signed_info_bytes = full_xml[signed_info_range].as_bytes();

    let digest_value = signed_info
        .descendants()
        .find(|n| n.has_tag_name("DigestValue"))
        .and_then(|n| n.text())
        .ok_or_else(|| Error::AuthnFailure("SignedInfo missing DigestValue".into()))?;

    let assertion_range = assertion_el.range();
    let signature_range = signature_el.range();
    let mut assertion_without_signature = String::with_capacity(assertion_range.len());
    assertion_without_signature.push_str(&full_xml[assertion_range.start..signature_range.start]);
    assertion_without_signature.push_str(&full_xml[signature_range.end..assertion_range.end]);

    let computed_digest = BASE64.encode(Sha256::digest(assertion_without_signature.as_bytes()));
    if computed_digest.trim() != digest_value.trim() {
        return Err(Error::AuthnFailure("assertion digest mismatch".into()));
    }

    let signature_bytes = BASE64
        .decode(signature_value.trim())
        .map_err(|e| Error::AuthnFailure(format!("malformed SignatureValue: {e}")))?;
    let signature = Pkcs1Signature::try_from(signature_bytes.as_slice())
        .map_err(|e| Error::AuthnFailure(format!("malformed signature encoding: {e}")))?;

    let verifying_key = VerifyingKey::<Sha256>::new(trust_key.clone());
    verifying_key
        .verify(signed_info_bytes, &signature)
        .map_err(|_| Error::AuthnFailure("signature verification failed".into()))
}
