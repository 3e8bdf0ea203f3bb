//! Loads the RSA keypair and trust certificate used for XML-DSig and
//! HTTP-Redirect "simple signing".

use adaptor_domain::error::{Error, Result};
use pkcs8::DecodePrivateKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::der::{Decode, Encode};

pub fn load_private_key_pem(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|e| Error::Fatal(format!("failed to parse SP private key: {e}")))
}

/// Extracts the RSA public key from an X.509 certificate's
/// SubjectPublicKeyInfo, used both to verify the IdP's signature on an
/// inbound `Response` and, in tests, to verify this process's own
/// outbound signatures.
pub fn load_public_key_from_cert_pem(pem: &str) -> Result<RsaPublicKey> {
    let der = pem_to_der(pem)?;
    let cert = x509_cert::Certificate::from_der(&der)
        .map_err(|e| Error::Fatal(format!("failed to parse certificate: {e}")))?;
    let spki = cert.tbs_certificate.subject_public_key_info;
    let spki_der = spki
        .to_der()
        .map_err(|e| Error::Fatal(format!("failed to re-encode SPKI: {e}")))?;
    RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| Error::Fatal(format!("certificate does not hold an RSA public key: {e}")))
}

fn pem_to_der(pem: &str) -> Result<Vec<u8>> {
    let (_, doc) = pkcs8::der::pem::decode_vec(pem.as_bytes())
        .map_err(|e| Error::Fatal(format!("failed to decode PEM: {e}")))?;
    Ok(doc)
}
