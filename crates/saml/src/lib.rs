//! SAML 2.0 SP-side web-browser SSO and batch authorization.

pub mod authn;
pub mod authz;
pub mod keys;
pub mod response;
mod xml_writer;

pub use authn::{build_authn_request, encode_redirect_url, AuthnRequest};
pub use authz::{compose_authz_response, parse_authz_batch, AuthzQuery};
pub use keys::{load_private_key_pem, load_public_key_from_cert_pem};
pub use response::{validate_response, ResponseValidationOptions, ValidatedAssertion};
