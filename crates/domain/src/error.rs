/// Shared error type used across all adaptor-toolkit crates.
///
/// Variant names track the error taxonomy in the error-handling design:
/// transient vs. permanent I/O, malformed inbound identifiers, SAML
/// failures, and adaptor-side faults each get their own arm so callers
/// can match on them without string-sniffing.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Network hiccup talking to the Appliance; the caller should retry.
    #[error("transient I/O: {0}")]
    TransientIo(String),

    /// 4xx or malformed response from the Appliance; retries are exhausted
    /// or pointless.
    #[error("permanent I/O: {0}")]
    PermanentIo(String),

    /// An inbound path did not decode to a valid DocId.
    #[error("malformed document id: {0}")]
    MalformedId(String),

    /// SAML assertion failed validation (signature, timing, replay, mismatch).
    #[error("SAML authentication failure: {0}")]
    AuthnFailure(String),

    /// A valid principal was denied access to a resource.
    #[error("authorization denied")]
    AuthzDenied,

    /// The adaptor implementation raised an error outside "not found".
    #[error("adaptor fault: {0}")]
    AdaptorFault(String),

    /// Startup-time error; the process should not continue running.
    #[error("fatal startup error: {0}")]
    Fatal(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
