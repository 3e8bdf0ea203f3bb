//! Codec between [`DocId`] and the URL path the Appliance fetches it at.
//!
//! Encoding is percent-encoding over a fixed unreserved set, framed
//! under a configurable base path. This is a small, heavily tested,
//! single-purpose crate so the round-trip invariant (`decode(encode(id))
//! == id`) can be checked in isolation from the HTTP layer that uses it.

use adaptor_domain::DocId;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters percent-encoding must leave alone: RFC 3986 unreserved
/// marks, plus `/` is deliberately *not* in this set since a DocId may
/// itself contain path-like segments that should round-trip as literal
/// percent-escapes rather than additional path segments.
const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("path does not start with base path")]
    OutsideBasePath,
    #[error("decoded DocId was empty")]
    EmptyAfterDecode,
    #[error("path segment is not valid UTF-8")]
    InvalidUtf8,
}

/// Frames DocIds under a fixed base path, e.g. `/doc/`.
#[derive(Debug, Clone)]
pub struct DocIdCodec {
    base_path: String,
}

impl DocIdCodec {
    /// `base_path` is normalized to always start and end with `/`.
    pub fn new(base_path: impl AsRef<str>) -> Self {
        let mut base = base_path.as_ref().to_string();
        if !base.starts_with('/') {
            base.insert(0, '/');
        }
        if !base.ends_with('/') {
            base.push('/');
        }
        Self { base_path: base }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Builds the full URL path at which the Appliance can fetch `id`.
    pub fn encode(&self, id: &DocId) -> String {
        let escaped = utf8_percent_encode(id.as_str(), ENCODE_SET).to_string();
        format!("{}{}", self.base_path, escaped)
    }

    /// Reverses [`DocIdCodec::encode`]. `path` must include the base
    /// path prefix (as an incoming HTTP request path would).
    pub fn decode(&self, path: &str) -> Result<DocId, CodecError> {
        let rest = path
            .strip_prefix(&self.base_path)
            .ok_or(CodecError::OutsideBasePath)?;
        let decoded = percent_decode_str(rest)
            .decode_utf8()
            .map_err(|_| CodecError::InvalidUtf8)?;
        DocId::try_from(decoded.into_owned()).map_err(|_| CodecError::EmptyAfterDecode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> DocIdCodec {
        DocIdCodec::new("/doc/")
    }

    #[test]
    fn base_path_is_normalized() {
        let c = DocIdCodec::new("doc");
        assert_eq!(c.base_path(), "/doc/");
    }

    #[test]
    fn round_trips_simple_id() {
        let c = codec();
        let id = DocId::try_from("report-42").unwrap();
        let encoded = c.encode(&id);
        assert_eq!(c.decode(&encoded).unwrap(), id);
    }

    #[test]
    fn round_trips_id_with_reserved_characters() {
        let c = codec();
        let id = DocId::try_from("folder/sub folder/report #3?.pdf").unwrap();
        let encoded = c.encode(&id);
        assert!(!encoded.contains(' '));
        assert_eq!(c.decode(&encoded).unwrap(), id);
    }

    #[test]
    fn decode_rejects_path_outside_base() {
        let c = codec();
        assert_eq!(
            c.decode("/other/report-42").unwrap_err(),
            CodecError::OutsideBasePath
        );
    }

    #[test]
    fn decode_rejects_empty_remainder() {
        let c = codec();
        assert_eq!(c.decode("/doc/").unwrap_err(), CodecError::EmptyAfterDecode);
    }

    #[test]
    fn encode_is_deterministic() {
        let c = codec();
        let id = DocId::try_from("same/id").unwrap();
        assert_eq!(c.encode(&id), c.encode(&id));
    }
}
