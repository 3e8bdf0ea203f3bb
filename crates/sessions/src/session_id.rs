use std::fmt;

use rand::RngCore;

/// A 128-bit, cryptographically random session identifier. The teacher
/// mints session ids with `Uuid::new_v4`, which draws from a CSPRNG
/// internally but is still nominally a "random UUID" rather than a
/// bearer-token-grade secret; here the raw bits are pulled directly
/// from `OsRng` and only formatted as a UUID for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u128);

impl SessionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(u128::from_be_bytes(bytes))
    }

    pub fn as_u128(self) -> u128 {
        self.0
    }

    pub fn shard_index(self, shard_count: usize) -> usize {
        (self.0 % shard_count as u128) as usize
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uuid = uuid::Uuid::from_u128(self.0);
        write!(f, "{uuid}")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed session id")]
pub struct ParseSessionIdError;

impl std::str::FromStr for SessionId {
    type Err = ParseSessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| ParseSessionIdError)?;
        Ok(Self(uuid.as_u128()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_then_parse_roundtrips() {
        let id = SessionId::generate();
        let text = id.to_string();
        let parsed: SessionId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn garbage_string_fails_to_parse() {
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn shard_index_is_bounded() {
        let id = SessionId::generate();
        assert!(id.shard_index(16) < 16);
    }
}
