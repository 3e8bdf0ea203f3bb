use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::session_id::SessionId;

pub const COOKIE_NAME: &str = "ADAPTOR_SESSION";

/// Builds the `Set-Cookie` value for a freshly minted or refreshed
/// session. `secure` should track `server.tls.is_some()` — a cookie
/// marked `Secure` over plain HTTP is simply never sent, which is a
/// confusing failure mode to hit by accident in a dev deployment.
pub fn mint_cookie(id: SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Parses a session id out of a cookie jar's value for [`COOKIE_NAME`].
/// Any malformed value is treated the same as "no cookie" rather than
/// surfaced as an error — an expired or tampered cookie should just
/// result in a fresh anonymous session, not a request failure.
pub fn parse_cookie_value(value: &str) -> Option<SessionId> {
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_cookie_carries_expected_flags() {
        let id = SessionId::generate();
        let cookie = mint_cookie(id, true);
        assert_eq!(cookie.name(), COOKIE_NAME);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn parse_cookie_value_roundtrips_minted_id() {
        let id = SessionId::generate();
        let cookie = mint_cookie(id, false);
        let parsed = parse_cookie_value(cookie.value()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_cookie_value_rejects_garbage() {
        assert!(parse_cookie_value("garbage").is_none());
    }
}
