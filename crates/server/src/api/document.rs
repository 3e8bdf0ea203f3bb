//! Document content handler: RECV → DECODE → AUTHZ → INVOKE-ADAPTOR → EMIT.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, OriginalUri, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use adaptor_domain::{AuthzDecision, DocOutcome, DocRequest, TraceEvent};
use adaptor_sessions::{mint_cookie, parse_cookie_value, COOKIE_NAME};

use crate::state::AppState;

pub async fn get_document(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    // DECODE
    let doc_id = match state.codec.decode(uri.path()) {
        Ok(id) => id,
        Err(err) => {
            return (StatusCode::NOT_FOUND, format!("malformed document id: {err}")).into_response()
        }
    };

    // AUTHZ: IP allow-list gate.
    if !state.ip_allowlist.is_allowed(addr.ip()) {
        return (StatusCode::FORBIDDEN, "client IP not allow-listed").into_response();
    }

    // Resolve principal from the session cookie, if any. No cookie or
    // an unresolvable session means an anonymous request, not an error.
    let principal = jar
        .get(COOKIE_NAME)
        .and_then(|c| parse_cookie_value(c.value()))
        .and_then(|id| state.sessions.get_session(id))
        .and_then(|session| session.principal());

    // AUTHZ: establish security class against the anonymous identity
    // first. A document that PERMITs anonymous is public — skip any
    // authenticated re-check and proceed straight to INVOKE-ADAPTOR,
    // even if the caller happens to carry a principal that would
    // individually be denied.
    let anonymous_decision = state.adaptor.is_user_authorized(None, &doc_id).await;
    if !anonymous_decision.is_permit() {
        let decision = state
            .adaptor
            .is_user_authorized(principal.as_ref(), &doc_id)
            .await;
        TraceEvent::AuthzDecision {
            doc_id: &doc_id,
            username: principal.as_ref().map(|p| p.username.as_str()),
            permit: decision.is_permit(),
        }
        .emit();
        if !decision.is_permit() {
            state.journal.record_authz_denied();
            return unauthorized_response(principal.is_some(), uri.path());
        }
    } else {
        TraceEvent::AuthzDecision {
            doc_id: &doc_id,
            username: principal.as_ref().map(|p| p.username.as_str()),
            permit: true,
        }
        .emit();
    }

    // INVOKE-ADAPTOR
    let if_modified_since = parse_if_modified_since(&headers);
    let req = DocRequest {
        doc_id: doc_id.clone(),
        if_modified_since,
    };

    let started = std::time::Instant::now();
    let result = state.adaptor.get_doc_content(&req).await;
    state.journal.record_latency(started.elapsed());

    let content = match result {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(doc_id = %doc_id, error = %err, "adaptor raised an error serving content");
            return (StatusCode::INTERNAL_SERVER_ERROR, "adaptor error").into_response();
        }
    };

    // EMIT
    match content.outcome {
        DocOutcome::NotFound => {
            state.journal.record_doc_not_found();
            TraceEvent::DocServed { doc_id: &doc_id, status: "404" }.emit();
            (StatusCode::NOT_FOUND, "document not found").into_response()
        }
        DocOutcome::NotModified => {
            state.journal.record_doc_not_modified();
            TraceEvent::DocServed { doc_id: &doc_id, status: "304" }.emit();
            StatusCode::NOT_MODIFIED.into_response()
        }
        DocOutcome::Found { body, content_type } => {
            state.journal.record_doc_served();
            TraceEvent::DocServed { doc_id: &doc_id, status: "200" }.emit();
            let mut response = Response::builder().status(StatusCode::OK);
            if let Some(ct) = content_type {
                response = response.header(header::CONTENT_TYPE, ct);
            }
            for (key, value) in content.metadata.iter() {
                let header_name = format!("X-Gsa-External-Metadata-{key}");
                let encoded = utf8_percent_encode(value, NON_ALPHANUMERIC).to_string();
                if let Ok(name) = header::HeaderName::from_bytes(header_name.as_bytes()) {
                    response = response.header(name, encoded);
                }
            }
            if let Some(acl) = &content.acl {
                response = response.header("X-Gsa-Serve-Security", "secure");
                let permit_users: Vec<_> = acl.permit_users.iter().cloned().collect();
                response = response.header(
                    "X-Gsa-External-Metadata-PermitUsers",
                    utf8_percent_encode(&permit_users.join(","), NON_ALPHANUMERIC).to_string(),
                );
            }
            match response.body(axum::body::Body::from(body)) {
                Ok(response) => response.into_response(),
                Err(err) => {
                    tracing::warn!(doc_id = %doc_id, error = %err, "failed to build document response");
                    (StatusCode::INTERNAL_SERVER_ERROR, "adaptor error").into_response()
                }
            }
        }
    }
}

fn parse_if_modified_since(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// A denial with a known principal is a flat 403 — re-authenticating
/// wouldn't change the outcome. A denial with no principal at all means
/// the request was never authenticated, so instead of a flat 401 we
/// bounce the browser into the SAML flow with `return_to` set to the
/// document it was trying to reach, so the ACS handler can send it
/// straight back once SSO completes.
fn unauthorized_response(has_principal: bool, original_path: &str) -> Response {
    if has_principal {
        (StatusCode::FORBIDDEN, "not authorized").into_response()
    } else {
        let return_to = utf8_percent_encode(original_path, NON_ALPHANUMERIC).to_string();
        Redirect::to(&format!("/saml/login?return_to={return_to}")).into_response()
    }
}

/// Mints a fresh session and sets its cookie on the response, used by
/// the SAML ACS handler once a principal is established. Kept here
/// since it is the document handler's own cookie contract.
pub fn with_session_cookie(jar: CookieJar, state: &AppState, secure: bool) -> (CookieJar, adaptor_sessions::SessionId) {
    let session = state.sessions.create_session();
    let cookie = mint_cookie(session.id, secure);
    (jar.add(cookie), session.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_modified_since_parses_rfc2822() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MODIFIED_SINCE, "Tue, 15 Nov 1994 08:12:31 GMT".parse().unwrap());
        assert!(parse_if_modified_since(&headers).is_some());
    }

    #[test]
    fn missing_if_modified_since_yields_none() {
        let headers = HeaderMap::new();
        assert!(parse_if_modified_since(&headers).is_none());
    }

    #[test]
    fn denial_with_known_principal_is_flat_forbidden() {
        let response = unauthorized_response(true, "/doc/secret");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn denial_with_no_principal_redirects_into_saml_login() {
        let response = unauthorized_response(false, "/doc/secret");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("/saml/login?return_to="));
        assert!(location.contains("%2Fdoc%2Fsecret"));
    }
}
