//! SAML 2.0 web-browser SSO: SP-initiated redirect plus the assertion
//! consumer POST handler.

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use adaptor_domain::{Principal, TraceEvent};
use adaptor_sessions::{mint_cookie, parse_cookie_value, COOKIE_NAME};
use adaptor_saml::{build_authn_request, encode_redirect_url, validate_response, ResponseValidationOptions};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    /// The content URL the caller was trying to reach before being
    /// bounced here; round-tripped through the IdP as `RelayState` so
    /// the assertion consumer can send the browser back to it.
    pub return_to: Option<String>,
}

/// Begins SP-initiated SSO: mints a session (or reuses the caller's),
/// stashes the AuthnRequest id as pending, and redirects the browser to
/// the IdP.
pub async fn start_login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
    jar: CookieJar,
) -> Response {
    let config = state.config_snapshot();

    let session = match jar
        .get(COOKIE_NAME)
        .and_then(|c| parse_cookie_value(c.value()))
        .and_then(|id| state.sessions.get_session(id))
    {
        Some(existing) => existing,
        None => state.sessions.create_session(),
    };

    let acs_url = format!(
        "https://{}{}",
        config.server.host, config.saml.acs_path
    );
    let request = build_authn_request(&config.saml.entity_id, &acs_url, &config.saml.idp_sso_url);
    session.begin_saml_authn(&request.id);

    let redirect_url = match encode_redirect_url(
        &config.saml.idp_sso_url,
        &request,
        params.return_to.as_deref(),
        &state.saml_sp_key,
    ) {
        Ok(url) => url,
        Err(err) => {
            tracing::error!(error = %err, "failed to build SAML redirect");
            return (StatusCode::INTERNAL_SERVER_ERROR, "SAML error").into_response();
        }
    };

    let cookie = mint_cookie(session.id, config.server.tls.is_some());
    let jar = jar.add(cookie);
    (jar, Redirect::to(&redirect_url)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct AcsForm {
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// Handles the IdP's POST back to the assertion consumer service.
pub async fn assertion_consumer(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<AcsForm>,
) -> Response {
    let session = match jar
        .get(COOKIE_NAME)
        .and_then(|c| parse_cookie_value(c.value()))
        .and_then(|id| state.sessions.get_session(id))
    {
        Some(session) => session,
        None => {
            return (StatusCode::BAD_REQUEST, "no session in progress").into_response();
        }
    };

    let xml_bytes = match BASE64.decode(form.saml_response.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::BAD_REQUEST, "malformed SAMLResponse").into_response(),
    };
    let xml = match String::from_utf8(xml_bytes) {
        Ok(xml) => xml,
        Err(_) => return (StatusCode::BAD_REQUEST, "SAMLResponse is not valid UTF-8").into_response(),
    };

    let config = state.config_snapshot();
    let acs_url = format!("https://{}{}", config.server.host, config.saml.acs_path);
    let opts = ResponseValidationOptions {
        expected_issuer: &config.saml.idp_entity_id,
        expected_destination: &acs_url,
        clock_skew: chrono::Duration::seconds(config.saml.clock_skew_secs),
        trust_key: &state.saml_idp_key,
        now: chrono::Utc::now(),
    };

    let assertion = match validate_response(&xml, &opts) {
        Ok(assertion) => assertion,
        Err(err) => {
            session.clear_saml_in_flight();
            TraceEvent::AuthnFailed { reason: &err.to_string() }.emit();
            return (StatusCode::FORBIDDEN, format!("SAML validation failed: {err}")).into_response();
        }
    };

    if session
        .take_saml_in_flight_if_matches(&assertion.in_response_to)
        .is_none()
    {
        session.clear_saml_in_flight();
        TraceEvent::AuthnFailed { reason: "InResponseTo did not match a pending request" }.emit();
        return (StatusCode::FORBIDDEN, "unsolicited or replayed SAML response").into_response();
    }

    session.set_principal(Principal {
        username: assertion.username.clone(),
        groups: assertion.groups,
        password: None,
    });
    TraceEvent::AuthnSucceeded {
        session_id: &session.id.to_string(),
        username: &assertion.username,
    }
    .emit();

    match form.relay_state {
        Some(target) => Redirect::to(&target).into_response(),
        None => StatusCode::OK.into_response(),
    }
}
