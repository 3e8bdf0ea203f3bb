//! Enforces `server.require_client_cert_paths`: TLS itself only
//! *requests* a client certificate (spec.md §9's conservative
//! enhancement), so a handful of paths can additionally demand one.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;
use crate::tls::ClientCertPresented;

pub async fn require_client_cert(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let config = state.config_snapshot();
    let path = request.uri().path();

    if path_requires_cert(&config.server.require_client_cert_paths, path) {
        let presented = request
            .extensions()
            .get::<ClientCertPresented>()
            .map(|c| c.0)
            .unwrap_or(false);
        if !presented {
            return (StatusCode::FORBIDDEN, "client certificate required").into_response();
        }
    }

    next.run(request).await
}

fn path_requires_cert(require_paths: &[String], path: &str) -> bool {
    require_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_under_a_required_prefix_requires_a_cert() {
        let paths = vec!["/saml-authz".to_string()];
        assert!(path_requires_cert(&paths, "/saml-authz"));
    }

    #[test]
    fn unrelated_path_does_not_require_a_cert() {
        let paths = vec!["/saml-authz".to_string()];
        assert!(!path_requires_cert(&paths, "/doc/abc123"));
    }

    #[test]
    fn empty_requirement_list_never_requires_a_cert() {
        assert!(!path_requires_cert(&[], "/saml-authz"));
    }
}
