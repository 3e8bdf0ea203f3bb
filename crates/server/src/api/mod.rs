pub mod document;
pub mod health;
pub mod saml_authn;
pub mod saml_authz;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::client_cert_mw::require_client_cert;
use crate::state::AppState;

/// Builds the full router. Every path here is fixed by the protocol
/// (the Appliance, not this adaptor, decides where to POST/GET), so
/// there is no dynamic route registration the way an operator-facing
/// API might have.
pub fn router(state: AppState) -> Router {
    let config = state.config_snapshot();

    let document_routes = Router::new()
        .route(&format!("{}*rest", config.server.doc_id_path), get(document::get_document));

    let saml_routes = Router::new()
        .route(&config.saml.acs_path, post(saml_authn::assertion_consumer))
        .route(&config.saml.authz_path, post(saml_authz::batch_authorize))
        .route("/saml/login", get(saml_authn::start_login));

    let health_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/admin/journal", get(health::journal_snapshot));

    Router::new()
        .merge(document_routes)
        .merge(saml_routes)
        .merge(health_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, require_client_cert))
}
