//! Batch SAML authorization endpoint: one SOAP POST answering many
//! `Resource` URLs at once.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use adaptor_domain::{AuthzDecision, DocId, Principal};
use adaptor_saml::{compose_authz_response, parse_authz_batch};

use crate::state::AppState;

pub async fn batch_authorize(State(state): State<AppState>, body: String) -> Response {
    let queries = match parse_authz_batch(&body) {
        Ok(queries) => queries,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, format!("malformed AuthzDecisionQuery: {err}"))
                .into_response()
        }
    };

    let config = state.config_snapshot();
    let mut query_pairs: Vec<(Option<Principal>, DocId)> = Vec::with_capacity(queries.len());
    let mut decisions = vec![AuthzDecision::Indeterminate; queries.len()];
    let mut decidable_indices = Vec::new();

    for (i, query) in queries.iter().enumerate() {
        match state.codec.decode(&doc_path(&query.resource)) {
            Ok(doc_id) => {
                let principal = if query.subject.is_empty() {
                    None
                } else {
                    Some(Principal::new(query.subject.clone()))
                };
                query_pairs.push((principal, doc_id));
                decidable_indices.push(i);
            }
            Err(_) => {
                // Outside the codec's base path or malformed: remains
                // Indeterminate, matching spec.md's "unknown DocId"
                // handling.
            }
        }
    }

    if !query_pairs.is_empty() {
        let batch_decisions = state.adaptor.is_user_authorized_batch(&query_pairs).await;
        for (idx, decision) in decidable_indices.into_iter().zip(batch_decisions) {
            decisions[idx] = decision;
        }
    }

    let xml = compose_authz_response(&config.saml.entity_id, &queries, &decisions);
    ([(axum::http::header::CONTENT_TYPE, "text/xml")], xml).into_response()
}

/// The `Resource` attribute is a full URL; only the path component is
/// meaningful to the DocId codec.
fn doc_path(resource: &str) -> String {
    match resource.find("://") {
        Some(scheme_sep) => {
            let scheme_end = scheme_sep + 3;
            match resource[scheme_end..].find('/') {
                Some(offset) => resource[scheme_end + offset..].to_string(),
                None => resource.to_string(),
            }
        }
        None => resource.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_path_strips_scheme_and_host() {
        assert_eq!(doc_path("https://adaptor.example.com/doc/a%20b"), "/doc/a%20b");
    }

    #[test]
    fn doc_path_passes_through_bare_paths() {
        assert_eq!(doc_path("/doc/a"), "/doc/a");
    }
}
