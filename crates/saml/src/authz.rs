//! Batch SAML authorization: parses an inbound SOAP-wrapped
//! `AuthzDecisionQuery` and composes the matching
//! `AuthzDecisionStatement` response, preserving query order.

use adaptor_domain::error::{Error, Result};
use adaptor_domain::AuthzDecision;

use crate::xml_writer::XmlWriter;

/// One query extracted from the batch: the subject and the resource
/// URL being checked.
#[derive(Debug, Clone)]
pub struct AuthzQuery {
    pub subject: String,
    pub resource: String,
}

/// Parses a SOAP-enveloped batch `AuthzDecisionQuery` request,
/// returning one [`AuthzQuery`] per `<samlp:AuthzDecisionQuery>` element
/// in document order — order is preserved so the caller can zip the
/// parsed queries back up with the decisions it computes.
pub fn parse_authz_batch(xml: &str) -> Result<Vec<AuthzQuery>> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::Other(format!("unparseable AuthzDecisionQuery batch: {e}")))?;

    let mut queries = Vec::new();
    for query_el in doc.descendants().filter(|n| n.has_tag_name("AuthzDecisionQuery")) {
        let resource = query_el
            .attribute("Resource")
            .ok_or_else(|| Error::Other("AuthzDecisionQuery missing Resource".into()))?
            .to_string();
        let subject = query_el
            .descendants()
            .find(|n| n.has_tag_name("NameID"))
            .and_then(|n| n.text())
            .ok_or_else(|| Error::Other("AuthzDecisionQuery missing Subject/NameID".into()))?
            .to_string();
        queries.push(AuthzQuery { subject, resource });
    }
    if queries.is_empty() {
        return Err(Error::Other("batch contained no AuthzDecisionQuery elements".into()));
    }
    Ok(queries)
}

fn decision_str(decision: AuthzDecision) -> &'static str {
    match decision {
        AuthzDecision::Permit => "Permit",
        AuthzDecision::Deny => "Deny",
        AuthzDecision::Indeterminate => "Indeterminate",
    }
}

/// Composes the SOAP-enveloped batch response. `queries` and
/// `decisions` must be the same length and in the same order as
/// returned by [`parse_authz_batch`].
pub fn compose_authz_response(
    issuer: &str,
    queries: &[AuthzQuery],
    decisions: &[AuthzDecision],
) -> String {
    let mut w = XmlWriter::new();
    w.open_tag(
        "soap11:Envelope",
        &[("xmlns:soap11", "http://schemas.xmlsoap.org/soap/envelope/")],
    );
    w.open_tag("soap11:Body", &[]);
    w.open_tag(
        "samlp:Response",
        &[
            ("xmlns:samlp", "urn:oasis:names:tc:SAML:2.0:protocol"),
            ("xmlns:saml", "urn:oasis:names:tc:SAML:2.0:assertion"),
            ("Version", "2.0"),
        ],
    );
    w.open_tag("saml:Issuer", &[]).text(issuer).close_tag("saml:Issuer");

    for (query, decision) in queries.iter().zip(decisions.iter()) {
        w.open_tag("saml:Assertion", &[]);
        w.open_tag("saml:Subject", &[]);
        w.open_tag("saml:NameID", &[]).text(&query.subject).close_tag("saml:NameID");
        w.close_tag("saml:Subject");
        w.open_tag(
            "saml:AuthzDecisionStatement",
            &[
                ("Resource", &query.resource),
                ("Decision", decision_str(*decision)),
            ],
        );
        w.open_tag("saml:Action", &[("Namespace", "urn:oasis:names:tc:SAML:1.0:action:ghpp")])
            .text("GET")
            .close_tag("saml:Action");
        w.close_tag("saml:AuthzDecisionStatement");
        w.close_tag("saml:Assertion");
    }

    w.close_tag("samlp:Response");
    w.close_tag("soap11:Body");
    w.close_tag("soap11:Envelope");
    w.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH_XML: &str = r#"
        <soap11:Envelope xmlns:soap11="http://schemas.xmlsoap.org/soap/envelope/">
          <soap11:Body>
            <samlp:AuthzDecisionQuery xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
                                      xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
                                      Resource="https://adaptor/doc/a">
              <saml:Subject><saml:NameID>alice</saml:NameID></saml:Subject>
            </samlp:AuthzDecisionQuery>
            <samlp:AuthzDecisionQuery xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
                                      xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
                                      Resource="https://adaptor/doc/b">
              <saml:Subject><saml:NameID>alice</saml:NameID></saml:Subject>
            </samlp:AuthzDecisionQuery>
          </soap11:Body>
        </soap11:Envelope>
    "#;

    #[test]
    fn parses_queries_in_document_order() {
        let queries = parse_authz_batch(BATCH_XML).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].resource, "https://adaptor/doc/a");
        assert_eq!(queries[1].resource, "https://adaptor/doc/b");
        assert_eq!(queries[0].subject, "alice");
    }

    #[test]
    fn empty_batch_is_rejected() {
        let xml = r#"<soap11:Envelope xmlns:soap11="http://schemas.xmlsoap.org/soap/envelope/"><soap11:Body/></soap11:Envelope>"#;
        assert!(parse_authz_batch(xml).is_err());
    }

    #[test]
    fn response_preserves_decision_order() {
        let queries = parse_authz_batch(BATCH_XML).unwrap();
        let decisions = vec![AuthzDecision::Permit, AuthzDecision::Deny];
        let xml = compose_authz_response("urn:adaptor:sp", &queries, &decisions);
        let first_decision_pos = xml.find("Decision=\"Permit\"").unwrap();
        let second_decision_pos = xml.find("Decision=\"Deny\"").unwrap();
        assert!(first_decision_pos < second_decision_pos);
    }
}
