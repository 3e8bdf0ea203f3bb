//! Builds the XML feed document pushed to the Appliance.

use adaptor_domain::docid::{Acl, DocIdRecord, NamedResource};
use adaptor_docid::DocIdCodec;

use crate::xml_writer::XmlWriter;

/// The feed's declared type, carried in the `<feedtype>` header element.
/// `FullReplace` defines the authoritative complete DocId set for a full
/// listing; `Incremental` carries additive changes (an incremental poll,
/// or an ACL-only named-resource push that never redefines the whole set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedType {
    FullReplace,
    Incremental,
}

impl FeedType {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedType::FullReplace => "full-replace",
            FeedType::Incremental => "incremental",
        }
    }
}

/// Serializes a batch of records into one `gsafeed` document.
///
/// Output is deterministic: record order is preserved from `records`,
/// and `last-modified` is rendered as RFC-1123 (the HTTP-date form the
/// Appliance expects), not RFC-2822 (`ts.to_rfc2822()` would emit a
/// numeric `+0000` offset instead of the literal `GMT` the feed DTD
/// wants). ACL principals are sorted before being written — see
/// `write_acl_fragment` — since they come out of `HashSet`s whose
/// iteration order is randomized per process.
pub fn compose_feed(
    datasource: &str,
    feedtype: FeedType,
    codec: &DocIdCodec,
    records: &[DocIdRecord],
) -> String {
    let mut w = XmlWriter::new();
    w.declaration("UTF-8");
    w.raw("<!DOCTYPE gsafeed PUBLIC \"-//Google//DTD GSA Feeds//EN\" \"gsafeed.dtd\">\n");
    w.open_tag("gsafeed", &[]);

    w.open_tag("header", &[]);
    w.open_tag("datasource", &[]).text(datasource).close_tag("datasource");
    w.open_tag("feedtype", &[]).text(feedtype.as_str()).close_tag("feedtype");
    w.close_tag("header");

    w.open_tag("group", &[]);
    for record in records {
        write_record(&mut w, codec, record);
    }
    w.close_tag("group");

    w.close_tag("gsafeed");
    w.into_string()
}

fn write_record(w: &mut XmlWriter, codec: &DocIdCodec, record: &DocIdRecord) {
    let url = codec.encode(&record.doc_id);
    let action = if record.delete { "delete" } else { "add" };

    let mut attrs = vec![("url", url.as_str()), ("action", action)];
    let last_modified = record
        .last_modified
        .map(|ts| ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
    if let Some(lm) = &last_modified {
        attrs.push(("last-modified", lm.as_str()));
    }
    let lock_str = if record.lock { "true" } else { "false" };
    if record.lock {
        attrs.push(("lock", lock_str));
    }
    let crawl_str = "now";
    if record.crawl_immediately {
        attrs.push(("crawl-immediately", crawl_str));
    }

    w.open_tag("record", &attrs);
    w.close_tag("record");
}

/// Serializes a batch of [`NamedResource`]s into one `gsafeed` document,
/// each record carrying an inline `<acl>` fragment instead of content —
/// this is the wire format `push_named_resources` sends, propagating
/// ACL inheritance roots independent of any document push.
pub fn compose_named_resources_feed(
    datasource: &str,
    codec: &DocIdCodec,
    resources: &[NamedResource],
) -> String {
    let mut w = XmlWriter::new();
    w.declaration("UTF-8");
    w.raw("<!DOCTYPE gsafeed PUBLIC \"-//Google//DTD GSA Feeds//EN\" \"gsafeed.dtd\">\n");
    w.open_tag("gsafeed", &[]);

    w.open_tag("header", &[]);
    w.open_tag("datasource", &[]).text(datasource).close_tag("datasource");
    w.open_tag("feedtype", &[])
        .text(FeedType::Incremental.as_str())
        .close_tag("feedtype");
    w.close_tag("header");

    w.open_tag("group", &[]);
    for resource in resources {
        let url = codec.encode(&resource.doc_id);
        w.open_tag("record", &[("url", url.as_str()), ("action", "add")]);
        write_acl_fragment(&mut w, &resource.acl);
        w.close_tag("record");
    }
    w.close_tag("group");

    w.close_tag("gsafeed");
    w.into_string()
}

/// Serializes a single ACL-bearing named resource, used by the ACL-push
/// path (inheritance roots pushed independent of document content).
///
/// `Acl`'s principal fields are `HashSet`s, whose iteration order is
/// randomized per process (`RandomState`) — emitting them as-is would
/// make the feed byte stream non-deterministic across runs, violating
/// spec §4.4. Each set is sorted before writing so the same `Acl`
/// always produces the same XML.
pub fn write_acl_fragment(w: &mut XmlWriter, acl: &Acl) {
    w.open_tag("acl", &[]);
    for user in sorted(&acl.permit_users) {
        w.open_tag("principal", &[("scope", "user"), ("access", "permit")])
            .text(user)
            .close_tag("principal");
    }
    for user in sorted(&acl.deny_users) {
        w.open_tag("principal", &[("scope", "user"), ("access", "deny")])
            .text(user)
            .close_tag("principal");
    }
    for group in sorted(&acl.permit_groups) {
        w.open_tag("principal", &[("scope", "group"), ("access", "permit")])
            .text(group)
            .close_tag("principal");
    }
    for group in sorted(&acl.deny_groups) {
        w.open_tag("principal", &[("scope", "group"), ("access", "deny")])
            .text(group)
            .close_tag("principal");
    }
    w.close_tag("acl");
}

fn sorted(set: &std::collections::HashSet<String>) -> Vec<&str> {
    let mut v: Vec<&str> = set.iter().map(String::as_str).collect();
    v.sort_unstable();
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptor_domain::docid::DocId;

    fn codec() -> DocIdCodec {
        DocIdCodec::new("/doc/")
    }

    #[test]
    fn composes_header_with_datasource_and_feedtype() {
        let xml = compose_feed("docs", FeedType::FullReplace, &codec(), &[]);
        assert!(xml.contains("<datasource>docs</datasource>"));
        assert!(xml.contains("<feedtype>full-replace</feedtype>"));
    }

    #[test]
    fn incremental_feedtype_is_distinct_from_full_replace() {
        let xml = compose_feed("docs", FeedType::Incremental, &codec(), &[]);
        assert!(xml.contains("<feedtype>incremental</feedtype>"));
    }

    #[test]
    fn record_action_reflects_delete_flag() {
        let mut rec = DocIdRecord::new(DocId::try_from("a").unwrap());
        rec.delete = true;
        let xml = compose_feed("docs", FeedType::FullReplace, &codec(), &[rec]);
        assert!(xml.contains("action=\"delete\""));
    }

    #[test]
    fn record_url_uses_codec_encoding() {
        let rec = DocIdRecord::new(DocId::try_from("a b").unwrap());
        let xml = compose_feed("docs", FeedType::FullReplace, &codec(), &[rec]);
        assert!(xml.contains("/doc/a%20b"));
    }

    #[test]
    fn composition_is_deterministic_for_same_input() {
        let rec = DocIdRecord::new(DocId::try_from("a").unwrap());
        let first = compose_feed("docs", FeedType::FullReplace, &codec(), &[rec.clone()]);
        let second = compose_feed("docs", FeedType::FullReplace, &codec(), &[rec]);
        assert_eq!(first, second);
    }

    #[test]
    fn named_resource_feed_emits_inline_acl() {
        use adaptor_domain::docid::NamedResource;
        use std::collections::HashSet;

        let mut acl = Acl::default();
        acl.permit_users = HashSet::from(["alice".to_string()]);
        let resource = NamedResource {
            doc_id: DocId::try_from("root").unwrap(),
            acl,
        };
        let xml = compose_named_resources_feed("docs", &codec(), &[resource]);
        assert!(xml.contains("<acl>"));
        assert!(xml.contains("scope=\"user\""));
        assert!(xml.contains("alice"));
    }

    #[test]
    fn last_modified_is_rendered_as_rfc1123_not_rfc2822() {
        use chrono::{TimeZone, Utc};

        let mut rec = DocIdRecord::new(DocId::try_from("a").unwrap());
        rec.last_modified = Some(Utc.with_ymd_and_hms(2003, 7, 1, 10, 52, 37).unwrap());
        let xml = compose_feed("docs", FeedType::FullReplace, &codec(), &[rec]);
        assert!(xml.contains(r#"last-modified="Tue, 01 Jul 2003 10:52:37 GMT""#));
        assert!(!xml.contains("+0000"));
    }

    #[test]
    fn acl_principal_order_is_deterministic_regardless_of_hashset_order() {
        use std::collections::HashSet;

        let mut acl = Acl::default();
        acl.permit_users = HashSet::from([
            "zara".to_string(),
            "alice".to_string(),
            "mallory".to_string(),
        ]);
        let xml = compose_named_resources_feed(
            "docs",
            &codec(),
            &[NamedResource {
                doc_id: DocId::try_from("root").unwrap(),
                acl,
            }],
        );
        let alice = xml.find("alice").unwrap();
        let mallory = xml.find("mallory").unwrap();
        let zara = xml.find("zara").unwrap();
        assert!(alice < mallory && mallory < zara, "principals must be sorted");
    }
}
