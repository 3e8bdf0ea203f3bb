//! Drives a full or incremental DocId listing through the feed composer
//! and sender, batch by batch, updating the journal as it goes.

use std::sync::Arc;

use adaptor_domain::docid::{DocIdRecord, NamedResource};
use adaptor_domain::error::Result;
use adaptor_domain::{DocIdPusher, Journal, TraceEvent};
use adaptor_docid::DocIdCodec;
use async_trait::async_trait;

use crate::compose::{compose_feed, compose_named_resources_feed, FeedType};
use crate::send::FeedSender;

/// Outcome of one `get_doc_ids`/`poll_incremental` run. `first_failed`
/// names the record at which sending stopped, letting a caller resume a
/// listing rather than restart it from scratch — this workspace keeps
/// that record in memory only (no durable queue), so a resume is only
/// meaningful within the same process run.
#[derive(Debug)]
pub struct PushOutcome {
    pub pushed: usize,
    pub first_failed: Option<DocIdRecord>,
}

pub struct FeedPusher {
    sender: Arc<FeedSender>,
    codec: Arc<DocIdCodec>,
    datasource: String,
    journal: Arc<Journal>,
    schedule_label: String,
    feedtype: FeedType,
    outcome: PushOutcome,
}

impl FeedPusher {
    /// `feedtype` is fixed for the lifetime of this pusher: a full
    /// listing run (`FeedType::FullReplace`) and an incremental poll run
    /// (`FeedType::Incremental`) each get their own `FeedPusher`, since
    /// the wire feedtype must not change mid-listing.
    pub fn new(
        sender: Arc<FeedSender>,
        codec: Arc<DocIdCodec>,
        datasource: impl Into<String>,
        journal: Arc<Journal>,
        schedule_label: impl Into<String>,
        feedtype: FeedType,
    ) -> Self {
        Self {
            sender,
            codec,
            datasource: datasource.into(),
            journal,
            schedule_label: schedule_label.into(),
            feedtype,
            outcome: PushOutcome {
                pushed: 0,
                first_failed: None,
            },
        }
    }

    pub async fn run(
        adaptor: &dyn adaptor_domain::Adaptor,
        mut pusher: FeedPusher,
    ) -> Result<PushOutcome> {
        TraceEvent::PushStarted {
            schedule: &pusher.schedule_label,
        }
        .emit();
        let result = adaptor.get_doc_ids(&mut pusher).await;
        match result {
            Ok(()) => {
                if pusher.feedtype == FeedType::FullReplace {
                    pusher.journal.record_full_push_completed(chrono::Utc::now());
                }
                TraceEvent::PushCompleted {
                    schedule: &pusher.schedule_label,
                    pushed: pusher.outcome.pushed,
                    failed: if pusher.outcome.first_failed.is_some() { 1 } else { 0 },
                }
                .emit();
                Ok(pusher.outcome)
            }
            Err(err) => {
                TraceEvent::PushAborted {
                    schedule: &pusher.schedule_label,
                    reason: &err.to_string(),
                }
                .emit();
                Err(err)
            }
        }
    }

    async fn send_batch(&mut self, batch: Vec<DocIdRecord>) -> Result<()> {
        if self.outcome.first_failed.is_some() {
            return Ok(());
        }
        let xml = compose_feed(&self.datasource, self.feedtype, &self.codec, &batch);
        match self
            .sender
            .send(&self.datasource, self.feedtype.as_str(), xml)
            .await
        {
            Ok(()) => {
                self.journal.record_push_success(batch.len() as u64);
                self.outcome.pushed += batch.len();
                Ok(())
            }
            Err(err) => {
                match &err {
                    adaptor_domain::Error::PermanentIo(_) | adaptor_domain::Error::MalformedId(_) => {
                        self.journal.record_push_permanent_fail();
                    }
                    _ => self.journal.record_push_transient_fail(),
                }
                self.outcome.first_failed = batch.into_iter().next();
                Err(err)
            }
        }
    }
}

/// Composes and sends a single feed carrying ACL-only [`NamedResource`]s
/// — `spec.md` §4.5's `pushNamedResources`. Unlike [`FeedPusher::run`]
/// this is a one-shot call with no batching: the caller already has the
/// whole map of resources in hand.
pub async fn push_named_resources(
    sender: &FeedSender,
    codec: &DocIdCodec,
    datasource: &str,
    resources: Vec<NamedResource>,
    journal: &Journal,
) -> Result<()> {
    let count = resources.len();
    let xml = compose_named_resources_feed(datasource, codec, &resources);
    match sender
        .send(datasource, FeedType::Incremental.as_str(), xml)
        .await
    {
        Ok(()) => {
            journal.record_push_success(count as u64);
            Ok(())
        }
        Err(err) => {
            match &err {
                adaptor_domain::Error::PermanentIo(_) | adaptor_domain::Error::MalformedId(_) => {
                    journal.record_push_permanent_fail();
                }
                _ => journal.record_push_transient_fail(),
            }
            Err(err)
        }
    }
}

#[async_trait]
impl DocIdPusher for FeedPusher {
    /// Composes and sends exactly one feed per call: the adaptor decides
    /// batch boundaries by how often it calls `push_records`, and those
    /// boundaries are never merged or split across calls.
    async fn push_records(&mut self, batch: Vec<DocIdRecord>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.send_batch(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptor_domain::docid::DocId;
    use adaptor_domain::{AuthzDecision, DocContentResult, DocRequest};

    struct CountingAdaptor {
        total: usize,
    }

    #[async_trait]
    impl adaptor_domain::Adaptor for CountingAdaptor {
        async fn get_doc_ids(&self, pusher: &mut dyn DocIdPusher) -> Result<()> {
            let batch: Vec<DocIdRecord> = (0..self.total)
                .map(|i| DocIdRecord::new(DocId::try_from(format!("doc-{i}")).unwrap()))
                .collect();
            pusher.push_records(batch).await
        }

        async fn get_doc_content(&self, _req: &DocRequest) -> Result<DocContentResult> {
            Ok(DocContentResult::not_found())
        }

        async fn is_user_authorized(
            &self,
            _principal: Option<&adaptor_domain::Principal>,
            _doc_id: &DocId,
        ) -> AuthzDecision {
            AuthzDecision::Deny
        }
    }

    fn pusher_against(url: &str) -> FeedPusher {
        let sender = Arc::new(FeedSender::new(
            reqwest::Client::new(),
            url.to_string(),
            crate::send::BackoffPolicy {
                initial: std::time::Duration::from_millis(1),
                cap: std::time::Duration::from_millis(5),
                max_attempts: 1,
            },
        ));
        FeedPusher::new(
            sender,
            Arc::new(DocIdCodec::new("/doc/")),
            "docs",
            Arc::new(Journal::new()),
            "test",
            FeedType::FullReplace,
        )
    }

    /// Binds an ephemeral listener that answers exactly one HTTP request
    /// with a 200 whose body contains the literal `Success` the sender
    /// requires, then returns the address to POST the feed at.
    async fn respond_success_once() -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let body = "Success";
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        addr
    }

    #[tokio::test]
    async fn incremental_push_does_not_advance_last_full_push() {
        let addr = respond_success_once().await;
        let sender = Arc::new(FeedSender::new(
            reqwest::Client::new(),
            format!("http://{addr}/xmlfeed"),
            crate::send::BackoffPolicy {
                initial: std::time::Duration::from_millis(1),
                cap: std::time::Duration::from_millis(5),
                max_attempts: 1,
            },
        ));
        let journal = Arc::new(Journal::new());
        let pusher = FeedPusher::new(
            sender,
            Arc::new(DocIdCodec::new("/doc/")),
            "docs",
            journal.clone(),
            "incremental-test",
            FeedType::Incremental,
        );
        let adaptor = CountingAdaptor { total: 1 };
        let result = FeedPusher::run(&adaptor, pusher).await;
        assert!(result.is_ok());
        assert!(journal.last_full_push().is_none());
    }

    #[tokio::test]
    async fn full_replace_push_advances_last_full_push() {
        let addr = respond_success_once().await;
        let sender = Arc::new(FeedSender::new(
            reqwest::Client::new(),
            format!("http://{addr}/xmlfeed"),
            crate::send::BackoffPolicy {
                initial: std::time::Duration::from_millis(1),
                cap: std::time::Duration::from_millis(5),
                max_attempts: 1,
            },
        ));
        let journal = Arc::new(Journal::new());
        let pusher = FeedPusher::new(
            sender,
            Arc::new(DocIdCodec::new("/doc/")),
            "docs",
            journal.clone(),
            "full-test",
            FeedType::FullReplace,
        );
        let adaptor = CountingAdaptor { total: 1 };
        let result = FeedPusher::run(&adaptor, pusher).await;
        assert!(result.is_ok());
        assert!(journal.last_full_push().is_some());
    }

    #[tokio::test]
    async fn single_push_records_call_sends_immediately() {
        let pusher = pusher_against("http://127.0.0.1:1/xmlfeed");
        let adaptor = CountingAdaptor { total: 3 };
        // connection refused is expected; we only assert the single
        // `push_records` call attempted a send rather than waiting for
        // more records to accumulate.
        let result = FeedPusher::run(&adaptor, pusher).await;
        assert!(result.is_err());
    }

    struct TwoCallAdaptor {
        first: usize,
        second: usize,
    }

    #[async_trait]
    impl adaptor_domain::Adaptor for TwoCallAdaptor {
        async fn get_doc_ids(&self, pusher: &mut dyn DocIdPusher) -> Result<()> {
            let batch_a: Vec<DocIdRecord> = (0..self.first)
                .map(|i| DocIdRecord::new(DocId::try_from(format!("a-{i}")).unwrap()))
                .collect();
            pusher.push_records(batch_a).await?;
            let batch_b: Vec<DocIdRecord> = (0..self.second)
                .map(|i| DocIdRecord::new(DocId::try_from(format!("b-{i}")).unwrap()))
                .collect();
            pusher.push_records(batch_b).await
        }

        async fn get_doc_content(&self, _req: &DocRequest) -> Result<DocContentResult> {
            Ok(DocContentResult::not_found())
        }

        async fn is_user_authorized(
            &self,
            _principal: Option<&adaptor_domain::Principal>,
            _doc_id: &DocId,
        ) -> AuthzDecision {
            AuthzDecision::Deny
        }
    }

    #[tokio::test]
    async fn two_push_records_calls_compose_two_independent_feeds() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests_seen = Arc::new(AtomicUsize::new(0));
        let counter = requests_seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 8192];
                let _ = socket.read(&mut buf).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let body = "Success";
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let sender = Arc::new(FeedSender::new(
            reqwest::Client::new(),
            format!("http://{addr}/xmlfeed"),
            crate::send::BackoffPolicy {
                initial: std::time::Duration::from_millis(1),
                cap: std::time::Duration::from_millis(5),
                max_attempts: 1,
            },
        ));
        let pusher = FeedPusher::new(
            sender,
            Arc::new(DocIdCodec::new("/doc/")),
            "docs",
            Arc::new(Journal::new()),
            "two-call-test",
            FeedType::FullReplace,
        );
        let adaptor = TwoCallAdaptor { first: 2, second: 3 };
        let result = FeedPusher::run(&adaptor, pusher).await.unwrap();
        assert_eq!(result.pushed, 5);
        assert_eq!(requests_seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn push_named_resources_records_transient_failure_in_journal() {
        use adaptor_domain::docid::{Acl, NamedResource};

        let sender = FeedSender::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/xmlfeed".to_string(),
            crate::send::BackoffPolicy {
                initial: std::time::Duration::from_millis(1),
                cap: std::time::Duration::from_millis(1),
                max_attempts: 1,
            },
        );
        let codec = DocIdCodec::new("/doc/");
        let journal = Journal::new();
        let resources = vec![NamedResource {
            doc_id: DocId::try_from("root").unwrap(),
            acl: Acl::default(),
        }];

        let result = push_named_resources(&sender, &codec, "docs", resources, &journal).await;
        assert!(result.is_err());
        assert_eq!(journal.snapshot().pushed_transient_fail, 1);
    }
}
