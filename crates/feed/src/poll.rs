//! Periodic incremental-poll driver, run only for adaptors that opt in
//! via `Capabilities::incremental`.

use std::sync::Arc;
use std::time::Duration;

use adaptor_domain::Adaptor;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::gate::OneShotGate;
use crate::push::FeedPusher;

/// Spawns the incremental-poll loop, or returns `None` if the adaptor
/// doesn't declare the capability — callers should treat a `None`
/// return as "nothing to manage", not an error.
pub fn spawn_incremental_poll(
    adaptor: Arc<dyn Adaptor>,
    period: Duration,
    gate: OneShotGate,
    make_pusher: impl Fn() -> FeedPusher + Send + Sync + 'static,
) -> Option<PollHandle> {
    if !adaptor.capabilities().incremental {
        return None;
    }

    let cancel = CancellationToken::new();
    let cancel_for_task = cancel.clone();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel_for_task.cancelled() => break,
                _ = interval.tick() => {
                    let adaptor = adaptor.clone();
                    let pusher = make_pusher();
                    gate.run(
                        move |_cancel| async move {
                            if let Err(err) = poll_once(adaptor.as_ref(), pusher).await {
                                tracing::warn!(error = %err, "incremental poll failed");
                            }
                        },
                        || async {
                            tracing::debug!("incremental poll skipped: previous poll still in flight");
                        },
                    )
                    .await;
                }
            }
        }
    });

    Some(PollHandle { cancel, task })
}

async fn poll_once(adaptor: &dyn Adaptor, mut pusher: FeedPusher) -> adaptor_domain::Result<()> {
    adaptor.poll_incremental(&mut pusher).await
}

pub struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptor_domain::docid::DocId;
    use adaptor_domain::{AuthzDecision, Capabilities, DocContentResult, DocIdPusher, DocRequest};
    use async_trait::async_trait;

    struct NonIncrementalAdaptor;

    #[async_trait]
    impl Adaptor for NonIncrementalAdaptor {
        async fn get_doc_ids(&self, _pusher: &mut dyn DocIdPusher) -> adaptor_domain::Result<()> {
            Ok(())
        }
        async fn get_doc_content(&self, _req: &DocRequest) -> adaptor_domain::Result<DocContentResult> {
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

    struct IncrementalAdaptor;

    #[async_trait]
    impl Adaptor for IncrementalAdaptor {
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                incremental: true,
                config_listener: false,
            }
        }
        async fn get_doc_ids(&self, _pusher: &mut dyn DocIdPusher) -> adaptor_domain::Result<()> {
            Ok(())
        }
        async fn get_doc_content(&self, _req: &DocRequest) -> adaptor_domain::Result<DocContentResult> {
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

    fn make_pusher() -> FeedPusher {
        FeedPusher::new(
            Arc::new(crate::send::FeedSender::new(
                reqwest::Client::new(),
                "http://127.0.0.1:1/xmlfeed".to_string(),
                crate::send::BackoffPolicy {
                    initial: Duration::from_millis(1),
                    cap: Duration::from_millis(1),
                    max_attempts: 1,
                },
            )),
            Arc::new(adaptor_docid::DocIdCodec::new("/doc/")),
            "docs",
            Arc::new(adaptor_domain::Journal::new()),
            "incremental",
            crate::compose::FeedType::Incremental,
        )
    }

    #[tokio::test]
    async fn non_incremental_adaptor_yields_no_handle() {
        let gate = OneShotGate::new("poll");
        let handle = spawn_incremental_poll(
            Arc::new(NonIncrementalAdaptor),
            Duration::from_secs(60),
            gate,
            make_pusher,
        );
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn incremental_adaptor_yields_a_stoppable_handle() {
        let gate = OneShotGate::new("poll");
        let handle = spawn_incremental_poll(
            Arc::new(IncrementalAdaptor),
            Duration::from_millis(20),
            gate,
            make_pusher,
        )
        .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop().await;
    }
}
