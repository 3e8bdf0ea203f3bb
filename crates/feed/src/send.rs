//! Posts a composed feed document to the Appliance's `/xmlfeed` endpoint
//! with exponential-backoff retry.

use std::time::Duration;

use adaptor_domain::error::{Error, Result};

/// What the caller should do after an attempt fails, decided by an
/// operator-supplied callback so unusual Appliance behavior (a
/// maintenance-mode 503 that should abort the whole push, say) can be
/// handled without changing the sender itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    AbortPush,
    ContinueSkippingBatch,
}

pub type ErrorHandler = std::sync::Arc<dyn Fn(&Error, u32) -> RetryDecision + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let scaled = self.initial.saturating_mul(factor);
        scaled.min(self.cap)
    }
}

pub fn default_error_handler() -> ErrorHandler {
    std::sync::Arc::new(|err: &Error, _attempt: u32| match err {
        Error::PermanentIo(_) | Error::MalformedId(_) => RetryDecision::AbortPush,
        _ => RetryDecision::Retry,
    })
}

pub struct FeedSender {
    client: reqwest::Client,
    feed_url: String,
    policy: BackoffPolicy,
    on_error: ErrorHandler,
}

impl FeedSender {
    pub fn new(client: reqwest::Client, feed_url: impl Into<String>, policy: BackoffPolicy) -> Self {
        Self {
            client,
            feed_url: feed_url.into(),
            policy,
            on_error: default_error_handler(),
        }
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.on_error = handler;
        self
    }

    /// POSTs one feed document, retrying per the configured backoff
    /// policy. Returns `Ok(())` on a 2xx; a 4xx is classified permanent
    /// (no retry) while connection errors, timeouts, and 5xx are
    /// transient. `ContinueSkippingBatch` from the error handler is
    /// surfaced to the caller as `Ok(())` — "skip this batch" is not a
    /// failure the caller needs to react to.
    pub async fn send(&self, datasource: &str, feedtype: &str, xml: String) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.attempt_once(datasource, feedtype, &xml).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    // The error handler is consulted on every failed
                    // attempt, including the last one — a handler that
                    // returns `ContinueSkippingBatch`/`AbortPush` must be
                    // honored even once the retry budget is spent, per
                    // spec.md §4.4 ("all outcomes pass through an error
                    // handler"). Only a `Retry` decision is bounded by
                    // `max_attempts`: there is no budget left to retry
                    // into, so that case still fails the push.
                    match (self.on_error)(&err, attempt) {
                        RetryDecision::Retry if attempt < self.policy.max_attempts => {
                            tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
                        }
                        RetryDecision::ContinueSkippingBatch => return Ok(()),
                        RetryDecision::Retry | RetryDecision::AbortPush => return Err(err),
                    }
                }
            }
        }
    }

    async fn attempt_once(&self, datasource: &str, feedtype: &str, xml: &str) -> Result<()> {
        let form = reqwest::multipart::Form::new()
            .text("datasource", datasource.to_string())
            .text("feedtype", feedtype.to_string())
            .text("data", xml.to_string());

        let response = self
            .client
            .post(&self.feed_url)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_client_error() {
            return Err(Error::PermanentIo(format!(
                "feed rejected with status {status}"
            )));
        }
        if !status.is_success() {
            return Err(Error::TransientIo(format!(
                "feed endpoint returned status {status}"
            )));
        }

        let body = response.text().await.map_err(map_reqwest_error)?;
        if body.contains("Success") {
            Ok(())
        } else {
            Err(Error::PermanentIo(format!(
                "feed endpoint returned 2xx without the expected \"Success\" body: {}",
                body.chars().take(200).collect::<String>()
            )))
        }
    }
}

/// Maps a `reqwest::Error` to the shared error taxonomy: timeouts and
/// connection failures are transient, anything else (mostly a client
/// misconfiguration, like a bad URL) is treated as permanent.
fn map_reqwest_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(err.to_string())
    } else if err.is_connect() {
        Error::TransientIo(err.to_string())
    } else {
        Error::PermanentIo(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }

    #[test]
    fn backoff_doubles_each_attempt_until_capped() {
        let p = policy();
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(p.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(p.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(p.delay_for_attempt(5), Duration::from_secs(16));
        assert_eq!(p.delay_for_attempt(6), Duration::from_secs(30));
        assert_eq!(p.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn continue_skipping_batch_is_honored_on_the_final_attempt() {
        let sender = FeedSender::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/xmlfeed".to_string(),
            BackoffPolicy {
                initial: Duration::from_millis(1),
                cap: Duration::from_millis(1),
                max_attempts: 1,
            },
        )
        .with_error_handler(std::sync::Arc::new(|_err, _attempt| {
            RetryDecision::ContinueSkippingBatch
        }));

        let result = sender.send("docs", "full-replace", "<gsafeed/>".to_string()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn abort_push_is_honored_on_the_final_attempt() {
        let sender = FeedSender::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/xmlfeed".to_string(),
            BackoffPolicy {
                initial: Duration::from_millis(1),
                cap: Duration::from_millis(1),
                max_attempts: 1,
            },
        )
        .with_error_handler(std::sync::Arc::new(|_err, _attempt| RetryDecision::AbortPush));

        let result = sender.send("docs", "full-replace", "<gsafeed/>".to_string()).await;
        assert!(result.is_err());
    }

    #[test]
    fn default_handler_retries_transient_and_aborts_permanent() {
        let handler = default_error_handler();
        assert_eq!(
            handler(&Error::TransientIo("x".into()), 1),
            RetryDecision::Retry
        );
        assert_eq!(
            handler(&Error::PermanentIo("x".into()), 1),
            RetryDecision::AbortPush
        );
        assert_eq!(
            handler(&Error::MalformedId("x".into()), 1),
            RetryDecision::AbortPush
        );
    }
}
