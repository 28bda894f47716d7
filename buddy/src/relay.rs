//! Client side of the relay protocol.
//!
//! A request is `POST`ed to `{base}/{id}`. The wallet's progress is then read
//! by long-polling `{base}/{id}.accepted` and `{base}/{id}.resp`. The relay
//! holds those `GET`s open while nothing is available and answers with an empty
//! body when its own wait elapses.

use crate::cancellation::{self, abortable};
use crate::config::RelayConfig;
use crate::error::SignError;
use crate::metrics;
use anyhow::Context;
use backon::{BackoffBuilder, ConstantBuilder};
use buddy_primitives::RequestId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

#[cfg(test)]
use mockall::automock;

/// Resource suffix signalling that the wallet picked up the request.
pub const ACCEPTED_SUFFIX: &str = ".accepted";
/// Resource suffix holding the wallet's final answer.
pub const RESPONSE_SUFFIX: &str = ".resp";

/// The HTTP operations the relay protocol is built from.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait RelayHttp: Send + Sync {
    /// Sends `body` as `application/json`. Any non-success status is an error,
    /// and so is an attempt that outlives the submit timeout.
    async fn post_json(&self, url: Url, body: String) -> anyhow::Result<()>;

    /// Fetches `url` and returns the response body. Any non-success status is
    /// an error.
    async fn get_text(&self, url: Url) -> anyhow::Result<String>;
}

pub struct ReqwestRelayHttp {
    client: reqwest::Client,
    submit_timeout: Duration,
}

impl ReqwestRelayHttp {
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            submit_timeout: config.submit_timeout(),
        })
    }
}

#[async_trait::async_trait]
impl RelayHttp for ReqwestRelayHttp {
    async fn post_json(&self, url: Url, body: String) -> anyhow::Result<()> {
        self.client
            .post(url)
            .timeout(self.submit_timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn get_text(&self, url: Url) -> anyhow::Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Submits requests to, and polls answers from, one relay.
#[derive(Clone)]
pub struct RelayClient {
    http: Arc<dyn RelayHttp>,
    base: Url,
    config: RelayConfig,
}

impl RelayClient {
    pub fn new(http: Arc<dyn RelayHttp>, base: Url, config: RelayConfig) -> Self {
        Self { http, base, config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// URL of the resource `{id}{suffix}`, resolved against the relay base.
    pub fn resource_url(&self, id: &RequestId, suffix: &str) -> Result<Url, SignError> {
        Ok(self.base.join(&format!("{id}{suffix}"))?)
    }

    /// Posts the request body, retrying failed attempts after a fixed delay.
    pub async fn submit(
        &self,
        id: &RequestId,
        body: &str,
        token: &CancellationToken,
    ) -> Result<(), SignError> {
        let url = self.resource_url(id, "")?;
        let mut backoff = ConstantBuilder::default()
            .with_delay(self.config.submit_retry_delay())
            .with_max_times(self.config.submit_attempts.saturating_sub(1))
            .build();

        let mut attempt = 1;
        loop {
            let result =
                abortable(token, self.http.post_json(url.clone(), body.to_string())).await?;
            let err = match result {
                Ok(()) => {
                    debug!(request_id = %id, attempt, "request submitted");
                    return Ok(());
                }
                Err(err) => err,
            };
            metrics::RELAY_SUBMIT_FAILURES.inc();
            match backoff.next() {
                Some(delay) => {
                    warn!(request_id = %id, attempt, ?err, "submit failed. retrying in: {:?}", delay);
                    cancellation::sleep(token, delay).await?;
                    attempt += 1;
                }
                None => {
                    warn!(request_id = %id, attempt, ?err, "submit failed, giving up");
                    return Err(SignError::SubmitFailed);
                }
            }
        }
    }

    /// Long-polls `{id}{suffix}` until it has content.
    ///
    /// Returns the first non-empty body. Fails with [`SignError::PollTimeout`]
    /// once `timeout` has elapsed, and with [`SignError::PollFailed`] once more
    /// than the configured number of consecutive requests failed.
    pub async fn poll(
        &self,
        id: &RequestId,
        suffix: &str,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<String, SignError> {
        let mut url = self.resource_url(id, suffix)?;
        url.set_query(Some("wait=1"));
        let deadline = Instant::now() + timeout;
        let mut backoff = self.poll_backoff();

        while Instant::now() < deadline {
            let fetch = tokio::time::timeout_at(deadline, self.http.get_text(url.clone()));
            match abortable(token, fetch).await? {
                Ok(Ok(text)) => {
                    if !text.is_empty() {
                        return Ok(text);
                    }
                    backoff = self.poll_backoff();
                }
                Ok(Err(err)) => {
                    metrics::RELAY_POLL_FAILURES.with_label_values(&[suffix]).inc();
                    let Some(delay) = backoff.next() else {
                        warn!(request_id = %id, suffix, ?err, "polling failed too many times in a row");
                        return Err(SignError::PollFailed);
                    };
                    debug!(request_id = %id, suffix, ?err, "poll failed. retrying in: {:?}", delay);
                    cancellation::sleep(token, delay).await?;
                }
                Err(_elapsed) => break,
            }
        }
        debug!(request_id = %id, suffix, "poll deadline reached");
        Err(SignError::PollTimeout)
    }

    fn poll_backoff(&self) -> impl Iterator<Item = Duration> {
        ConstantBuilder::default()
            .with_delay(self.config.poll_failure_backoff())
            .with_max_times(self.config.max_consecutive_poll_failures)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mockall::predicate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "https://relay.test/";

    fn request_id() -> RequestId {
        RequestId::derive("{}", &|_: &str| "abc123".to_string())
    }

    /// Paused-clock timers fire on millisecond ticks, so allow a little slack.
    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "expected ~{expected:?}, got {elapsed:?}"
        );
    }

    fn client(http: MockRelayHttp) -> RelayClient {
        RelayClient::new(
            Arc::new(http),
            Url::parse(BASE).unwrap(),
            RelayConfig::default(),
        )
    }

    #[test]
    fn test_resource_urls() {
        let client = client(MockRelayHttp::new());

        assert_eq!(
            client.resource_url(&request_id(), "").unwrap().as_str(),
            "https://relay.test/abc123"
        );
        assert_eq!(
            client
                .resource_url(&request_id(), RESPONSE_SUFFIX)
                .unwrap()
                .as_str(),
            "https://relay.test/abc123.resp"
        );
    }

    #[tokio::test]
    async fn test_submit_posts_body_to_request_resource() {
        let mut http = MockRelayHttp::new();
        http.expect_post_json()
            .once()
            .with(
                predicate::eq(Url::parse("https://relay.test/abc123").unwrap()),
                predicate::eq("{\"a\":1}".to_string()),
            )
            .returning(|_, _| Ok(()));

        let result = client(http)
            .submit(&request_id(), "{\"a\":1}", &CancellationToken::new())
            .await;

        assert_matches!(result, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_gives_up_after_three_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let mut http = MockRelayHttp::new();
        {
            let attempts = attempts.clone();
            http.expect_post_json().times(3).returning(move |_, _| {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("connection refused"))
            });
        }
        let start = Instant::now();

        let result = client(http)
            .submit(&request_id(), "{}", &CancellationToken::new())
            .await;

        assert_matches!(result, Err(SignError::SubmitFailed));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // Two waits between three attempts, none after the last one.
        assert_elapsed(start, Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_recovers_after_transient_failure() {
        let mut http = MockRelayHttp::new();
        let mut sequence = mockall::Sequence::new();
        http.expect_post_json()
            .once()
            .in_sequence(&mut sequence)
            .returning(|_, _| Err(anyhow::anyhow!("502 Bad Gateway")));
        http.expect_post_json()
            .once()
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        let start = Instant::now();

        let result = client(http)
            .submit(&request_id(), "{}", &CancellationToken::new())
            .await;

        assert_matches!(result, Ok(()));
        assert_elapsed(start, Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_aborts_during_retry_wait() {
        let mut http = MockRelayHttp::new();
        http.expect_post_json()
            .once()
            .returning(|_, _| Err(anyhow::anyhow!("connection refused")));
        let token = CancellationToken::new();
        {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                token.cancel();
            });
        }
        let start = Instant::now();

        let result = client(http).submit(&request_id(), "{}", &token).await;

        assert_matches!(result, Err(SignError::Aborted));
        assert!(start.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_submit_with_cancelled_token_sends_nothing() {
        let mut http = MockRelayHttp::new();
        http.expect_post_json().never();
        let token = CancellationToken::new();
        token.cancel();

        let result = client(http).submit(&request_id(), "{}", &token).await;

        assert_matches!(result, Err(SignError::Aborted));
    }

    #[tokio::test]
    async fn test_poll_requests_long_poll_resource() {
        let mut http = MockRelayHttp::new();
        http.expect_get_text()
            .once()
            .with(predicate::eq(
                Url::parse("https://relay.test/abc123.accepted?wait=1").unwrap(),
            ))
            .returning(|_| Ok("1".to_string()));

        let text = client(http)
            .poll(
                &request_id(),
                ACCEPTED_SUFFIX,
                Duration::from_secs(60),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(text, "1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_fails_after_more_than_two_consecutive_errors() {
        let mut http = MockRelayHttp::new();
        http.expect_get_text()
            .times(3)
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        let start = Instant::now();

        let result = client(http)
            .poll(
                &request_id(),
                RESPONSE_SUFFIX,
                Duration::from_secs(600),
                &CancellationToken::new(),
            )
            .await;

        assert_matches!(result, Err(SignError::PollFailed));
        assert_elapsed(start, Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_success_resets_failure_count() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut http = MockRelayHttp::new();
        {
            let calls = calls.clone();
            // fail, fail, empty, fail, fail, data
            http.expect_get_text().times(6).returning(move |_| {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    2 => Ok(String::new()),
                    5 => Ok("{\"payload\":1}".to_string()),
                    _ => Err(anyhow::anyhow!("connection reset")),
                }
            });
        }

        let text = client(http)
            .poll(
                &request_id(),
                RESPONSE_SUFFIX,
                Duration::from_secs(600),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(text, "{\"payload\":1}");
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_when_relay_never_answers() {
        let client = RelayClient::new(
            Arc::new(SlowRelay),
            Url::parse(BASE).unwrap(),
            RelayConfig::default(),
        );
        let start = Instant::now();

        let result = client
            .poll(
                &request_id(),
                RESPONSE_SUFFIX,
                Duration::from_secs(600),
                &CancellationToken::new(),
            )
            .await;

        assert_matches!(result, Err(SignError::PollTimeout));
        assert_elapsed(start, Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_aborts_when_cancelled() {
        let token = CancellationToken::new();
        {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                token.cancel();
            });
        }
        let client = RelayClient::new(
            Arc::new(SlowRelay),
            Url::parse(BASE).unwrap(),
            RelayConfig::default(),
        );
        let start = Instant::now();

        let result = client
            .poll(&request_id(), RESPONSE_SUFFIX, Duration::from_secs(600), &token)
            .await;

        assert_matches!(result, Err(SignError::Aborted));
        assert_elapsed(start, Duration::from_secs(5));
    }

    /// Relay that holds every long-poll for 7 seconds and then answers empty.
    struct SlowRelay;

    #[async_trait::async_trait]
    impl RelayHttp for SlowRelay {
        async fn post_json(&self, _url: Url, _body: String) -> anyhow::Result<()> {
            Ok(())
        }

        async fn get_text(&self, _url: Url) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(7)).await;
            Ok(String::new())
        }
    }
}
