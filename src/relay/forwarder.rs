//! Outbound calls with per-attempt timeouts and exponential backoff.
//!
//! A request moves through `attempt 1 -> (backoff) -> attempt 2 -> ...` until
//! it succeeds, fails with something not worth retrying, or runs out of
//! retries. Every attempt gets the full timeout window. Dropping the future
//! aborts the in-flight attempt and any pending backoff.

use std::error::Error as _;
use std::io;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use bytes::Bytes;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::error::RelayError;
use crate::relay::HeaderBag;

// == Upstream Failure ==
/// Why a single attempt produced no response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamFailure {
    #[error("timed out")]
    Timeout,
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    #[error("host not found: {0}")]
    HostNotFound(String),
    #[error("connection reset: {0}")]
    ConnectionReset(String),
    #[error("{0}")]
    Other(String),
}

impl UpstreamFailure {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UpstreamFailure::Other(_))
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return UpstreamFailure::Timeout;
        }

        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                match io_err.kind() {
                    io::ErrorKind::ConnectionRefused => {
                        return UpstreamFailure::ConnectionRefused(io_err.to_string())
                    }
                    io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof => {
                        return UpstreamFailure::ConnectionReset(io_err.to_string())
                    }
                    io::ErrorKind::TimedOut => return UpstreamFailure::Timeout,
                    _ => {}
                }
            }
            let message = cause.to_string();
            if message.contains("dns error") || message.contains("failed to lookup address") {
                return UpstreamFailure::HostNotFound(message);
            }
            source = cause.source();
        }

        if err.is_builder() {
            UpstreamFailure::Other(err.to_string())
        } else if err.is_connect() {
            UpstreamFailure::ConnectionRefused(err.to_string())
        } else if err.is_request() || err.is_body() {
            // connection dropped mid-exchange
            UpstreamFailure::ConnectionReset(err.to_string())
        } else {
            UpstreamFailure::Other(err.to_string())
        }
    }
}

/// Upstream statuses that are retried: 429 and every 5xx.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

// == Upstream Response ==
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Unfiltered
    pub headers: HeaderBag,
    pub body: Bytes,
    /// Attempts made, including the one that produced this response
    pub attempts: u32,
}

pub type AttemptOutcome = std::result::Result<UpstreamResponse, UpstreamFailure>;

// == Retry Policy ==
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Re-tries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Whether `attempt` (1-based) should be followed by another one.
    pub fn should_retry(&self, outcome: &AttemptOutcome, attempt: u32) -> bool {
        if attempt > self.max_retries {
            return false;
        }
        match outcome {
            Ok(response) => is_retryable_status(response.status),
            Err(failure) => failure.is_retryable(),
        }
    }

    /// `base_delay * 2^(attempt-1)`, saturating.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Base backoff plus up to 10% random jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff(attempt);
        let jitter: f64 = rand::thread_rng().gen_range(0.0..=0.1);
        base.saturating_add(base.mul_f64(jitter))
    }
}

// == Outbound Request ==
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    /// Already filtered, with route headers and auth applied
    pub headers: HeaderBag,
    pub body: Bytes,
}

// == Request Forwarder ==
#[derive(Debug, Clone)]
pub struct RequestForwarder {
    client: reqwest::Client,
}

impl RequestForwarder {
    /// Builds a forwarder whose client never follows redirects. A 3xx is
    /// relayed to the caller as-is, so the only hosts ever contacted are the
    /// ones the domain policy has already checked.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Sends `request`, retrying transient failures per `policy`.
    ///
    /// Any upstream response that ends the loop is returned as-is, whatever its
    /// status. Transport failures that end the loop become `RelayError`s.
    pub async fn forward(
        &self,
        request: &OutboundRequest,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<UpstreamResponse, RelayError> {
        let mut attempt = 1;
        loop {
            let outcome = self.attempt(request, timeout, attempt).await;

            if !policy.should_retry(&outcome, attempt) {
                return settle(outcome, attempt);
            }

            let delay = policy.backoff(attempt);
            let reason = match &outcome {
                Ok(response) => format!("upstream status {}", response.status.as_u16()),
                Err(failure) => failure.to_string(),
            };
            warn!(
                url = %request.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason,
                "retrying upstream request"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, request: &OutboundRequest, timeout: Duration, attempt: u32) -> AttemptOutcome {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.to_header_map())
            .timeout(timeout);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| UpstreamFailure::from_reqwest(&e))?;

        let status = response.status();
        let headers = HeaderBag::from_header_map(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamFailure::from_reqwest(&e))?;

        debug!(url = %request.url, attempt, status = status.as_u16(), "upstream responded");

        Ok(UpstreamResponse {
            status,
            headers,
            body,
            attempts: attempt,
        })
    }
}

fn settle(outcome: AttemptOutcome, attempts: u32) -> Result<UpstreamResponse, RelayError> {
    match outcome {
        Ok(response) => Ok(response),
        Err(UpstreamFailure::Timeout) => Err(RelayError::UpstreamTimeout { attempts }),
        Err(failure) => Err(RelayError::UpstreamUnreachable {
            attempts,
            reason: failure.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> AttemptOutcome {
        Ok(UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderBag::new(),
            body: Bytes::new(),
            attempts: 1,
        })
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::OK));
    }

    #[test]
    fn test_should_retry_bounds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        let reset: AttemptOutcome = Err(UpstreamFailure::ConnectionReset("reset".into()));

        assert!(policy.should_retry(&reset, 1));
        assert!(policy.should_retry(&reset, 3));
        assert!(!policy.should_retry(&reset, 4));
    }

    #[test]
    fn test_should_retry_classification() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));

        assert!(policy.should_retry(&Err(UpstreamFailure::Timeout), 1));
        assert!(policy.should_retry(&Err(UpstreamFailure::HostNotFound("x".into())), 1));
        assert!(policy.should_retry(&Err(UpstreamFailure::ConnectionRefused("x".into())), 1));
        assert!(!policy.should_retry(&Err(UpstreamFailure::Other("bad".into())), 1));
        assert!(policy.should_retry(&response(503), 1));
        assert!(policy.should_retry(&response(429), 1));
        assert!(!policy.should_retry(&response(404), 1));
        assert!(!policy.should_retry(&response(200), 1));
    }

    #[test]
    fn test_zero_retries_never_retries() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1000));
        assert!(!policy.should_retry(&Err(UpstreamFailure::Timeout), 1));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1000));
        assert_eq!(policy.base_backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.base_backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.base_backoff(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_jitter_within_ten_percent() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1000));
        for attempt in 1..=4 {
            let base = policy.base_backoff(attempt);
            for _ in 0..20 {
                let delay = policy.backoff(attempt);
                assert!(delay >= base);
                assert!(delay <= base + base / 10);
            }
        }
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(1));
        assert!(policy.backoff(80) >= policy.base_backoff(40));
    }

    #[test]
    fn test_settle_translation() {
        assert!(matches!(
            settle(Err(UpstreamFailure::Timeout), 4),
            Err(RelayError::UpstreamTimeout { attempts: 4 })
        ));
        assert!(matches!(
            settle(Err(UpstreamFailure::ConnectionRefused("x".into())), 2),
            Err(RelayError::UpstreamUnreachable { attempts: 2, .. })
        ));
        assert!(settle(response(500), 4).is_ok());
    }

    #[tokio::test]
    async fn test_refused_connection_exhausts_retries() {
        // bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let forwarder = RequestForwarder::new().unwrap();
        let request = OutboundRequest {
            method: Method::GET,
            url: Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap(),
            headers: HeaderBag::new(),
            body: Bytes::new(),
        };
        let policy = RetryPolicy::new(2, Duration::from_millis(5));

        let result = forwarder
            .forward(&request, Duration::from_secs(2), &policy)
            .await;

        assert!(matches!(
            result,
            Err(RelayError::UpstreamUnreachable { attempts: 3, .. })
        ));
    }

    fn get_request(url: &str) -> OutboundRequest {
        OutboundRequest {
            method: Method::GET,
            url: Url::parse(url).unwrap(),
            headers: HeaderBag::new(),
            body: Bytes::new(),
        }
    }

    /// Reads until the end of the request head.
    async fn read_request_head(stream: &mut tokio::net::TcpStream) {
        use tokio::io::AsyncReadExt;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    #[tokio::test]
    #[allow(deprecated)]
    async fn test_connection_reset_retried_until_success() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicU32::new(0));

        let seen = accepted.clone();
        let server = tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
                read_request_head(&mut stream).await;
                if n <= 2 {
                    // SO_LINGER 0 turns the close into an RST
                    stream.set_linger(Some(Duration::ZERO)).unwrap();
                    drop(stream);
                } else {
                    stream
                        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                        .await
                        .unwrap();
                    stream.shutdown().await.ok();
                }
            }
        });

        let forwarder = RequestForwarder::new().unwrap();
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let result = forwarder
            .forward(
                &get_request(&format!("http://127.0.0.1:{}/", port)),
                Duration::from_secs(2),
                &policy,
            )
            .await;

        let response = result.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Bytes::from_static(b"ok"));
        assert_eq!(response.attempts, 3);
        assert_eq!(accepted.load(Ordering::SeqCst), 3);

        server.abort();
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_retried() {
        let target = "http://cors-relay-test.invalid/";

        let err = reqwest::Client::new().get(target).send().await.unwrap_err();
        assert!(matches!(
            UpstreamFailure::from_reqwest(&err),
            UpstreamFailure::HostNotFound(_)
        ));

        let forwarder = RequestForwarder::new().unwrap();
        let policy = RetryPolicy::new(1, Duration::from_millis(5));
        let result = forwarder
            .forward(&get_request(target), Duration::from_secs(5), &policy)
            .await;

        assert!(matches!(
            result,
            Err(RelayError::UpstreamUnreachable { attempts: 2, .. })
        ));
    }
}
