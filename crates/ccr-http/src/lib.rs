//! HTTP Request Engine: issues one logical upstream call with retries,
//! per-attempt connect timeout, proxying, backoff, and cancellation.
//!
//! Mirrors the shape of a wreq-backed upstream client: a single `Client` is
//! built per distinct proxy and reused across attempts; bodies flow through
//! either a buffered `Bytes` or a channel-fed stream depending on whether the
//! caller asked for SSE.

mod backoff;
mod classify;
mod retry_info;

use std::time::Duration;

use bytes::Bytes;
use ccr_common::Headers;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use wreq::{Client, Method, Proxy};

pub use classify::TransportErrorKind;
use retry_info::extract_retry_info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF_MS: u64 = 1000;
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Watch-channel based cancellation signal; `true` once the caller has
/// asked to abort.
pub type Cancellation = watch::Receiver<bool>;

#[derive(Debug, Clone, Default)]
pub struct RequestEngineConfig {
    pub headers: Headers,
    pub https_proxy: Option<String>,
    pub stream: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: String,
    pub cancellation: Option<Cancellation>,
}

/// The body of an engine response: buffered for unary/error responses,
/// channel-fed for a successful streaming response.
pub enum EngineBody {
    Bytes(Bytes),
    Stream(mpsc::Receiver<Bytes>),
}

pub struct EngineResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: EngineBody,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("request canceled by caller")]
    CallerCanceled,
    #[error("transport error ({kind:?}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
}

/// `send(url, body, config, ctx) -> Response` (spec §4.1).
///
/// `body` is the already-serialized unified-level JSON body; the engine
/// itself never reinterprets it beyond reading retry hints out of error
/// payloads.
pub async fn send(
    url: &str,
    body: Bytes,
    config: &RequestEngineConfig,
    ctx: &RequestContext,
) -> Result<EngineResponse, EngineError> {
    let client = build_client(config.https_proxy.as_deref())?;

    let mut attempt: u32 = 1;
    loop {
        if is_canceled(ctx) {
            return Err(EngineError::CallerCanceled);
        }

        let outcome = send_one_attempt(&client, url, body.clone(), config, ctx).await;

        match outcome {
            Err(AttemptError::Canceled) => return Err(EngineError::CallerCanceled),
            Err(AttemptError::Transport(err)) => {
                if config.stream || attempt > MAX_RETRIES || !err.kind.is_retryable() {
                    return Err(EngineError::Transport {
                        kind: err.kind,
                        message: err.message,
                    });
                }
                sleep_for_retry(backoff::exponential(attempt, INITIAL_BACKOFF_MS), ctx).await?;
                attempt += 1;
            }
            Ok(response) => {
                let is_success = (200..300).contains(&response.status);
                if is_success {
                    return Ok(response);
                }

                let EngineResponse {
                    status,
                    headers,
                    body: EngineBody::Bytes(error_body),
                } = response
                else {
                    unreachable!("non-success responses are always buffered")
                };

                let retry_info = extract_retry_info(&error_body, INITIAL_BACKOFF_MS);
                if status == 429 && retry_info.is_daily_quota {
                    return Ok(EngineResponse {
                        status,
                        headers,
                        body: EngineBody::Bytes(error_body),
                    });
                }

                if config.stream || attempt > MAX_RETRIES || !is_retryable_status(status) {
                    return Ok(EngineResponse {
                        status,
                        headers,
                        body: EngineBody::Bytes(error_body),
                    });
                }

                let base = retry_after_from_headers(&headers)
                    .or(retry_info.delay)
                    .unwrap_or_else(|| backoff::exponential(attempt, INITIAL_BACKOFF_MS));
                sleep_for_retry(base, ctx).await?;
                attempt += 1;
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=504).contains(&status)
}

fn is_canceled(ctx: &RequestContext) -> bool {
    ctx.cancellation
        .as_ref()
        .map(|rx| *rx.borrow())
        .unwrap_or(false)
}

/// Applies the jitter rule uniformly to whichever base the caller selected
/// (Retry-After header, body-derived delay, or exponential backoff): final
/// delay = base + uniform(10%,30%)·base, floored at `INITIAL_BACKOFF_MS`.
fn jittered(base: Duration) -> Duration {
    let base_ms = base.as_millis() as f64;
    let fraction = rand::rng().random_range(0.10..0.30);
    let with_jitter = base_ms + fraction * base_ms;
    Duration::from_millis((with_jitter as u64).max(INITIAL_BACKOFF_MS))
}

async fn sleep_for_retry(base: Duration, ctx: &RequestContext) -> Result<(), EngineError> {
    let delay = jittered(base);
    match ctx.cancellation.clone() {
        Some(mut cancellation) => {
            tokio::select! {
                _ = tokio::time::sleep(delay) => Ok(()),
                _ = cancellation.changed() => Err(EngineError::CallerCanceled),
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

fn retry_after_from_headers(headers: &Headers) -> Option<Duration> {
    let value = ccr_common::header_get(headers, "retry-after")?;
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let when = httpdate::parse_http_date(value).ok()?;
    let delta = when.duration_since(std::time::SystemTime::now()).ok()?;
    Some(delta)
}

struct AttemptTransportError {
    kind: TransportErrorKind,
    message: String,
}

enum AttemptError {
    Canceled,
    Transport(AttemptTransportError),
}

async fn send_one_attempt(
    client: &Client,
    url: &str,
    body: Bytes,
    config: &RequestEngineConfig,
    ctx: &RequestContext,
) -> Result<EngineResponse, AttemptError> {
    let mut builder = client
        .request(Method::POST, url)
        .header("content-type", "application/json");
    for (key, value) in &config.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder = builder.body(body);

    let send_future = builder.send();
    let headers_result = match ctx.cancellation.clone() {
        Some(mut cancellation) => {
            tokio::select! {
                result = tokio::time::timeout(CONNECT_TIMEOUT, send_future) => result,
                _ = cancellation.changed() => return Err(AttemptError::Canceled),
            }
        }
        None => tokio::time::timeout(CONNECT_TIMEOUT, send_future).await,
    };

    let response = match headers_result {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => return Err(AttemptError::Transport(classify_wreq_error(&err))),
        Err(_elapsed) => {
            return Err(AttemptError::Transport(AttemptTransportError {
                kind: TransportErrorKind::Timeout,
                message: format!("no response headers within {CONNECT_TIMEOUT:?}"),
            }))
        }
    };

    let status = response.status().as_u16();
    let headers = headers_from_wreq(response.headers());
    let is_success = (200..300).contains(&status);

    if !is_success || !config.stream {
        let body = response
            .bytes()
            .await
            .map_err(|err| AttemptError::Transport(classify_wreq_error(&err)))?;
        return Ok(EngineResponse {
            status,
            headers,
            body: EngineBody::Bytes(body),
        });
    }

    let (tx, rx) = mpsc::channel::<Bytes>(STREAM_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        use futures_util::StreamExt;
        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            let Ok(chunk) = item else { break };
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
    });

    Ok(EngineResponse {
        status,
        headers,
        body: EngineBody::Stream(rx),
    })
}

fn headers_from_wreq(map: &wreq::header::HeaderMap) -> Headers {
    let mut out = Vec::new();
    for (key, value) in map {
        if let Ok(s) = value.to_str() {
            out.push((key.as_str().to_string(), s.to_string()));
        }
    }
    out
}

fn classify_wreq_error(err: &wreq::Error) -> AttemptTransportError {
    AttemptTransportError {
        kind: classify::classify(err),
        message: err.to_string(),
    }
}

fn build_client(proxy: Option<&str>) -> Result<Client, EngineError> {
    let mut builder = Client::builder();
    if let Some(proxy) = proxy {
        let proxy = Proxy::all(proxy).map_err(|err| EngineError::InvalidUrl(err.to_string()))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|err| EngineError::InvalidUrl(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_status_matches_429_and_5xx() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(504));
        assert!(!is_retryable_status(505));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn retry_after_parses_integer_seconds() {
        let headers: Headers = vec![("Retry-After".to_string(), "12".to_string())];
        assert_eq!(
            retry_after_from_headers(&headers),
            Some(Duration::from_secs(12))
        );
    }

    #[test]
    fn retry_after_is_case_insensitive_and_absent_by_default() {
        let headers: Headers = vec![];
        assert_eq!(retry_after_from_headers(&headers), None);
    }

    #[test]
    fn jittered_delay_is_never_below_initial_backoff() {
        for _ in 0..50 {
            let delay = jittered(Duration::from_millis(1));
            assert!(delay.as_millis() as u64 >= INITIAL_BACKOFF_MS);
        }
    }

    #[test]
    fn jittered_delay_adds_ten_to_thirty_percent_on_a_large_base() {
        let base = Duration::from_millis(10_000);
        for _ in 0..50 {
            let delay = jittered(base);
            assert!(delay >= base);
            assert!(delay <= base + Duration::from_millis(3_000));
        }
    }

    #[test]
    fn cancellation_flag_defaults_to_false() {
        let ctx = RequestContext {
            request_id: "r1".to_string(),
            cancellation: None,
        };
        assert!(!is_canceled(&ctx));
    }

    #[test]
    fn cancellation_flag_observes_watch_channel() {
        let (tx, rx) = watch::channel(false);
        let ctx = RequestContext {
            request_id: "r1".to_string(),
            cancellation: Some(rx),
        };
        assert!(!is_canceled(&ctx));
        tx.send(true).unwrap();
        assert!(is_canceled(&ctx));
    }
}
