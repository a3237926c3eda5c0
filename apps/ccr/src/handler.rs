use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ccr_core::{PipelineResponse, RouterConfig};
use ccr_protocol::claude_in::AnthropicChatRequest;
use tokio::sync::watch;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

pub struct AppState {
    pub config: RouterConfig,
}

/// `POST /v1/messages`: the caller-facing Anthropic-style chat completions
/// endpoint (spec §6).
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AnthropicChatRequest>,
) -> Response {
    if let Some(denied) = check_shared_secret(&state.config, &headers) {
        return denied;
    }

    let command = headers
        .get("x-ccr-command")
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string());

    // Carries caller cancellation into the pipeline (spec §5/§7
    // CallerCanceled): for a streaming response, `cancel_tx` is moved into
    // the outgoing body and fires the moment axum drops it, which happens
    // as soon as the client disconnects mid-stream.
    let (cancel_tx, cancel_rx) = watch::channel(false);

    match ccr_core::run(&state.config, &request, command.as_deref(), Some(cancel_rx)).await {
        Ok(PipelineResponse::Unary { status, headers, body }) => {
            let mut response = (status_from(status), Body::from(body)).into_response();
            apply_headers(&mut response, headers);
            response
        }
        Ok(PipelineResponse::Stream { status, headers, receiver }) => {
            let stream = CancelOnDrop {
                inner: ReceiverStream::new(receiver).map(Ok::<_, std::io::Error>),
                cancel: Some(cancel_tx),
            };
            let mut response = (status_from(status), Body::from_stream(stream)).into_response();
            apply_headers(&mut response, headers);
            response
        }
        Ok(PipelineResponse::PassthroughError { status, headers, body }) => {
            let mut response = (status_from(status), Body::from(body)).into_response();
            apply_headers(&mut response, headers);
            response
        }
        Err(error) => {
            tracing::error!(error = %error, "orchestrator failed before an upstream call was made");
            (StatusCode::BAD_GATEWAY, error.to_string()).into_response()
        }
    }
}

/// Wraps the outbound SSE stream so that dropping it — which axum does the
/// moment the client disconnects, before the stream runs to completion —
/// signals cancellation to the still-running forwarding task.
struct CancelOnDrop<S> {
    inner: S,
    cancel: Option<watch::Sender<bool>>,
}

impl<S: Stream + Unpin> Stream for CancelOnDrop<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for CancelOnDrop<S> {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(true);
        }
    }
}

fn check_shared_secret(config: &RouterConfig, headers: &HeaderMap) -> Option<Response> {
    let Some(expected) = config.shared_secret.as_deref() else {
        return None;
    };
    let provided = headers.get("x-api-key").and_then(|value| value.to_str().ok());
    if provided == Some(expected) {
        None
    } else {
        Some((StatusCode::UNAUTHORIZED, "missing or invalid x-api-key").into_response())
    }
}

fn status_from(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

fn apply_headers(response: &mut Response, headers: ccr_common::Headers) {
    for (key, value) in headers {
        if key.eq_ignore_ascii_case("content-length") || key.eq_ignore_ascii_case("transfer-encoding") {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::try_from(key.as_str()),
            axum::http::HeaderValue::try_from(value.as_str()),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
}
