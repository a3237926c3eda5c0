//! Ties the request engine, the per-provider transformers, routing, and
//! API key resolution into the single request/response pipeline described
//! by the control-flow diagram: caller -> (transformRequestOut) ->
//! (transformRequestIn) -> HTTP Engine -> upstream -> (transformResponse)
//! -> caller.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use ccr_common::{ConfigError, Headers};
use ccr_http::{Cancellation, EngineBody, EngineError, RequestContext, RequestEngineConfig};
use ccr_protocol::claude_in::AnthropicChatRequest;
use tokio::sync::{mpsc, watch};

use crate::config::{ProviderKind, RouterConfig};
use crate::gemini_transformer::GeminiTransformer;
use crate::openai_transformer::OpenAiTransformer;
use crate::routing::resolve_route;
use crate::transformer::{ResponseContext, Transformer, TransformerError};

const SUGGESTION_MODE_DELAY: Duration = Duration::from_millis(3000);
const STREAM_CHANNEL_CAPACITY: usize = 32;
const DONE_FRAME: &str = "data: [DONE]\n\n";

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("no provider configured with name '{0}'")]
    UnknownProvider(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transform(#[from] TransformerError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub enum PipelineResponse {
    Unary {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
    Stream {
        status: u16,
        headers: Headers,
        receiver: mpsc::Receiver<Bytes>,
    },
    /// A non-retryable upstream error (or an exhausted-retries error),
    /// forwarded to the caller unchanged (spec §7 NonRetryableStatus).
    PassthroughError {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
}

fn transformer_for(kind: ProviderKind) -> Box<dyn Transformer> {
    match kind {
        ProviderKind::Gemini => Box::new(GeminiTransformer),
        ProviderKind::OpenAi => Box::new(OpenAiTransformer),
    }
}

pub async fn run(
    config: &RouterConfig,
    request: &AnthropicChatRequest,
    command: Option<&str>,
    cancellation: Option<Cancellation>,
) -> Result<PipelineResponse, OrchestratorError> {
    let entry_transformer = transformer_for(ProviderKind::Gemini);
    let mut unified = entry_transformer.transform_request_out(request);

    let target = resolve_route(&config.router, &mut unified, command);
    unified.model = target.model.clone();

    let provider = config
        .provider(&target.provider)
        .ok_or_else(|| OrchestratorError::UnknownProvider(target.provider.clone()))?;

    let transformer = transformer_for(provider.kind);
    let api_key = crate::api_key::resolve_api_key(provider).await?;

    let body = transformer.transform_request_in(&unified)?;
    let url = transformer.end_point(&provider.base_url, &unified.model, unified.stream);

    let mut headers: Headers = Vec::new();
    transformer.auth(&mut headers, &api_key);

    let id = generate_response_id();
    let created = unix_seconds_now();
    let ctx = ResponseContext {
        id: id.clone(),
        model: unified.model.clone(),
        created,
    };

    let engine_config = RequestEngineConfig {
        headers,
        https_proxy: provider.https_proxy.clone(),
        stream: unified.stream,
    };
    let req_ctx = RequestContext {
        request_id: id,
        cancellation,
    };

    let response = ccr_http::send(&url, body, &engine_config, &req_ctx).await?;

    if !(200..300).contains(&response.status) {
        tracing::warn!(status = response.status, provider = %provider.name, "upstream returned a non-retryable error");
        let EngineBody::Bytes(error_body) = response.body else {
            unreachable!("non-success responses are always buffered")
        };
        return Ok(PipelineResponse::PassthroughError {
            status: response.status,
            headers: response.headers,
            body: error_body,
        });
    }

    match response.body {
        EngineBody::Bytes(body) => {
            if ccr_transform::is_suggestion_mode(&unified.messages) {
                tokio::time::sleep(SUGGESTION_MODE_DELAY).await;
            }
            let caller_response = transformer.transform_response_in(&body, &ctx)?;
            let serialized = Bytes::from(
                serde_json::to_vec(&caller_response).map_err(TransformerError::Serialize)?,
            );
            Ok(PipelineResponse::Unary {
                status: response.status,
                headers: response.headers,
                body: serialized,
            })
        }
        EngineBody::Stream(upstream_rx) => {
            let (tx, rx) = mpsc::channel::<Bytes>(STREAM_CHANNEL_CAPACITY);
            let decoder = transformer.new_stream_decoder(&ctx);
            let suggestion_mode = ccr_transform::is_suggestion_mode(&unified.messages);
            let cancellation = req_ctx.cancellation.clone();
            tokio::spawn(forward_stream(upstream_rx, decoder, tx, suggestion_mode, cancellation));
            Ok(PipelineResponse::Stream {
                status: response.status,
                headers: response.headers,
                receiver: rx,
            })
        }
    }
}

async fn forward_stream(
    mut upstream_rx: mpsc::Receiver<Bytes>,
    mut decoder: Box<dyn crate::transformer::StreamDecoder>,
    tx: mpsc::Sender<Bytes>,
    suggestion_mode: bool,
    mut cancellation: Option<watch::Receiver<bool>>,
) {
    loop {
        let chunk = match &mut cancellation {
            Some(cancel) => tokio::select! {
                biased;
                _ = cancel.changed() => {
                    // Caller abort: close without emitting [DONE] (spec §5).
                    return;
                }
                chunk = upstream_rx.recv() => chunk,
            },
            None => upstream_rx.recv().await,
        };

        match chunk {
            Some(bytes) => {
                for frame in decoder.push_bytes(&bytes) {
                    if suggestion_mode && frame == DONE_FRAME {
                        tokio::time::sleep(SUGGESTION_MODE_DELAY).await;
                    }
                    if tx.send(Bytes::from(frame)).await.is_err() {
                        return;
                    }
                }
                if decoder.is_closed() {
                    return;
                }
            }
            None => {
                if !decoder.is_closed() {
                    tracing::warn!("upstream stream closed before [DONE]; synthesizing final frame");
                    if let Some(frame) = decoder.close() {
                        if suggestion_mode {
                            tokio::time::sleep(SUGGESTION_MODE_DELAY).await;
                        }
                        let _ = tx.send(Bytes::from(frame)).await;
                    }
                }
                return;
            }
        }
    }
}

fn generate_response_id() -> String {
    format!("ccr-{}", unix_nanos_now())
}

fn unix_seconds_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn unix_nanos_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, RouteTarget, RouterRules};
    use std::collections::HashMap;

    fn config_with_provider(kind: ProviderKind) -> RouterConfig {
        RouterConfig {
            host: "127.0.0.1".to_string(),
            port: 3456,
            shared_secret: None,
            providers: vec![ProviderConfig {
                name: "gemini".to_string(),
                kind,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                api_key_env: Some("CCR_TEST_ORCHESTRATOR_KEY".to_string()),
                api_key: None,
                https_proxy: None,
            }],
            router: RouterRules {
                default_provider: "gemini".to_string(),
                default_model: "gemini-2.5-flash".to_string(),
                long_context_threshold: None,
                long_context_provider: None,
                long_context_model: None,
                command_overrides: HashMap::new(),
            },
        }
    }

    #[test]
    fn unknown_provider_name_is_distinguishable_at_lookup() {
        let config = config_with_provider(ProviderKind::Gemini);
        assert!(config.provider("openai").is_none());
        let _target = RouteTarget {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
        };
    }

    #[test]
    fn response_ids_are_unique_across_calls() {
        let a = generate_response_id();
        let b = generate_response_id();
        assert_ne!(a, b);
        assert!(a.starts_with("ccr-"));
    }
}
