//! The polymorphic per-provider contract (spec §4.6): `transformRequestIn`,
//! `transformRequestOut`, `transformResponseIn`/`Out` (folded into one
//! response-building step here), `auth`, `endPoint`, `name`.

use bytes::Bytes;
use ccr_common::Headers;
use ccr_protocol::claude_in::AnthropicChatRequest;
use ccr_protocol::openai::ChatCompletionResponse;
use ccr_protocol::UnifiedChatRequest;

#[derive(Debug, thiserror::Error)]
pub enum TransformerError {
    #[error("request schema error: {0}")]
    Schema(#[from] ccr_transform::schema::SchemaError),
    #[error("failed to serialize upstream request body: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to parse upstream response body: {0}")]
    Deserialize(serde_json::Error),
}

/// Per-request metadata a transformer needs to build a caller-facing
/// response or streaming frame, but that isn't part of the upstream wire
/// body itself (spec §4.5 unary/streaming translators both take id/model/
/// created as parameters).
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub id: String,
    pub model: String,
    pub created: i64,
}

/// Unifies the two streaming adapters (`GeminiSseDecoder`,
/// `SsePassthrough`) behind one interface so the orchestrator can drive
/// either without knowing which provider it's talking to.
pub trait StreamDecoder: Send {
    fn push_bytes(&mut self, bytes: &[u8]) -> Vec<String>;
    fn close(&mut self) -> Option<String>;
    fn is_closed(&self) -> bool;
}

impl StreamDecoder for ccr_transform::gemini::GeminiSseDecoder {
    fn push_bytes(&mut self, bytes: &[u8]) -> Vec<String> {
        ccr_transform::gemini::GeminiSseDecoder::push_bytes(self, bytes)
    }
    fn close(&mut self) -> Option<String> {
        ccr_transform::gemini::GeminiSseDecoder::close(self)
    }
    fn is_closed(&self) -> bool {
        ccr_transform::gemini::GeminiSseDecoder::is_closed(self)
    }
}

impl StreamDecoder for ccr_transform::openai_compat::SsePassthrough {
    fn push_bytes(&mut self, bytes: &[u8]) -> Vec<String> {
        ccr_transform::openai_compat::SsePassthrough::push_bytes(self, bytes)
    }
    fn close(&mut self) -> Option<String> {
        ccr_transform::openai_compat::SsePassthrough::close(self)
    }
    fn is_closed(&self) -> bool {
        ccr_transform::openai_compat::SsePassthrough::is_closed(self)
    }
}

pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    /// Builds the full upstream URL for one call.
    fn end_point(&self, base_url: &str, model: &str, stream: bool) -> String;

    /// Sets provider auth headers on the outgoing request, clearing any
    /// stale `Authorization` header first (spec §4.7 "explicitly unset
    /// Authorization to avoid upstream 400s").
    fn auth(&self, headers: &mut Headers, api_key: &str);

    /// `transformRequestOut`: the caller's Anthropic-shaped body becomes a
    /// UnifiedChatRequest. Provider-agnostic (spec §3 "the provider-agnostic
    /// entry point"), so every transformer shares this implementation.
    fn transform_request_out(&self, request: &AnthropicChatRequest) -> UnifiedChatRequest {
        ccr_transform::openai_compat::transform_request_out(request)
    }

    /// `transformRequestIn`: Unified -> this provider's wire body.
    fn transform_request_in(&self, request: &UnifiedChatRequest) -> Result<Bytes, TransformerError>;

    /// Unary response translation: upstream wire body -> caller-facing body.
    fn transform_response_in(
        &self,
        body: &[u8],
        ctx: &ResponseContext,
    ) -> Result<ChatCompletionResponse, TransformerError>;

    /// Builds a fresh per-stream decoder for the streaming response path.
    fn new_stream_decoder(&self, ctx: &ResponseContext) -> Box<dyn StreamDecoder>;
}
