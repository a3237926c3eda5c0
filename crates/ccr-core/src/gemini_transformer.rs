//! Gemini implementation of the `Transformer` contract (spec §4.4, §4.5).

use bytes::Bytes;
use ccr_common::Headers;
use ccr_protocol::gemini::GenerateContentResponse;
use ccr_protocol::openai::ChatCompletionResponse;
use ccr_protocol::UnifiedChatRequest;

use crate::transformer::{ResponseContext, StreamDecoder, Transformer, TransformerError};

pub struct GeminiTransformer;

impl Transformer for GeminiTransformer {
    fn name(&self) -> &str {
        "gemini"
    }

    fn end_point(&self, base_url: &str, model: &str, stream: bool) -> String {
        let base = base_url.trim_end_matches('/');
        if stream {
            format!("{base}/{model}:streamGenerateContent?alt=sse")
        } else {
            format!("{base}/{model}:generateContent")
        }
    }

    fn auth(&self, headers: &mut Headers, api_key: &str) {
        headers.retain(|(key, _)| !key.eq_ignore_ascii_case("authorization"));
        headers.push(("x-goog-api-key".to_string(), api_key.to_string()));
    }

    fn transform_request_in(&self, request: &UnifiedChatRequest) -> Result<Bytes, TransformerError> {
        let body = ccr_transform::gemini::build_request(request)?;
        Ok(Bytes::from(serde_json::to_vec(&body)?))
    }

    fn transform_response_in(
        &self,
        body: &[u8],
        ctx: &ResponseContext,
    ) -> Result<ChatCompletionResponse, TransformerError> {
        let parsed: GenerateContentResponse =
            serde_json::from_slice(body).map_err(TransformerError::Deserialize)?;
        Ok(ccr_transform::gemini::translate_unary_response(
            &parsed,
            &ctx.model,
            ctx.id.clone(),
            ctx.created,
        ))
    }

    fn new_stream_decoder(&self, ctx: &ResponseContext) -> Box<dyn StreamDecoder> {
        Box::new(ccr_transform::gemini::GeminiSseDecoder::new(
            ctx.id.clone(),
            ctx.model.clone(),
            ctx.created,
        ))
    }
}
