//! OpenAI-compatible implementation of the `Transformer` contract (spec
//! §4.6).

use bytes::Bytes;
use ccr_common::Headers;
use ccr_protocol::openai::ChatCompletionResponse;
use ccr_protocol::UnifiedChatRequest;

use crate::transformer::{ResponseContext, StreamDecoder, Transformer, TransformerError};

pub struct OpenAiTransformer;

impl Transformer for OpenAiTransformer {
    fn name(&self) -> &str {
        "openai"
    }

    fn end_point(&self, base_url: &str, _model: &str, _stream: bool) -> String {
        format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
    }

    fn auth(&self, headers: &mut Headers, api_key: &str) {
        headers.retain(|(key, _)| !key.eq_ignore_ascii_case("authorization"));
        headers.push(("authorization".to_string(), format!("Bearer {api_key}")));
    }

    fn transform_request_in(&self, request: &UnifiedChatRequest) -> Result<Bytes, TransformerError> {
        let body = ccr_transform::openai_compat::transform_request_in(request);
        Ok(Bytes::from(serde_json::to_vec(&body)?))
    }

    fn transform_response_in(
        &self,
        body: &[u8],
        _ctx: &ResponseContext,
    ) -> Result<ChatCompletionResponse, TransformerError> {
        let wire: ccr_transform::openai_compat::response::WireChatCompletionResponse =
            serde_json::from_slice(body).map_err(TransformerError::Deserialize)?;
        Ok(ccr_transform::openai_compat::to_caller_response(wire))
    }

    fn new_stream_decoder(&self, _ctx: &ResponseContext) -> Box<dyn StreamDecoder> {
        Box::new(ccr_transform::openai_compat::SsePassthrough::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_fixed_chat_completions_path() {
        let transformer = OpenAiTransformer;
        let url = transformer.end_point("https://api.openrouter.example/", "any-model", true);
        assert_eq!(url, "https://api.openrouter.example/v1/chat/completions");
    }

    #[test]
    fn auth_sets_bearer_header_and_clears_stale_authorization() {
        let transformer = OpenAiTransformer;
        let mut headers: Headers = vec![("Authorization".to_string(), "Bearer stale".to_string())];
        transformer.auth(&mut headers, "secret-key");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0], ("authorization".to_string(), "Bearer secret-key".to_string()));
    }
}
