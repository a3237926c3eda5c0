//! Wire-level deserialization of an OpenAI-compatible upstream response and
//! its (near-identity) conversion into the caller-facing shape (spec §4.6
//! "Response translation").

use ccr_protocol::openai::{
    ChatCompletionChoice, ChatCompletionMessage, ChatCompletionResponse, OpenAIToolCall, Usage,
};
use serde::Deserialize;

/// The upstream wire shape. Kept separate from `ChatCompletionResponse`
/// because the caller-facing type uses `&'static str` literals for fields
/// (`object`, `role`) that have no fixed value on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct WireChatCompletionResponse {
    pub id: String,
    #[serde(default)]
    pub created: i64,
    pub model: String,
    pub choices: Vec<WireChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireChoice {
    pub index: u32,
    pub message: WireMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
}

/// Near-identity conversion: the wire and caller-facing shapes agree on
/// everything except the literal-`&str` fields.
pub fn to_caller_response(wire: WireChatCompletionResponse) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: wire.id,
        object: "chat.completion",
        created: wire.created,
        model: wire.model,
        choices: wire
            .choices
            .into_iter()
            .map(|choice| ChatCompletionChoice {
                index: choice.index,
                message: ChatCompletionMessage {
                    role: "assistant",
                    content: choice.message.content,
                    tool_calls: choice.message.tool_calls,
                    thinking: None,
                },
                finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            })
            .collect(),
        usage: wire.usage,
    }
}
