//! The caller-facing Anthropic-style chat completions request (spec §6).
//!
//! This is the shape the coding-assistant CLI sends in. Only the subset
//! the router actually reads is modeled; unknown top-level fields are
//! accepted and ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicChatRequest {
    pub model: String,
    #[serde(default)]
    pub system: Option<SystemParam>,
    pub messages: Vec<AnthropicMessage>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(default)]
    pub tool_choice: Option<AnthropicToolChoice>,
    #[serde(default)]
    pub thinking: Option<AnthropicThinking>,
}

/// Anthropic's real extended-thinking wire shape: `"thinking": {"type":
/// "enabled"|"disabled", "budget_tokens": N}` (spec §6 reasoning carry-through).
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicThinking {
    #[serde(rename = "type")]
    pub kind: AnthropicThinkingType,
    #[serde(default)]
    pub budget_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnthropicThinkingType {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SystemParam {
    Text(String),
    Blocks(Vec<SystemBlock>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemBlock {
    pub text: String,
    #[serde(default)]
    pub cache_control: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicMessage {
    pub role: AnthropicRole,
    pub content: AnthropicMessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnthropicRole {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnthropicMessageContent {
    Text(String),
    Parts(Vec<AnthropicContentPart>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: AnthropicImageUrl,
        #[serde(default)]
        media_type: Option<String>,
    },
    ToolCall {
        id: String,
        function: AnthropicToolCallFunction,
    },
    ToolResult {
        tool_call_id: String,
        #[serde(default)]
        content: Option<serde_json::Value>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnthropicTool {
    Modern {
        function: AnthropicToolFunction,
    },
    Legacy {
        name: String,
        #[serde(default)]
        description: Option<String>,
        input_schema: serde_json::Value,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicToolFunction {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnthropicToolChoice {
    Mode(String),
    Function { function: AnthropicToolChoiceFn },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicToolChoiceFn {
    pub name: String,
}

/// Serialized JSON for a `role: "tool"` message produced by the engine for
/// round-trip tests; production code only ever deserializes this shape.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResultEcho {
    pub tool_call_id: String,
    pub content: serde_json::Value,
}
