//! The canonical internal chat-request/response schema (spec §3).
//!
//! A `UnifiedChatRequest` is produced once per caller turn by a
//! transformer's `transform_request_out`, lives only for the duration of
//! that upstream call, and carries no state across requests.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedChatRequest {
    pub model: String,
    pub messages: Vec<UnifiedMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<UnifiedTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnifiedRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedMessage {
    pub role: UnifiedRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<UnifiedContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<UnifiedToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Invariant: at most one `thinking.signature` per message (spec §3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<UnifiedThinking>,
}

impl UnifiedMessage {
    pub fn text(&self) -> String {
        match &self.content {
            None => String::new(),
            Some(UnifiedContent::Text(text)) => text.clone(),
            Some(UnifiedContent::Parts(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    UnifiedContentPart::Text { text } => Some(text.as_str()),
                    UnifiedContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnifiedContent {
    Text(String),
    Parts(Vec<UnifiedContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnifiedContentPart {
    Text { text: String },
    ImageUrl {
        image_url: ImageUrlData,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrlData {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ToolCallKind,
    pub function: UnifiedFunctionCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallKind {
    Function,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFunctionCall {
    pub name: String,
    /// Always a JSON-serialized string at the Unified level (spec §3 invariant),
    /// never a parsed object.
    pub arguments: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifiedThinking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedTool {
    #[serde(rename = "type")]
    pub kind: ToolCallKind,
    pub function: UnifiedFunctionDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFunctionDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(ToolChoiceMode),
    Function { function: ToolChoiceFunction },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    Auto,
    None,
    Required,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reasoning {
    pub effort: ReasoningEffort,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    None,
    Low,
    Medium,
    High,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text_joins_array_parts_with_spaces() {
        let message = UnifiedMessage {
            role: UnifiedRole::User,
            content: Some(UnifiedContent::Parts(vec![
                UnifiedContentPart::Text {
                    text: "hello".to_string(),
                },
                UnifiedContentPart::Text {
                    text: "world".to_string(),
                },
            ])),
            tool_calls: None,
            tool_call_id: None,
            thinking: None,
        };
        assert_eq!(message.text(), "hello world");
    }

    #[test]
    fn message_text_on_missing_content_is_empty() {
        let message = UnifiedMessage {
            role: UnifiedRole::Tool,
            content: None,
            tool_calls: None,
            tool_call_id: Some("call_1".to_string()),
            thinking: None,
        };
        assert_eq!(message.text(), "");
    }
}
