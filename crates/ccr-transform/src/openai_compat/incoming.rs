//! `transformRequestOut`: the caller's Anthropic-shaped body becomes a
//! UnifiedChatRequest (spec §4.6 "Incoming").

use ccr_protocol::claude_in::{
    AnthropicChatRequest, AnthropicContentPart, AnthropicMessage, AnthropicMessageContent,
    AnthropicRole, AnthropicThinkingType, AnthropicTool, AnthropicToolChoice,
};
use ccr_protocol::{
    ImageUrlData, Reasoning, ReasoningEffort, ToolCallKind, ToolChoice, ToolChoiceFunction,
    ToolChoiceMode, UnifiedChatRequest, UnifiedContent, UnifiedContentPart, UnifiedFunctionCall,
    UnifiedFunctionDef, UnifiedMessage, UnifiedRole, UnifiedTool, UnifiedToolCall,
};
use serde_json::{Map, Value};

/// Converts one caller request into the canonical Unified shape.
pub fn transform_request_out(request: &AnthropicChatRequest) -> UnifiedChatRequest {
    let mut messages = Vec::new();

    if let Some(system) = &request.system {
        messages.push(UnifiedMessage {
            role: UnifiedRole::System,
            content: Some(UnifiedContent::Text(flatten_system(system))),
            tool_calls: None,
            tool_call_id: None,
            thinking: None,
        });
    }

    for message in &request.messages {
        messages.push(transform_message(message));
    }

    UnifiedChatRequest {
        model: request.model.clone(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        stream: request.stream,
        tools: request.tools.as_ref().map(|tools| tools.iter().map(transform_tool).collect()),
        tool_choice: request.tool_choice.as_ref().map(transform_tool_choice),
        reasoning: transform_thinking(request.thinking.as_ref()),
    }
}

/// Anthropic's `thinking` only toggles extended thinking on/off, with no
/// discrete effort levels; `"enabled"` maps to the highest Unified effort
/// tier and carries `budget_tokens` through as `max_tokens`.
fn transform_thinking(thinking: Option<&ccr_protocol::claude_in::AnthropicThinking>) -> Option<Reasoning> {
    let thinking = thinking?;
    if thinking.kind != AnthropicThinkingType::Enabled {
        return None;
    }
    Some(Reasoning {
        effort: ReasoningEffort::High,
        max_tokens: thinking.budget_tokens,
    })
}

fn flatten_system(system: &ccr_protocol::claude_in::SystemParam) -> String {
    use ccr_protocol::claude_in::SystemParam;
    match system {
        SystemParam::Text(text) => text.clone(),
        SystemParam::Blocks(blocks) => blocks
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn transform_message(message: &AnthropicMessage) -> UnifiedMessage {
    match message.role {
        AnthropicRole::User => UnifiedMessage {
            role: UnifiedRole::User,
            content: Some(transform_user_content(&message.content)),
            tool_calls: None,
            tool_call_id: None,
            thinking: None,
        },
        AnthropicRole::Assistant => {
            let (text, tool_calls) = transform_assistant_content(&message.content);
            UnifiedMessage {
                role: UnifiedRole::Assistant,
                content: text.map(UnifiedContent::Text),
                tool_calls,
                tool_call_id: None,
                thinking: None,
            }
        }
        AnthropicRole::Tool => {
            let (tool_call_id, content) = transform_tool_content(&message.content);
            UnifiedMessage {
                role: UnifiedRole::Tool,
                content: Some(UnifiedContent::Text(content)),
                tool_calls: None,
                tool_call_id: Some(tool_call_id),
                thinking: None,
            }
        }
    }
}

fn transform_user_content(content: &AnthropicMessageContent) -> UnifiedContent {
    match content {
        AnthropicMessageContent::Text(text) => UnifiedContent::Text(text.clone()),
        AnthropicMessageContent::Parts(parts) => UnifiedContent::Parts(
            parts
                .iter()
                .filter_map(|part| match part {
                    AnthropicContentPart::Text { text } => {
                        Some(UnifiedContentPart::Text { text: text.clone() })
                    }
                    AnthropicContentPart::ImageUrl { image_url, media_type } => {
                        Some(UnifiedContentPart::ImageUrl {
                            image_url: ImageUrlData {
                                url: image_url.url.clone(),
                            },
                            media_type: media_type.clone(),
                        })
                    }
                    AnthropicContentPart::ToolCall { .. }
                    | AnthropicContentPart::ToolResult { .. } => None,
                })
                .collect(),
        ),
    }
}

fn transform_assistant_content(
    content: &AnthropicMessageContent,
) -> (Option<String>, Option<Vec<UnifiedToolCall>>) {
    match content {
        AnthropicMessageContent::Text(text) => (Some(text.clone()), None),
        AnthropicMessageContent::Parts(parts) => {
            let mut texts = Vec::new();
            let mut tool_calls = Vec::new();
            for part in parts {
                match part {
                    AnthropicContentPart::Text { text } => texts.push(text.clone()),
                    AnthropicContentPart::ToolCall { id, function } => {
                        let arguments_value =
                            function.arguments.clone().unwrap_or(Value::Object(Map::new()));
                        let arguments = serde_json::to_string(&arguments_value)
                            .unwrap_or_else(|_| "{}".to_string());
                        tool_calls.push(UnifiedToolCall {
                            id: id.clone(),
                            kind: ToolCallKind::Function,
                            function: UnifiedFunctionCall {
                                name: function.name.clone(),
                                arguments,
                            },
                        });
                    }
                    AnthropicContentPart::ImageUrl { .. } | AnthropicContentPart::ToolResult { .. } => {}
                }
            }
            let text = if texts.is_empty() { None } else { Some(texts.join("\n")) };
            let tool_calls = if tool_calls.is_empty() { None } else { Some(tool_calls) };
            (text, tool_calls)
        }
    }
}

fn transform_tool_content(content: &AnthropicMessageContent) -> (String, String) {
    match content {
        AnthropicMessageContent::Parts(parts) => parts
            .iter()
            .find_map(|part| match part {
                AnthropicContentPart::ToolResult { tool_call_id, content } => {
                    Some((tool_call_id.clone(), stringify_tool_result(content)))
                }
                _ => None,
            })
            .unwrap_or_default(),
        AnthropicMessageContent::Text(text) => (String::new(), text.clone()),
    }
}

fn stringify_tool_result(content: &Option<Value>) -> String {
    match content {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn transform_tool(tool: &AnthropicTool) -> UnifiedTool {
    match tool {
        AnthropicTool::Modern { function } => UnifiedTool {
            kind: ToolCallKind::Function,
            function: UnifiedFunctionDef {
                name: function.name.clone(),
                description: function.description.clone(),
                parameters: function.parameters.clone(),
            },
        },
        AnthropicTool::Legacy {
            name,
            description,
            input_schema,
        } => UnifiedTool {
            kind: ToolCallKind::Function,
            function: UnifiedFunctionDef {
                name: name.clone(),
                description: description.clone(),
                parameters: input_schema.clone(),
            },
        },
    }
}

fn transform_tool_choice(tool_choice: &AnthropicToolChoice) -> ToolChoice {
    match tool_choice {
        AnthropicToolChoice::Mode(mode) => match mode.as_str() {
            "none" => ToolChoice::Mode(ToolChoiceMode::None),
            "required" => ToolChoice::Mode(ToolChoiceMode::Required),
            _ => ToolChoice::Mode(ToolChoiceMode::Auto),
        },
        AnthropicToolChoice::Function { function } => ToolChoice::Function {
            function: ToolChoiceFunction {
                name: function.name.clone(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccr_protocol::claude_in::{
        AnthropicImageUrl, AnthropicToolCallFunction, AnthropicToolFunction, SystemBlock,
        SystemParam,
    };

    fn request_with_messages(messages: Vec<AnthropicMessage>) -> AnthropicChatRequest {
        AnthropicChatRequest {
            model: "claude-placeholder".to_string(),
            system: None,
            messages,
            max_tokens: None,
            temperature: None,
            stream: false,
            tools: None,
            tool_choice: None,
            thinking: None,
        }
    }

    #[test]
    fn system_text_becomes_system_message() {
        let mut request = request_with_messages(vec![]);
        request.system = Some(SystemParam::Text("be helpful".to_string()));
        let unified = transform_request_out(&request);
        assert_eq!(unified.messages[0].role, UnifiedRole::System);
        assert_eq!(unified.messages[0].text(), "be helpful");
    }

    #[test]
    fn system_blocks_are_joined_with_newline() {
        let mut request = request_with_messages(vec![]);
        request.system = Some(SystemParam::Blocks(vec![
            SystemBlock {
                text: "first".to_string(),
                cache_control: None,
            },
            SystemBlock {
                text: "second".to_string(),
                cache_control: Some(serde_json::json!({"type": "ephemeral"})),
            },
        ]));
        let unified = transform_request_out(&request);
        assert_eq!(unified.messages[0].text(), "first\nsecond");
    }

    #[test]
    fn assistant_tool_call_parts_become_unified_tool_calls() {
        let request = request_with_messages(vec![AnthropicMessage {
            role: AnthropicRole::Assistant,
            content: AnthropicMessageContent::Parts(vec![
                AnthropicContentPart::Text {
                    text: "let me check".to_string(),
                },
                AnthropicContentPart::ToolCall {
                    id: "call_1".to_string(),
                    function: AnthropicToolCallFunction {
                        name: "read_file".to_string(),
                        arguments: Some(serde_json::json!({"path": "a.rs"})),
                    },
                },
            ]),
        }]);
        let unified = transform_request_out(&request);
        let message = &unified.messages[0];
        assert_eq!(message.text(), "let me check");
        let tool_calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls[0].id, "call_1");
        assert_eq!(tool_calls[0].function.arguments, "{\"path\":\"a.rs\"}");
    }

    #[test]
    fn tool_result_message_carries_tool_call_id() {
        let request = request_with_messages(vec![AnthropicMessage {
            role: AnthropicRole::Tool,
            content: AnthropicMessageContent::Parts(vec![AnthropicContentPart::ToolResult {
                tool_call_id: "call_1".to_string(),
                content: Some(Value::String("file contents".to_string())),
            }]),
        }]);
        let unified = transform_request_out(&request);
        assert_eq!(unified.messages[0].role, UnifiedRole::Tool);
        assert_eq!(unified.messages[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(unified.messages[0].text(), "file contents");
    }

    #[test]
    fn tool_result_non_string_content_is_json_stringified() {
        let request = request_with_messages(vec![AnthropicMessage {
            role: AnthropicRole::Tool,
            content: AnthropicMessageContent::Parts(vec![AnthropicContentPart::ToolResult {
                tool_call_id: "call_1".to_string(),
                content: Some(serde_json::json!({"ok": true})),
            }]),
        }]);
        let unified = transform_request_out(&request);
        assert_eq!(unified.messages[0].text(), "{\"ok\":true}");
    }

    #[test]
    fn user_image_url_part_is_preserved_and_tool_parts_are_dropped() {
        let request = request_with_messages(vec![AnthropicMessage {
            role: AnthropicRole::User,
            content: AnthropicMessageContent::Parts(vec![
                AnthropicContentPart::ImageUrl {
                    image_url: AnthropicImageUrl {
                        url: "https://example.com/x.png".to_string(),
                    },
                    media_type: Some("image/png".to_string()),
                },
                AnthropicContentPart::ToolResult {
                    tool_call_id: "orphan".to_string(),
                    content: None,
                },
            ]),
        }]);
        let unified = transform_request_out(&request);
        let UnifiedContent::Parts(parts) = unified.messages[0].content.as_ref().unwrap() else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn legacy_tool_shape_is_normalized_to_modern_fields() {
        let mut request = request_with_messages(vec![]);
        request.tools = Some(vec![AnthropicTool::Legacy {
            name: "read_file".to_string(),
            description: Some("reads a file".to_string()),
            input_schema: serde_json::json!({"type": "object"}),
        }]);
        let unified = transform_request_out(&request);
        let tool = &unified.tools.unwrap()[0];
        assert_eq!(tool.function.name, "read_file");
        assert_eq!(tool.function.parameters, serde_json::json!({"type": "object"}));
    }

    #[test]
    fn modern_tool_shape_passes_through() {
        let mut request = request_with_messages(vec![]);
        request.tools = Some(vec![AnthropicTool::Modern {
            function: AnthropicToolFunction {
                name: "write_file".to_string(),
                description: None,
                parameters: serde_json::json!({"type": "object"}),
            },
        }]);
        let unified = transform_request_out(&request);
        assert_eq!(unified.tools.unwrap()[0].function.name, "write_file");
    }

    #[test]
    fn enabled_thinking_maps_to_high_effort_with_budget_as_max_tokens() {
        use ccr_protocol::claude_in::AnthropicThinking;
        let mut request = request_with_messages(vec![]);
        request.thinking = Some(AnthropicThinking {
            kind: AnthropicThinkingType::Enabled,
            budget_tokens: Some(4096),
        });
        let unified = transform_request_out(&request);
        let reasoning = unified.reasoning.unwrap();
        assert_eq!(reasoning.effort, ReasoningEffort::High);
        assert_eq!(reasoning.max_tokens, Some(4096));
    }

    #[test]
    fn disabled_thinking_yields_no_reasoning() {
        use ccr_protocol::claude_in::AnthropicThinking;
        let mut request = request_with_messages(vec![]);
        request.thinking = Some(AnthropicThinking {
            kind: AnthropicThinkingType::Disabled,
            budget_tokens: None,
        });
        let unified = transform_request_out(&request);
        assert!(unified.reasoning.is_none());
    }

    #[test]
    fn tool_choice_function_is_preserved() {
        use ccr_protocol::claude_in::AnthropicToolChoiceFn;
        let mut request = request_with_messages(vec![]);
        request.tool_choice = Some(AnthropicToolChoice::Function {
            function: AnthropicToolChoiceFn {
                name: "read_file".to_string(),
            },
        });
        let unified = transform_request_out(&request);
        match unified.tool_choice.unwrap() {
            ToolChoice::Function { function } => assert_eq!(function.name, "read_file"),
            _ => panic!("expected function tool choice"),
        }
    }
}
