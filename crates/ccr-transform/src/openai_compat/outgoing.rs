//! `transformRequestIn`: Unified -> OpenAI-compatible upstream wire body
//! (spec §4.6 "Outgoing").

use ccr_protocol::openai::{OpenAIChatRequest, OpenAIMessage, OpenAIToolCall, OpenAIToolCallFunction, OpenAIToolDef, OpenAIToolDefFunction};
use ccr_protocol::{ToolChoice, ToolChoiceMode, UnifiedChatRequest, UnifiedContent, UnifiedContentPart};
use serde_json::{Map, Value};

/// Builds the OpenAI-compatible request body for one UnifiedChatRequest.
pub fn transform_request_in(request: &UnifiedChatRequest) -> OpenAIChatRequest {
    OpenAIChatRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(transform_message).collect(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stream: request.stream,
        tools: request
            .tools
            .as_ref()
            .map(|tools| tools.iter().map(transform_tool).collect()),
        tool_choice: request.tool_choice.as_ref().map(transform_tool_choice),
    }
}

fn transform_message(message: &ccr_protocol::UnifiedMessage) -> OpenAIMessage {
    OpenAIMessage {
        role: role_name(message.role).to_string(),
        content: message.content.as_ref().map(content_to_value),
        tool_calls: message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| OpenAIToolCall {
                    id: call.id.clone(),
                    kind: "function".to_string(),
                    function: OpenAIToolCallFunction {
                        name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    },
                })
                .collect()
        }),
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn role_name(role: ccr_protocol::UnifiedRole) -> &'static str {
    use ccr_protocol::UnifiedRole;
    match role {
        UnifiedRole::System => "system",
        UnifiedRole::User => "user",
        UnifiedRole::Assistant => "assistant",
        UnifiedRole::Tool => "tool",
    }
}

fn content_to_value(content: &UnifiedContent) -> Value {
    match content {
        UnifiedContent::Text(text) => Value::String(text.clone()),
        UnifiedContent::Parts(parts) => {
            Value::Array(parts.iter().map(part_to_value).collect())
        }
    }
}

fn part_to_value(part: &UnifiedContentPart) -> Value {
    match part {
        UnifiedContentPart::Text { text } => {
            serde_json::json!({"type": "text", "text": text})
        }
        UnifiedContentPart::ImageUrl { image_url, media_type } => {
            let mut map = Map::new();
            map.insert("type".to_string(), Value::String("image_url".to_string()));
            map.insert(
                "image_url".to_string(),
                serde_json::json!({"url": image_url.url}),
            );
            if let Some(media_type) = media_type {
                map.insert("media_type".to_string(), Value::String(media_type.clone()));
            }
            Value::Object(map)
        }
    }
}

fn transform_tool(tool: &ccr_protocol::UnifiedTool) -> OpenAIToolDef {
    OpenAIToolDef {
        kind: "function".to_string(),
        function: OpenAIToolDefFunction {
            name: tool.function.name.clone(),
            description: tool.function.description.clone(),
            parameters: strip_schema_markers(&tool.function.parameters),
        },
    }
}

/// Strips `$schema` from the parameters root and from each entry under
/// `parameters.properties` (spec §4.6).
fn strip_schema_markers(parameters: &Value) -> Value {
    let mut value = parameters.clone();
    let Value::Object(map) = &mut value else {
        return value;
    };
    map.remove("$schema");
    if let Some(Value::Object(properties)) = map.get_mut("properties") {
        for (_, schema) in properties.iter_mut() {
            if let Value::Object(schema_map) = schema {
                schema_map.remove("$schema");
            }
        }
    }
    value
}

fn transform_tool_choice(tool_choice: &ToolChoice) -> Value {
    match tool_choice {
        ToolChoice::Mode(ToolChoiceMode::Auto) => Value::String("auto".to_string()),
        ToolChoice::Mode(ToolChoiceMode::None) => Value::String("none".to_string()),
        ToolChoice::Mode(ToolChoiceMode::Required) => Value::String("required".to_string()),
        ToolChoice::Function { function } => {
            serde_json::json!({"type": "function", "function": {"name": function.name}})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccr_protocol::{
        ToolCallKind, ToolChoiceFunction, UnifiedFunctionDef, UnifiedMessage, UnifiedRole,
        UnifiedTool,
    };

    fn request_with_tool_parameters(parameters: Value) -> UnifiedChatRequest {
        UnifiedChatRequest {
            model: "gpt-silicon".to_string(),
            messages: vec![UnifiedMessage {
                role: UnifiedRole::User,
                content: Some(UnifiedContent::Text("hi".to_string())),
                tool_calls: None,
                tool_call_id: None,
                thinking: None,
            }],
            max_tokens: None,
            temperature: None,
            stream: false,
            tools: Some(vec![UnifiedTool {
                kind: ToolCallKind::Function,
                function: UnifiedFunctionDef {
                    name: "read_file".to_string(),
                    description: None,
                    parameters,
                },
            }]),
            tool_choice: None,
            reasoning: None,
        }
    }

    #[test]
    fn schema_marker_is_stripped_from_root_and_properties() {
        let request = request_with_tool_parameters(serde_json::json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "path": {"$schema": "nested", "type": "string"}
            }
        }));
        let built = transform_request_in(&request);
        let parameters = &built.tools.unwrap()[0].function.parameters;
        assert!(parameters.get("$schema").is_none());
        assert!(parameters["properties"]["path"].get("$schema").is_none());
        assert_eq!(parameters["properties"]["path"]["type"], "string");
    }

    #[test]
    fn tool_choice_function_becomes_openai_wire_shape() {
        let mut request = request_with_tool_parameters(serde_json::json!({}));
        request.tool_choice = Some(ToolChoice::Function {
            function: ToolChoiceFunction {
                name: "read_file".to_string(),
            },
        });
        let built = transform_request_in(&request);
        assert_eq!(
            built.tool_choice.unwrap(),
            serde_json::json!({"type": "function", "function": {"name": "read_file"}})
        );
    }

    #[test]
    fn string_content_passes_through_unchanged() {
        let request = request_with_tool_parameters(serde_json::json!({}));
        let built = transform_request_in(&request);
        assert_eq!(built.messages[0].content, Some(Value::String("hi".to_string())));
    }
}
