//! Builds a Gemini `generateContent` request body from a UnifiedChatRequest
//! (spec §4.4).

use std::collections::HashMap;

use ccr_protocol::gemini::{
    Blob, Content, FileData, FunctionCall, FunctionCallingConfig, FunctionDeclaration,
    FunctionResponse, FunctionResponseBody, GenerateContentRequest, GenerationConfig,
    GoogleSearch, Part, ThinkingConfig, Tool, ToolConfig,
};
use ccr_protocol::{
    ReasoningEffort, ToolChoice, ToolChoiceMode, UnifiedChatRequest, UnifiedContent,
    UnifiedContentPart, UnifiedMessage, UnifiedRole,
};
use serde_json::{Map, Value};

use crate::loop_detector::detect_loop_hint;
use crate::schema::{t_tool_parameters, SchemaError};

pub const SYSTEM_INSTRUCTION_TEXT: &str = "<role>\nYou are a coding assistant operating inside Claude Code, a CLI tool for software development.\n</role>\n\n<tool-guidance>\nThe Edit tool performs exact string replacement in files:\n- old_string must EXACTLY match text currently in the file, including whitespace and indentation\n- new_string must be DIFFERENT from old_string — identical strings will always fail\n- Read a file before editing it to ensure you have the current contents\n- If Edit fails, use the Write tool to replace the entire file instead\n</tool-guidance>\n\n<constraints>\nIf a tool operation fails twice with the same error, switch to a different non-destructive approach.\nIf no approach works, clearly tell the user what you attempted and that you cannot proceed — do not keep retrying the same failing operation.\n</constraints>";

const WEB_SEARCH_TOOL_NAME: &str = "web_search";

/// Builds the full Gemini request body for one UnifiedChatRequest.
pub fn build_request(request: &UnifiedChatRequest) -> Result<GenerateContentRequest, SchemaError> {
    Ok(GenerateContentRequest {
        contents: build_contents(request)?,
        tools: build_tools(request)?,
        tool_config: build_tool_config(request),
        generation_config: Some(build_generation_config(request)),
        system_instruction: Some(Content {
            role: Some("user".to_string()),
            parts: vec![Part::text(SYSTEM_INSTRUCTION_TEXT)],
        }),
    })
}

fn build_tools(request: &UnifiedChatRequest) -> Result<Option<Vec<Tool>>, SchemaError> {
    let Some(tools) = &request.tools else {
        return Ok(None);
    };
    if tools.is_empty() {
        return Ok(None);
    }

    let mut declarations = Vec::new();
    let mut gemini_tools = Vec::new();

    for tool in tools {
        if tool.function.name == WEB_SEARCH_TOOL_NAME {
            gemini_tools.push(Tool {
                function_declarations: None,
                google_search: Some(GoogleSearch {}),
            });
            continue;
        }
        declarations.push(FunctionDeclaration {
            name: tool.function.name.clone(),
            description: tool.function.description.clone(),
            parameters_json_schema: Some(t_tool_parameters(&tool.function.parameters)?),
        });
    }

    if !declarations.is_empty() {
        gemini_tools.push(Tool {
            function_declarations: Some(declarations),
            google_search: None,
        });
    }

    Ok(if gemini_tools.is_empty() {
        None
    } else {
        Some(gemini_tools)
    })
}

fn build_tool_config(request: &UnifiedChatRequest) -> Option<ToolConfig> {
    let tool_choice = request.tool_choice.as_ref()?;
    let function_calling_config = match tool_choice {
        ToolChoice::Mode(ToolChoiceMode::Auto) => FunctionCallingConfig {
            mode: "auto",
            allowed_function_names: None,
        },
        ToolChoice::Mode(ToolChoiceMode::None) => FunctionCallingConfig {
            mode: "none",
            allowed_function_names: None,
        },
        ToolChoice::Mode(ToolChoiceMode::Required) => FunctionCallingConfig {
            mode: "any",
            allowed_function_names: None,
        },
        ToolChoice::Function { function } => FunctionCallingConfig {
            mode: "any",
            allowed_function_names: Some(vec![function.name.clone()]),
        },
    };
    Some(ToolConfig {
        function_calling_config,
    })
}

fn build_generation_config(request: &UnifiedChatRequest) -> GenerationConfig {
    let model = request.model.to_lowercase();
    let is_gemini3 = model.contains("gemini-3");
    let is_pro = model.contains("pro");

    let mut config = GenerationConfig::default();
    if is_gemini3 {
        config.temperature = Some(1.0);
    }

    if let Some(reasoning) = &request.reasoning {
        if matches!(
            reasoning.effort,
            ReasoningEffort::Low | ReasoningEffort::Medium | ReasoningEffort::High
        ) {
            let mut thinking_config = ThinkingConfig {
                include_thoughts: Some(true),
                ..Default::default()
            };

            if is_gemini3 {
                let level = match reasoning.effort {
                    ReasoningEffort::High => "HIGH",
                    ReasoningEffort::Medium if !is_pro => "MEDIUM",
                    _ => "LOW",
                };
                thinking_config.thinking_level = Some(level);
            } else {
                let (min, max) = if is_pro { (128, 32768) } else { (0, 24576) };
                if let Some(max_tokens) = reasoning.max_tokens {
                    let clamped = max_tokens.clamp(min, max);
                    thinking_config.thinking_budget = Some(clamped as i32);
                }
            }

            config.thinking_config = Some(thinking_config);
        }
    }

    config
}

fn build_contents(request: &UnifiedChatRequest) -> Result<Vec<Content>, SchemaError> {
    let tool_responses = collect_tool_responses(&request.messages);
    let mut contents = Vec::new();

    for message in &request.messages {
        if message.role == UnifiedRole::Tool {
            continue;
        }

        let role = match message.role {
            UnifiedRole::Assistant => "model",
            UnifiedRole::System | UnifiedRole::User | UnifiedRole::Tool => "user",
        };

        let mut parts = build_parts(message);
        let mut signature_attached = attach_signature_to_first_text_part(&mut parts, message);

        let mut emitted_function_calls = Vec::new();
        if message.role == UnifiedRole::Assistant {
            if let Some(tool_calls) = &message.tool_calls {
                for tool_call in tool_calls {
                    let args: Value = serde_json::from_str(&tool_call.function.arguments)
                        .unwrap_or_else(|_| Value::Object(Map::new()));
                    let mut part = Part {
                        function_call: Some(FunctionCall {
                            id: Some(tool_call.id.clone()),
                            name: tool_call.function.name.clone(),
                            args: Some(args),
                        }),
                        ..Default::default()
                    };
                    if !signature_attached {
                        if let Some(signature) =
                            message.thinking.as_ref().and_then(|t| t.signature.as_ref())
                        {
                            part.thought_signature = Some(signature.clone());
                            signature_attached = true;
                        }
                    }
                    parts.push(part);
                    emitted_function_calls.push(tool_call.clone());
                }
            }
        }

        if parts.is_empty() {
            parts.push(Part::text(""));
        }

        contents.push(Content {
            role: Some(role.to_string()),
            parts,
        });

        if role == "model" && !emitted_function_calls.is_empty() {
            let mut response_parts = Vec::new();
            for tool_call in &emitted_function_calls {
                let result = tool_responses
                    .get(&tool_call.id)
                    .cloned()
                    .unwrap_or(Value::Null);
                response_parts.push(Part {
                    function_response: Some(FunctionResponse {
                        name: tool_call.function.name.clone(),
                        response: FunctionResponseBody { result },
                    }),
                    ..Default::default()
                });
            }
            contents.push(Content {
                role: Some("user".to_string()),
                parts: response_parts,
            });
        }
    }

    if let Some(hint) = detect_loop_hint(&request.messages) {
        if let Some(last_user) = contents
            .iter_mut()
            .rev()
            .find(|content| content.role.as_deref() == Some("user"))
        {
            last_user.parts.push(Part::text(hint));
        } else {
            contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(hint)],
            });
        }
    }

    Ok(contents)
}

fn collect_tool_responses(messages: &[UnifiedMessage]) -> HashMap<String, Value> {
    let mut responses = HashMap::new();
    for message in messages {
        if message.role != UnifiedRole::Tool {
            continue;
        }
        if let Some(call_id) = &message.tool_call_id {
            let text = message.text();
            let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
            responses.insert(call_id.clone(), value);
        }
    }
    responses
}

fn build_parts(message: &UnifiedMessage) -> Vec<Part> {
    match &message.content {
        None => Vec::new(),
        Some(UnifiedContent::Text(text)) => vec![Part::text(text.clone())],
        Some(UnifiedContent::Parts(parts)) => parts
            .iter()
            .map(|part| match part {
                UnifiedContentPart::Text { text } => Part::text(text.clone()),
                UnifiedContentPart::ImageUrl {
                    image_url,
                    media_type,
                } => {
                    if image_url.url.starts_with("http") {
                        Part {
                            file_data: Some(FileData {
                                mime_type: media_type.clone(),
                                file_uri: image_url.url.clone(),
                            }),
                            ..Default::default()
                        }
                    } else {
                        let (mime_type, data) = parse_data_url(&image_url.url);
                        Part {
                            inline_data: Some(Blob {
                                mime_type: mime_type
                                    .or_else(|| media_type.clone())
                                    .unwrap_or_default(),
                                data,
                            }),
                            ..Default::default()
                        }
                    }
                }
            })
            .collect(),
    }
}

fn attach_signature_to_first_text_part(parts: &mut [Part], message: &UnifiedMessage) -> bool {
    let Some(signature) = message.thinking.as_ref().and_then(|t| t.signature.as_ref()) else {
        return false;
    };
    for part in parts.iter_mut() {
        if part.text.is_some() && part.thought_signature.is_none() {
            part.thought_signature = Some(signature.clone());
            return true;
        }
    }
    false
}

fn parse_data_url(url: &str) -> (Option<String>, String) {
    match url.rfind(',') {
        Some(comma_index) => {
            let data = url[comma_index + 1..].to_string();
            let header = &url[..comma_index];
            let mime_type = header
                .strip_prefix("data:")
                .and_then(|rest| rest.split(';').next())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            (mime_type, data)
        }
        None => (None, url.to_string()),
    }
}
