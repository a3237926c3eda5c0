//! Unary (non-streaming) Gemini response translation (spec §4.5).

use std::time::{SystemTime, UNIX_EPOCH};

use ccr_protocol::gemini::{Content, GenerateContentResponse, Part};
use ccr_protocol::openai::{
    ChatCompletionChoice, ChatCompletionMessage, ChatCompletionResponse, OpenAIToolCall,
    OpenAIToolCallFunction, ThinkingBlock, Usage,
};

/// Translates one complete Gemini response into the caller-facing shape.
pub fn translate_unary_response(
    response: &GenerateContentResponse,
    model: &str,
    id: String,
    created: i64,
) -> ChatCompletionResponse {
    let candidate = response.candidates.first();
    let content = candidate.and_then(|c| c.content.as_ref());
    let parts: &[Part] = content.map(|c| c.parts.as_slice()).unwrap_or(&[]);

    let mut thinking_content = String::new();
    let mut thinking_signature: Option<String> = None;
    let mut non_thinking: Vec<&Part> = Vec::new();

    for part in parts {
        if part.thought == Some(true) {
            if let Some(text) = &part.text {
                thinking_content.push_str(text);
            }
        } else {
            non_thinking.push(part);
        }
        if thinking_signature.is_none() {
            if let Some(signature) = &part.thought_signature {
                thinking_signature = Some(signature.clone());
            }
        }
    }

    let tool_calls: Vec<OpenAIToolCall> = non_thinking
        .iter()
        .filter_map(|part| part.function_call.as_ref())
        .map(|fc| OpenAIToolCall {
            id: fc.id.clone().unwrap_or_else(synthesize_tool_call_id),
            kind: "function".to_string(),
            function: OpenAIToolCallFunction {
                name: fc.name.clone(),
                arguments: serde_json::to_string(&fc.args.clone().unwrap_or(serde_json::json!({})))
                    .unwrap_or_else(|_| "{}".to_string()),
            },
        })
        .collect();

    let text = non_thinking
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");

    let raw_finish_reason = candidate
        .and_then(|c| c.finish_reason.as_deref())
        .unwrap_or("stop")
        .to_lowercase();
    let finish_reason = if !tool_calls.is_empty() && raw_finish_reason == "stop" {
        "tool_calls".to_string()
    } else {
        raw_finish_reason
    };

    let thinking = if !thinking_content.is_empty() && thinking_signature.is_some() {
        Some(ThinkingBlock {
            content: Some(thinking_content),
            signature: thinking_signature,
        })
    } else {
        None
    };

    let message = ChatCompletionMessage {
        role: "assistant",
        content: if text.is_empty() { None } else { Some(text) },
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        thinking,
    };

    ChatCompletionResponse {
        id,
        object: "chat.completion",
        created,
        model: model.to_string(),
        choices: vec![ChatCompletionChoice {
            index: 0,
            message,
            finish_reason,
        }],
        usage: response.usage_metadata.as_ref().map(|usage| Usage {
            prompt_tokens: usage.prompt_token_count.unwrap_or(0),
            completion_tokens: usage.candidates_token_count.unwrap_or(0),
            total_tokens: usage.total_token_count.unwrap_or(0),
            cached_content_tokens: usage.cached_content_token_count,
            reasoning_tokens: usage.thoughts_token_count,
        }),
    }
}

fn synthesize_tool_call_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("tool_{nanos}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccr_protocol::gemini::{Candidate, FunctionCall, UsageMetadata};

    fn candidate_with_parts(parts: Vec<Part>, finish_reason: &str) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts,
                }),
                finish_reason: Some(finish_reason.to_string()),
                grounding_metadata: None,
            }],
            usage_metadata: None,
            model_version: None,
        }
    }

    #[test]
    fn stop_with_tool_calls_becomes_tool_calls_finish_reason() {
        let response = candidate_with_parts(
            vec![Part {
                function_call: Some(FunctionCall {
                    id: Some("call_1".to_string()),
                    name: "read_file".to_string(),
                    args: Some(serde_json::json!({"path": "a.rs"})),
                }),
                ..Default::default()
            }],
            "STOP",
        );
        let translated =
            translate_unary_response(&response, "gemini-2.5-pro", "id1".to_string(), 0);
        assert_eq!(translated.choices[0].finish_reason, "tool_calls");
        let tool_calls = translated.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls[0].function.name, "read_file");
        assert_eq!(tool_calls[0].function.arguments, "{\"path\":\"a.rs\"}");
    }

    #[test]
    fn missing_function_call_id_is_synthesized() {
        let response = candidate_with_parts(
            vec![Part {
                function_call: Some(FunctionCall {
                    id: None,
                    name: "noop".to_string(),
                    args: None,
                }),
                ..Default::default()
            }],
            "STOP",
        );
        let translated =
            translate_unary_response(&response, "gemini-2.5-pro", "id1".to_string(), 0);
        let tool_calls = translated.choices[0].message.tool_calls.as_ref().unwrap();
        assert!(tool_calls[0].id.starts_with("tool_"));
    }

    #[test]
    fn thinking_parts_are_excluded_from_text_and_concatenated_separately() {
        let response = candidate_with_parts(
            vec![
                Part {
                    text: Some("pondering".to_string()),
                    thought: Some(true),
                    thought_signature: Some("sig1".to_string()),
                    ..Default::default()
                },
                Part {
                    text: Some("the answer".to_string()),
                    ..Default::default()
                },
            ],
            "STOP",
        );
        let translated =
            translate_unary_response(&response, "gemini-2.5-pro", "id1".to_string(), 0);
        assert_eq!(translated.choices[0].message.content.as_deref(), Some("the answer"));
        let thinking = translated.choices[0].message.thinking.as_ref().unwrap();
        assert_eq!(thinking.content.as_deref(), Some("pondering"));
        assert_eq!(thinking.signature.as_deref(), Some("sig1"));
    }

    #[test]
    fn thinking_is_omitted_when_signature_absent() {
        let response = candidate_with_parts(
            vec![Part {
                text: Some("pondering".to_string()),
                thought: Some(true),
                ..Default::default()
            }],
            "STOP",
        );
        let translated =
            translate_unary_response(&response, "gemini-2.5-pro", "id1".to_string(), 0);
        assert!(translated.choices[0].message.thinking.is_none());
    }

    #[test]
    fn multiple_text_parts_join_with_newline() {
        let response = candidate_with_parts(
            vec![
                Part {
                    text: Some("line one".to_string()),
                    ..Default::default()
                },
                Part {
                    text: Some("line two".to_string()),
                    ..Default::default()
                },
            ],
            "STOP",
        );
        let translated =
            translate_unary_response(&response, "gemini-2.5-pro", "id1".to_string(), 0);
        assert_eq!(
            translated.choices[0].message.content.as_deref(),
            Some("line one\nline two")
        );
    }

    #[test]
    fn usage_metadata_maps_to_openai_usage_shape() {
        let mut response = candidate_with_parts(vec![Part::text("hi")], "STOP");
        response.usage_metadata = Some(UsageMetadata {
            prompt_token_count: Some(10),
            candidates_token_count: Some(5),
            total_token_count: Some(15),
            cached_content_token_count: Some(2),
            thoughts_token_count: Some(3),
        });
        let translated =
            translate_unary_response(&response, "gemini-2.5-pro", "id1".to_string(), 0);
        let usage = translated.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 5);
        assert_eq!(usage.total_tokens, 15);
        assert_eq!(usage.cached_content_tokens, Some(2));
        assert_eq!(usage.reasoning_tokens, Some(3));
    }
}
