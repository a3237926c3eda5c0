//! Streaming Gemini response translation: the thinking/signature/text/
//! tool-call ordering state machine (spec §4.5, §5).

use std::time::{SystemTime, UNIX_EPOCH};

use ccr_protocol::gemini::{Candidate, GenerateContentResponse, GroundingMetadata, UsageMetadata};
use ccr_protocol::openai::{
    Annotation, ChatCompletionChunk, ChatCompletionChunkChoice, ChatCompletionDelta,
    ThinkingBlock, ToolCallDelta, ToolCallDeltaFunction, Usage, UrlCitation,
};

/// Per-stream state carried across all SSE chunks of one request.
pub struct GeminiStreamTranslator {
    id: String,
    model: String,
    created: i64,
    is_gemini3: bool,
    signature_sent: bool,
    content_sent: bool,
    has_thinking_content: bool,
    pending_content: String,
    content_index: i64,
    tool_call_index: i64,
    latest_usage: Option<UsageMetadata>,
}

impl GeminiStreamTranslator {
    pub fn new(id: String, model: String, created: i64) -> Self {
        let is_gemini3 = model.to_lowercase().contains("gemini-3");
        GeminiStreamTranslator {
            id,
            model,
            created,
            is_gemini3,
            signature_sent: false,
            content_sent: false,
            has_thinking_content: false,
            pending_content: String::new(),
            content_index: 0,
            tool_call_index: -1,
            latest_usage: None,
        }
    }

    /// Processes one decoded Gemini response chunk, returning zero or more
    /// caller-facing chunks in emission order.
    pub fn process_chunk(&mut self, response: &GenerateContentResponse) -> Vec<ChatCompletionChunk> {
        if let Some(usage) = &response.usage_metadata {
            self.latest_usage = Some(usage.clone());
        }

        let candidate = response.candidates.first();
        let parts: &[ccr_protocol::gemini::Part] = candidate
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[]);

        let mut chunks = Vec::new();

        // Step 1: thinking parts.
        for part in parts {
            if part.thought == Some(true) {
                if let Some(text) = &part.text {
                    self.has_thinking_content = true;
                    chunks.push(self.make_chunk(
                        ChatCompletionDelta {
                            role: Some("assistant"),
                            thinking: Some(ThinkingBlock {
                                content: Some(text.clone()),
                                signature: None,
                            }),
                            ..Default::default()
                        },
                        None,
                    ));
                }
            }
        }

        // Step 2: upstream-issued signature.
        let upstream_signature = parts.iter().find_map(|part| part.thought_signature.clone());
        if let Some(signature) = upstream_signature {
            if !self.signature_sent {
                chunks.push(self.make_chunk(
                    ChatCompletionDelta {
                        role: Some("assistant"),
                        thinking: Some(ThinkingBlock {
                            content: None,
                            signature: Some(signature),
                        }),
                        ..Default::default()
                    },
                    None,
                ));
                self.signature_sent = true;
                self.content_index += 1;

                if !self.pending_content.is_empty() {
                    let flushed = std::mem::take(&mut self.pending_content);
                    chunks.push(self.make_chunk(
                        ChatCompletionDelta {
                            role: Some("assistant"),
                            content: Some(flushed),
                            ..Default::default()
                        },
                        None,
                    ));
                    self.content_sent = true;
                }
            }
        }

        // Step 3: this chunk's tool calls and non-thinking text.
        let tool_calls: Vec<&ccr_protocol::gemini::FunctionCall> = parts
            .iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| part.function_call.as_ref())
            .collect();
        let text: String = parts
            .iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| part.text.as_deref())
            .collect();

        // Step 4: thinking content present, text present, no signature yet.
        if self.has_thinking_content && !text.is_empty() && !self.signature_sent {
            if self.is_gemini3 {
                self.pending_content.push_str(&text);
                return chunks;
            }
            let signature = format!("ccr_{}", unix_millis());
            chunks.push(self.make_chunk(
                ChatCompletionDelta {
                    role: Some("assistant"),
                    thinking: Some(ThinkingBlock {
                        content: None,
                        signature: Some(signature),
                    }),
                    ..Default::default()
                },
                None,
            ));
            self.signature_sent = true;
        }

        // Step 5: text delta.
        if !text.is_empty() {
            if self.pending_content.is_empty() {
                self.content_index += 1;
            }
            let finish_reason = self.finish_reason(candidate, !tool_calls.is_empty());
            let annotations = grounding_annotations(candidate);
            chunks.push(self.make_chunk(
                ChatCompletionDelta {
                    role: Some("assistant"),
                    content: Some(text),
                    annotations,
                    ..Default::default()
                },
                finish_reason,
            ));
            self.content_sent = true;
        }

        // Step 6: tool-call deltas.
        for function_call in tool_calls {
            self.content_index += 1;
            self.tool_call_index += 1;
            let arguments = serde_json::to_string(&function_call.args.clone().unwrap_or(serde_json::json!({})))
                .unwrap_or_else(|_| "{}".to_string());
            chunks.push(self.make_chunk(
                ChatCompletionDelta {
                    role: Some("assistant"),
                    tool_calls: Some(vec![ToolCallDelta {
                        index: self.tool_call_index as u32,
                        id: function_call.id.clone(),
                        kind: Some("function"),
                        function: Some(ToolCallDeltaFunction {
                            name: Some(function_call.name.clone()),
                            arguments: Some(arguments),
                        }),
                    }]),
                    ..Default::default()
                },
                Some("tool_calls".to_string()),
            ));
        }

        chunks
    }

    fn finish_reason(&self, candidate: Option<&Candidate>, has_tool_calls: bool) -> Option<String> {
        let raw = candidate?.finish_reason.as_ref()?.to_lowercase();
        if has_tool_calls && raw == "stop" {
            Some("tool_calls".to_string())
        } else {
            Some(raw)
        }
    }

    fn make_chunk(&self, delta: ChatCompletionDelta, finish_reason: Option<String>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk",
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatCompletionChunkChoice {
                index: self.content_index.max(0) as u32,
                delta,
                finish_reason,
            }],
            usage: self.latest_usage.as_ref().map(|usage| Usage {
                prompt_tokens: usage.prompt_token_count.unwrap_or(0),
                completion_tokens: usage.candidates_token_count.unwrap_or(0),
                total_tokens: usage.total_token_count.unwrap_or(0),
                cached_content_tokens: usage.cached_content_token_count,
                reasoning_tokens: usage.thoughts_token_count,
            }),
        }
    }
}

fn grounding_annotations(candidate: Option<&Candidate>) -> Option<Vec<Annotation>> {
    let grounding: &GroundingMetadata = candidate?.grounding_metadata.as_ref()?;
    if grounding.grounding_chunks.is_empty() {
        return None;
    }

    let annotations: Vec<Annotation> = grounding
        .grounding_chunks
        .iter()
        .enumerate()
        .filter_map(|(index, chunk)| {
            let web = chunk.web.as_ref()?;
            let url = web.uri.clone()?;
            let support = grounding
                .grounding_supports
                .iter()
                .find(|support| support.grounding_chunk_indices.contains(&(index as u32)));
            let (start_index, end_index) = support
                .and_then(|s| s.segment.as_ref())
                .map(|segment| (segment.start_index, segment.end_index))
                .unwrap_or((0, 0));
            Some(Annotation {
                kind: "url_citation",
                url_citation: UrlCitation {
                    url,
                    title: web.title.clone(),
                    start_index,
                    end_index,
                },
            })
        })
        .collect();

    if annotations.is_empty() {
        None
    } else {
        Some(annotations)
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
