//! Byte-level SSE decoding for a Gemini `streamGenerateContent` response:
//! buffers partial reads, splits on `\n`, parses each `data: …` line, and
//! feeds the decoded chunk through `GeminiStreamTranslator` (spec §4.5).

use ccr_protocol::gemini::GenerateContentResponse;
use ccr_protocol::openai::ChatCompletionChunk;

use super::stream::GeminiStreamTranslator;

pub struct GeminiSseDecoder {
    buffer: String,
    translator: GeminiStreamTranslator,
    closed: bool,
}

impl GeminiSseDecoder {
    pub fn new(id: String, model: String, created: i64) -> Self {
        Self {
            buffer: String::new(),
            translator: GeminiStreamTranslator::new(id, model, created),
            closed: false,
        }
    }

    /// Feeds newly-read bytes in, returning zero or more ready-to-forward
    /// `data: …\n\n` frames. A malformed JSON line is logged and skipped
    /// (spec §7 TranslatorProtocolError) rather than propagated.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<String> {
        if self.closed {
            return Vec::new();
        }

        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut frames = Vec::new();

        while let Some(newline_index) = self.buffer.find('\n') {
            let line = self.buffer[..newline_index].trim_end_matches('\r').to_string();
            self.buffer.drain(..=newline_index);

            let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                frames.push("data: [DONE]\n\n".to_string());
                self.closed = true;
                break;
            }

            match serde_json::from_str::<GenerateContentResponse>(data) {
                Ok(response) => {
                    for chunk in self.translator.process_chunk(&response) {
                        frames.push(serialize_chunk(&chunk));
                    }
                }
                Err(error) => {
                    tracing::error!(error = %error, "skipping malformed Gemini stream chunk");
                }
            }
        }

        frames
    }

    /// Closes the stream exactly once. Used both for a clean upstream
    /// `[DONE]`-less end-of-stream and for a premature-close error path
    /// (spec §4.5 "Stream interruption policy").
    pub fn close(&mut self) -> Option<String> {
        if self.closed {
            return None;
        }
        self.closed = true;
        Some("data: [DONE]\n\n".to_string())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

fn serialize_chunk(chunk: &ChatCompletionChunk) -> String {
    match serde_json::to_string(chunk) {
        Ok(json) => format!("data: {json}\n\n"),
        Err(error) => {
            tracing::error!(error = %error, "failed to serialize translated chunk");
            String::new()
        }
    }
}
