//! SSE framing pass-through for the OpenAI-compatible streaming adapter
//! (spec §4.6, §9 "Stream controller already-closed idempotency").

use serde_json::Value;

/// Re-frames upstream `data: ...` lines, tolerating partial reads and
/// surviving a double-close from both the normal end-of-stream path and an
/// upstream error path.
#[derive(Debug, Default)]
pub struct SsePassthrough {
    buffer: String,
    closed: bool,
}

impl SsePassthrough {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds newly-read bytes in, returning zero or more complete
    /// `data: ...\n\n` frames ready to forward to the caller. A malformed
    /// JSON chunk is logged and skipped rather than propagated.
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
            match serde_json::from_str::<Value>(data) {
                Ok(value) => frames.push(format!("data: {value}\n\n")),
                Err(error) => {
                    tracing::error!(error = %error, "skipping malformed SSE chunk from upstream");
                }
            }
        }

        frames
    }

    /// Closes the stream exactly once, returning the `[DONE]` frame on the
    /// first call and `None` on every call after (normal end-of-stream and
    /// an upstream error path may both try to close).
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
