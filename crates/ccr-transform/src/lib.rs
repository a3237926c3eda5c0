//! Translation between the Unified chat schema and each upstream's wire
//! format (spec §4.2-§4.6).

pub mod gemini;
pub mod loop_detector;
pub mod openai_compat;
pub mod schema;

use ccr_protocol::UnifiedMessage;

const SUGGESTION_MODE_MARKER: &str = "[SUGGESTION MODE:";

/// Whether any message in the request carries the suggestion-mode marker
/// (spec §4.5 "Suggestion-mode delay", §9 glossary).
pub fn is_suggestion_mode(messages: &[UnifiedMessage]) -> bool {
    messages.iter().any(|message| message.text().contains(SUGGESTION_MODE_MARKER))
}
