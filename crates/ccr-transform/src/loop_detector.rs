//! Detects repeated tool failures in the recent conversation and returns a
//! corrective hint to inject into the upstream request (spec §4.3).

use ccr_protocol::{UnifiedMessage, UnifiedRole};

/// How many trailing messages (of any role) are scanned.
pub const WINDOW: usize = 20;
/// Threshold for the edit-same-content failure (checked first).
pub const EDIT_LOOP_THRESHOLD: usize = 2;
/// Threshold for the generic tool-error failure.
pub const GENERIC_ERROR_THRESHOLD: usize = 3;

const EDIT_LOOP_HINT: &str = "IMPORTANT: Your last Edit/Update attempts failed because old_string and new_string were identical. The Edit tool requires new_string to be different from old_string — identical strings always fail. Read the file first to confirm its current contents, then either write an old_string that exactly matches what is there paired with a genuinely different new_string, or use the Write tool to replace the whole file instead of retrying Edit with the same arguments.";

const GENERIC_ERROR_HINT: &str = "IMPORTANT: You appear to be encountering repeated tool errors. Stop retrying the same operation with the same arguments. Re-read the error message, confirm the file or path actually exists and that you have permission to use it, and try a different, non-destructive approach. If nothing works, tell the user what you attempted and why you cannot proceed instead of continuing to retry.";

const GENERIC_ERROR_MARKERS: &[&str] = &[
    "Error:",
    "Error ",
    "error:",
    "ENOENT",
    "EACCES",
    "EPERM",
    "failed",
    "FAILED",
    "not found",
    "Permission denied",
    "Operation not permitted",
];

/// Returns a hint string if the trailing window of messages shows a loop,
/// or `None` if the builder should not inject anything. Edit-same-content
/// is checked before the generic-error heuristic.
pub fn detect_loop_hint(messages: &[UnifiedMessage]) -> Option<&'static str> {
    let start = messages.len().saturating_sub(WINDOW);
    let tool_texts: Vec<String> = messages[start..]
        .iter()
        .filter(|message| message.role == UnifiedRole::Tool)
        .map(UnifiedMessage::text)
        .collect();

    let edit_loop_count = tool_texts
        .iter()
        .filter(|text| {
            text.contains("old_string and new_string are exactly the same")
                || text.contains("No changes to make")
        })
        .count();
    if edit_loop_count >= EDIT_LOOP_THRESHOLD {
        return Some(EDIT_LOOP_HINT);
    }

    let generic_error_count = tool_texts
        .iter()
        .filter(|text| GENERIC_ERROR_MARKERS.iter().any(|marker| text.contains(marker)))
        .count();
    if generic_error_count >= GENERIC_ERROR_THRESHOLD {
        return Some(GENERIC_ERROR_HINT);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccr_protocol::{UnifiedContent, UnifiedMessage, UnifiedRole};

    fn tool_message(text: &str) -> UnifiedMessage {
        UnifiedMessage {
            role: UnifiedRole::Tool,
            content: Some(UnifiedContent::Text(text.to_string())),
            tool_calls: None,
            tool_call_id: Some("call_1".to_string()),
            thinking: None,
        }
    }

    fn user_message(text: &str) -> UnifiedMessage {
        UnifiedMessage {
            role: UnifiedRole::User,
            content: Some(UnifiedContent::Text(text.to_string())),
            tool_calls: None,
            tool_call_id: None,
            thinking: None,
        }
    }

    #[test]
    fn no_hint_when_no_failures() {
        let messages = vec![user_message("hi"), tool_message("ok, file written")];
        assert_eq!(detect_loop_hint(&messages), None);
    }

    #[test]
    fn edit_loop_hint_fires_at_threshold() {
        let messages = vec![
            tool_message("old_string and new_string are exactly the same"),
            tool_message("No changes to make: old_string and new_string are exactly the same"),
        ];
        assert_eq!(detect_loop_hint(&messages), Some(EDIT_LOOP_HINT));
    }

    #[test]
    fn edit_loop_hint_does_not_fire_below_threshold() {
        let messages = vec![tool_message("old_string and new_string are exactly the same")];
        assert_eq!(detect_loop_hint(&messages), None);
    }

    #[test]
    fn generic_error_hint_fires_at_threshold() {
        let messages = vec![
            tool_message("Error: ENOENT no such file"),
            tool_message("command failed"),
            tool_message("Permission denied"),
        ];
        assert_eq!(detect_loop_hint(&messages), Some(GENERIC_ERROR_HINT));
    }

    #[test]
    fn edit_loop_is_checked_before_generic_error() {
        let messages = vec![
            tool_message("old_string and new_string are exactly the same"),
            tool_message("No changes to make"),
            tool_message("Error: failed"),
            tool_message("failed again"),
            tool_message("not found"),
        ];
        assert_eq!(detect_loop_hint(&messages), Some(EDIT_LOOP_HINT));
    }

    #[test]
    fn only_last_window_messages_are_scanned() {
        let mut messages = vec![tool_message("Error: failed"); 2];
        for _ in 0..WINDOW {
            messages.push(user_message("padding"));
        }
        messages.push(tool_message("Error: failed"));
        assert_eq!(detect_loop_hint(&messages), None);
    }
}
