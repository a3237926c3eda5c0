//! Provider/model selection (spec §4.2): subagent inline marker, then
//! command override, then long-context threshold, then the configured
//! default.

use ccr_protocol::{UnifiedChatRequest, UnifiedContent, UnifiedRole};

use crate::config::{RouteTarget, RouterRules};

const SUBAGENT_MARKER_OPEN: &str = "<CCR-SUBAGENT-MODEL>";
const SUBAGENT_MARKER_CLOSE: &str = "</CCR-SUBAGENT-MODEL>";

pub fn resolve_route(
    rules: &RouterRules,
    request: &mut UnifiedChatRequest,
    command: Option<&str>,
) -> RouteTarget {
    if let Some(target) = extract_subagent_marker(request) {
        return target;
    }

    if let Some(command) = command {
        if let Some(target) = rules.command_overrides.get(command) {
            return target.clone();
        }
    }

    if let (Some(threshold), Some(provider), Some(model)) = (
        rules.long_context_threshold,
        rules.long_context_provider.as_ref(),
        rules.long_context_model.as_ref(),
    ) {
        if estimate_token_count(request) > threshold {
            return RouteTarget {
                provider: provider.clone(),
                model: model.clone(),
            };
        }
    }

    RouteTarget {
        provider: rules.default_provider.clone(),
        model: rules.default_model.clone(),
    }
}

/// Looks for a `<CCR-SUBAGENT-MODEL>provider,model</CCR-SUBAGENT-MODEL>`
/// marker at the start of the first user message, stripping it from the
/// message content in place if found (spec §4.2).
fn extract_subagent_marker(request: &mut UnifiedChatRequest) -> Option<RouteTarget> {
    let message = request
        .messages
        .iter_mut()
        .find(|message| message.role == UnifiedRole::User)?;

    let text = match &message.content {
        Some(UnifiedContent::Text(text)) => text.clone(),
        _ => return None,
    };

    let rest = text.strip_prefix(SUBAGENT_MARKER_OPEN)?;
    let (marker_body, remainder) = rest.split_once(SUBAGENT_MARKER_CLOSE)?;
    let (provider, model) = marker_body.split_once(',')?;
    let (provider, model) = (provider.trim(), model.trim());
    if provider.is_empty() || model.is_empty() {
        return None;
    }

    message.content = Some(UnifiedContent::Text(remainder.trim_start().to_string()));
    Some(RouteTarget {
        provider: provider.to_string(),
        model: model.to_string(),
    })
}

/// A cheap, provider-agnostic token estimate: roughly four characters per
/// token, summed across every message's text.
fn estimate_token_count(request: &UnifiedChatRequest) -> u32 {
    let total_chars: usize = request.messages.iter().map(|m| m.text().chars().count()).sum();
    (total_chars / 4) as u32
}
