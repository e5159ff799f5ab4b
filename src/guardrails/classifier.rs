//! Detection of replies that the model's guardrails refused or blocked.

use crate::guardrails::types::{ClassificationResult, GuardrailConfig, BLOCKED_RESPONSE};

/// Check if a reply opens with one of the configured refusal prefixes.
pub fn is_guardrail_refusal(content: &str, config: &GuardrailConfig) -> bool {
    let trimmed = content.trim();
    config
        .refusal_prefixes
        .iter()
        .any(|prefix| trimmed.starts_with(prefix.as_str()))
}

/// Check if a reply is empty, which happens when it was blocked entirely.
pub fn is_empty_response(content: &str) -> bool {
    content.trim().is_empty()
}

/// Classify a completed reply.
///
/// Empty replies are replaced by [`BLOCKED_RESPONSE`]; refusals keep their
/// text. Both come back with `filtered` set so that the exchange is left out
/// of later prompts.
pub fn classify(content: &str, config: &GuardrailConfig) -> ClassificationResult {
    if is_empty_response(content) {
        tracing::debug!("empty reply, treating as blocked");
        return ClassificationResult {
            content: BLOCKED_RESPONSE.to_string(),
            filtered: true,
        };
    }

    let filtered = is_guardrail_refusal(content, config);
    if filtered {
        tracing::debug!("reply matched a refusal prefix");
    }

    ClassificationResult {
        content: content.to_string(),
        filtered,
    }
}
