//! Type definitions for guardrail classification.

use serde::{Deserialize, Serialize};

/// Reply shown when the model returned nothing at all.
pub const BLOCKED_RESPONSE: &str = "I'm sorry, I can't assist with that.";

/// Openings the on-device model uses when its guardrails refuse a request.
pub const DEFAULT_REFUSAL_PREFIXES: &[&str] = &[
    "Sorry, I",
    "Sorry, but",
    "I'm sorry, I",
    "I'm sorry, but",
    "I apologize, but",
    "I can't help with",
    "I'm not able to",
];

/// Guardrail detection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailConfig {
    pub refusal_prefixes: Vec<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            refusal_prefixes: DEFAULT_REFUSAL_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
        }
    }
}

impl GuardrailConfig {
    /// Create a configuration with a custom prefix list.
    pub fn new<I, S>(refusal_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            refusal_prefixes: refusal_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a prefix to the end of the list.
    pub fn refusal_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.refusal_prefixes.push(prefix.into());
        self
    }
}

/// Outcome of classifying a completed reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub content: String,
    pub filtered: bool,
}
