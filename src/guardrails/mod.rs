//! Guardrail detection for completed model replies.
//!
//! The on-device model does not report when its safety guardrails kick in.
//! A blocked reply arrives empty and a refused one opens with an apology.
//! This module recognises both so the exchange can be kept out of later
//! prompts.
//!
//! # Example
//!
//! ```rust
//! use ondevice_chat::guardrails::{classify, GuardrailConfig};
//!
//! let result = classify("I'm sorry, I cannot help with that.", &GuardrailConfig::default());
//! assert!(result.filtered);
//!
//! let result = classify("Paris is the capital of France.", &GuardrailConfig::default());
//! assert!(!result.filtered);
//! ```

mod classifier;
mod types;

pub use classifier::{classify, is_empty_response, is_guardrail_refusal};
pub use types::{ClassificationResult, GuardrailConfig, BLOCKED_RESPONSE, DEFAULT_REFUSAL_PREFIXES};
