//! Serialization of a conversation into the single text prompt the model
//! server expects.

use crate::conversation::{ConversationTurn, Role};

/// Instruction block placed at the top of every prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert assistant focused on precise, factual, and concise responses. When responding to questions, prioritize accuracy and do not make up facts. If asked for summaries, give them in no more than three sentences. Follow instructions exactly as stated.";

/// Prompt construction settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    pub system_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }
}

/// Build the prompt for the next completion.
///
/// Filtered turns are skipped. Returns an empty string when no turn is left,
/// which callers must treat as "nothing to send".
pub fn format_prompt(turns: &[ConversationTurn], config: &PromptConfig) -> String {
    let mut visible = turns.iter().filter(|turn| !turn.filtered).peekable();
    if visible.peek().is_none() {
        return String::new();
    }

    let mut parts: Vec<String> = vec![config.system_prompt.clone(), String::new()];
    for turn in visible {
        let speaker = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        parts.push(format!("{}: {}", speaker, turn.content));
    }
    parts.push("Assistant:".to_string());

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: Role, content: &str, filtered: bool) -> ConversationTurn {
        let mut turn = ConversationTurn::new(role, content);
        turn.filtered = filtered;
        turn
    }

    #[test]
    fn test_empty_conversation() {
        assert_eq!(format_prompt(&[], &PromptConfig::default()), "");
    }

    #[test]
    fn test_single_user_turn() {
        let turns = vec![turn(Role::User, "2+2?", false)];
        let prompt = format_prompt(&turns, &PromptConfig::default());

        assert_eq!(
            prompt,
            format!("{}\n\nUser: 2+2?\nAssistant:", DEFAULT_SYSTEM_PROMPT)
        );
    }

    #[test]
    fn test_all_turns_filtered() {
        let turns = vec![
            turn(Role::User, "bad question", true),
            turn(Role::Assistant, "I'm sorry, I can't.", true),
        ];
        assert_eq!(format_prompt(&turns, &PromptConfig::default()), "");
    }

    #[test]
    fn test_filtered_pair_is_dropped() {
        let turns = vec![
            turn(Role::User, "bad question", true),
            turn(Role::Assistant, "I'm sorry, I can't.", true),
            turn(Role::User, "What is Rust?", false),
            turn(Role::Assistant, "A programming language.", false),
        ];
        let prompt = format_prompt(&turns, &PromptConfig::new("SYS"));

        assert_eq!(
            prompt,
            "SYS\n\nUser: What is Rust?\nAssistant: A programming language.\nAssistant:"
        );
        assert!(!prompt.contains("bad question"));
        assert!(!prompt.contains("I'm sorry"));
    }

    #[test]
    fn test_order_is_preserved() {
        let turns = vec![
            turn(Role::User, "first", false),
            turn(Role::Assistant, "second", false),
            turn(Role::User, "third", false),
        ];
        let prompt = format_prompt(&turns, &PromptConfig::new("SYS"));
        let lines: Vec<&str> = prompt.lines().collect();

        assert_eq!(
            lines,
            vec![
                "SYS",
                "",
                "User: first",
                "Assistant: second",
                "User: third",
                "Assistant:"
            ]
        );
    }

    #[test]
    fn test_custom_system_prompt() {
        let turns = vec![turn(Role::User, "hi", false)];
        let prompt = format_prompt(&turns, &PromptConfig::new("Answer in French."));
        assert!(prompt.starts_with("Answer in French.\n\n"));
        assert!(!prompt.contains(DEFAULT_SYSTEM_PROMPT));
    }
}
