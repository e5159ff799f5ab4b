//! Conversation history and the lifecycle of a streamed assistant turn.
//!
//! A [`Conversation`] holds at most one open assistant turn, addressed by the
//! [`TurnId`] returned from [`Conversation::open_assistant`]. While it is open
//! no other turn can be added. Closing it (finish, fail or cancel) is the only
//! way to make the conversation writable again.

use crate::error::ChatError;
use crate::guardrails::{classify, ClassificationResult, GuardrailConfig};
use crate::prompt::{format_prompt, PromptConfig};
use crate::types::TRANSPORT_ERROR_MESSAGE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Set when the exchange tripped the model's guardrails. Filtered turns
    /// never appear in a prompt again.
    #[serde(default)]
    pub filtered: bool,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            filtered: false,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Handle to a turn of a [`Conversation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(usize);

impl TurnId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Ordered chat history.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
    open: Option<usize>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn get(&self, id: TurnId) -> Option<&ConversationTurn> {
        self.turns.get(id.0)
    }

    /// The assistant turn currently being streamed, if any.
    pub fn open_turn(&self) -> Option<TurnId> {
        self.open.map(TurnId)
    }

    pub fn is_streaming(&self) -> bool {
        self.open.is_some()
    }

    /// Append a user message. The text is trimmed and must not be blank.
    pub fn submit_user(&mut self, text: &str) -> Result<TurnId, ChatError> {
        self.ensure_closed()?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        self.turns.push(ConversationTurn::user(text));
        Ok(TurnId(self.turns.len() - 1))
    }

    /// Append an empty assistant turn and mark it open.
    pub fn open_assistant(&mut self) -> Result<TurnId, ChatError> {
        self.ensure_closed()?;

        self.turns.push(ConversationTurn::assistant(""));
        let index = self.turns.len() - 1;
        self.open = Some(index);
        Ok(TurnId(index))
    }

    /// Add a streamed fragment to the open turn.
    pub fn append(&mut self, id: TurnId, fragment: &str) -> Result<(), ChatError> {
        let index = self.check_open(id)?;
        self.turns[index].content.push_str(fragment);
        Ok(())
    }

    /// Close the open turn with a classification result.
    ///
    /// When the result is filtered, the turn and the user turn right before it
    /// are both flagged.
    pub fn finalize(&mut self, id: TurnId, result: &ClassificationResult) -> Result<(), ChatError> {
        let index = self.check_open(id)?;
        self.open = None;

        let turn = &mut self.turns[index];
        turn.content = result.content.clone();
        if !result.filtered {
            return Ok(());
        }

        turn.filtered = true;
        if index > 0 && self.turns[index - 1].role == Role::User {
            self.turns[index - 1].filtered = true;
        }
        tracing::debug!(turn = index, "exchange filtered from future prompts");
        Ok(())
    }

    /// Classify the streamed text of the open turn and close it.
    pub fn finish(
        &mut self,
        id: TurnId,
        guardrails: &GuardrailConfig,
    ) -> Result<ClassificationResult, ChatError> {
        let index = self.check_open(id)?;
        let result = classify(&self.turns[index].content, guardrails);
        self.finalize(id, &result)?;
        Ok(result)
    }

    /// Close the open turn after a transport failure. The turn is not filtered.
    pub fn fail(&mut self, id: TurnId) -> Result<(), ChatError> {
        let index = self.check_open(id)?;
        self.open = None;
        self.turns[index].content = TRANSPORT_ERROR_MESSAGE.to_string();
        Ok(())
    }

    /// Close the open turn after the user stopped the generation.
    ///
    /// A turn that received no text is removed and `None` is returned.
    /// Otherwise the partial text is classified like a finished reply.
    pub fn cancel(
        &mut self,
        id: TurnId,
        guardrails: &GuardrailConfig,
    ) -> Result<Option<ClassificationResult>, ChatError> {
        let index = self.check_open(id)?;
        if self.turns[index].content.is_empty() {
            self.turns.remove(index);
            self.open = None;
            return Ok(None);
        }

        self.finish(id, guardrails).map(Some)
    }

    /// Drop every turn.
    pub fn clear(&mut self) -> Result<(), ChatError> {
        self.ensure_closed()?;
        self.turns.clear();
        Ok(())
    }

    /// Prompt for the next completion, built from the closed turns.
    pub fn prompt(&self, config: &PromptConfig) -> String {
        let closed = match self.open {
            Some(index) => &self.turns[..index],
            None => &self.turns[..],
        };
        format_prompt(closed, config)
    }

    fn ensure_closed(&self) -> Result<(), ChatError> {
        match self.open {
            Some(_) => Err(ChatError::TurnInProgress),
            None => Ok(()),
        }
    }

    fn check_open(&self, id: TurnId) -> Result<usize, ChatError> {
        if id.0 >= self.turns.len() {
            return Err(ChatError::UnknownTurn(id.0));
        }
        if self.open != Some(id.0) {
            return Err(ChatError::TurnClosed(id.0));
        }
        Ok(id.0)
    }
}
