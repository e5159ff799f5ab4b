use thiserror::Error;

/// Errors that can occur while talking to the model server or driving a
/// conversation turn.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Server error: HTTP {status_code} - {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Stream interrupted: {0}")]
    StreamError(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("A response is already streaming")]
    TurnInProgress,

    #[error("Message is empty")]
    EmptyInput,

    #[error("Nothing to send: every turn is filtered")]
    EmptyPrompt,

    #[error("Unknown turn: {0}")]
    UnknownTurn(usize),

    #[error("Turn {0} is not open")]
    TurnClosed(usize),

    #[error("Settings error: {0}")]
    SettingsError(String),
}

impl ChatError {
    /// True when the user stopped the generation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Cancelled)
    }

    /// True for failures of the connection to the model server.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::HttpError(_) | ChatError::ApiError { .. } | ChatError::StreamError(_)
        )
    }
}
