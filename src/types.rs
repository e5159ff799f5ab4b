use crate::guardrails::GuardrailConfig;
use crate::prompt::PromptConfig;
use serde::{Deserialize, Serialize};

/// Identifier the local server reports for the on-device model.
pub const MODEL_ID: &str = "apple-on-device";

/// Address the local model server listens on by default.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:17832";

/// Command that starts the local model server.
pub const SETUP_COMMAND: &str = "npx apple-local-llm@latest --serve --port=17832";

/// Text shown in place of a reply when the server could not be reached.
pub const TRANSPORT_ERROR_MESSAGE: &str = "Error: Failed to get response. Is the server running?";

/// Configuration for the chat client.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub base_url: String,
    pub health_timeout_ms: u64,
    pub connect_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub prompt: PromptConfig,
    pub guardrails: GuardrailConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            health_timeout_ms: 3000,
            connect_timeout_secs: 10,
            poll_interval_ms: 2000,
            prompt: PromptConfig::default(),
            guardrails: GuardrailConfig::default(),
        }
    }
}

impl ChatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn health_timeout_ms(mut self, timeout: u64) -> Self {
        self.health_timeout_ms = timeout;
        self
    }

    pub fn connect_timeout_secs(mut self, timeout: u64) -> Self {
        self.connect_timeout_secs = timeout;
        self
    }

    pub fn poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval;
        self
    }

    pub fn prompt(mut self, prompt: PromptConfig) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn guardrails(mut self, guardrails: GuardrailConfig) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Body of a generation request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub input: String,
    pub stream: bool,
}

impl GenerateRequest {
    pub fn streaming(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            stream: true,
        }
    }
}

/// Response of the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub available: bool,
}

/// One `data:` payload of the generation stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamChunk {
    /// Text carried by the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }
}
