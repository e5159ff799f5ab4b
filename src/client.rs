use crate::conversation::Conversation;
use crate::error::ChatError;
use crate::guardrails::ClassificationResult;
use crate::stream::ContentStream;
use crate::types::{ChatConfig, GenerateRequest, HealthResponse};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const HEALTH_PATH: &str = "/health";
const GENERATE_PATH: &str = "/generate";

/// Fragments of a generation streamed from the server.
pub type ResponseStream = ContentStream<BoxStream<'static, Result<Bytes, reqwest::Error>>>;

/// How a chat turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The reply streamed to the end and was classified.
    Completed(ClassificationResult),
    /// The user stopped the generation. `removed` is true when no text had
    /// arrived and the empty reply was dropped from the conversation.
    Cancelled { removed: bool },
    /// The server could not be reached or the stream broke off.
    Failed(ChatError),
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed(_))
    }

    /// Whether the guardrails were found to have refused or blocked the reply.
    pub fn is_filtered(&self) -> bool {
        matches!(self, TurnOutcome::Completed(result) if result.filtered)
    }
}

/// Client for the local model server.
#[derive(Debug, Clone)]
pub struct ChatClient {
    config: ChatConfig,
    http_client: Client,
}

impl ChatClient {
    /// Create a client for the default local server address.
    pub fn new() -> Result<Self, ChatError> {
        Self::with_config(ChatConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(config: ChatConfig) -> Result<Self, ChatError> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Query the health endpoint. Any failure is reported as `None`.
    pub async fn check_health(&self) -> Option<HealthResponse> {
        let url = self.config.endpoint(HEALTH_PATH);

        let response = self
            .http_client
            .get(&url)
            .timeout(Duration::from_millis(self.config.health_timeout_ms))
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!(status = %response.status(), "health check rejected");
                return None;
            }
            Err(e) => {
                tracing::debug!(error = %e, "health check failed");
                return None;
            }
        };

        match response.json::<HealthResponse>().await {
            Ok(health) => Some(health),
            Err(e) => {
                tracing::debug!(error = %e, "unreadable health response");
                None
            }
        }
    }

    /// Whether the server is up and reports the model as available.
    pub async fn is_available(&self) -> bool {
        self.check_health()
            .await
            .map(|health| health.available)
            .unwrap_or(false)
    }

    /// Start a streamed generation for `prompt`.
    ///
    /// An empty prompt fails with [`ChatError::EmptyPrompt`] without
    /// contacting the server. A non-success status fails with
    /// [`ChatError::ApiError`] before any of the body is read.
    pub async fn generate(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<ResponseStream, ChatError> {
        if prompt.is_empty() {
            return Err(ChatError::EmptyPrompt);
        }

        let url = self.config.endpoint(GENERATE_PATH);
        let request = GenerateRequest::streaming(prompt);

        tracing::debug!(url = %url, prompt_len = prompt.len(), "starting generation");

        let send = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&request)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            response = send => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChatError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        Ok(ContentStream::new(response.bytes_stream().boxed(), cancel))
    }

    /// Run one chat turn: record `input`, stream the reply into the
    /// conversation and classify it.
    ///
    /// `on_fragment` sees every piece of text as it arrives. Errors are
    /// returned only when the turn could not start (blank input, or another
    /// reply still streaming). Server failures and cancellation end up in the
    /// returned [`TurnOutcome`].
    pub async fn send_message<F>(
        &self,
        conversation: &mut Conversation,
        input: &str,
        cancel: CancellationToken,
        mut on_fragment: F,
    ) -> Result<TurnOutcome, ChatError>
    where
        F: FnMut(&str),
    {
        conversation.submit_user(input)?;

        let prompt = conversation.prompt(&self.config.prompt);
        if prompt.is_empty() {
            return Err(ChatError::EmptyPrompt);
        }

        let turn = conversation.open_assistant()?;
        let guardrails = &self.config.guardrails;

        let mut fragments = match self.generate(&prompt, cancel).await {
            Ok(fragments) => fragments,
            Err(e) if e.is_cancelled() => {
                conversation.cancel(turn, guardrails)?;
                return Ok(TurnOutcome::Cancelled { removed: true });
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation request failed");
                conversation.fail(turn)?;
                return Ok(TurnOutcome::Failed(e));
            }
        };

        loop {
            match fragments.next_fragment().await {
                Ok(Some(fragment)) => {
                    conversation.append(turn, &fragment)?;
                    on_fragment(&fragment);
                }
                Ok(None) => break,
                Err(e) if e.is_cancelled() => {
                    let kept = conversation.cancel(turn, guardrails)?;
                    tracing::debug!(removed = kept.is_none(), "generation cancelled");
                    return Ok(TurnOutcome::Cancelled {
                        removed: kept.is_none(),
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "generation stream failed");
                    conversation.fail(turn)?;
                    return Ok(TurnOutcome::Failed(e));
                }
            }
        }

        let result = conversation.finish(turn, guardrails)?;
        Ok(TurnOutcome::Completed(result))
    }
}
