//! Chat client for a locally hosted on-device language model server.
//!
//! The client turns a conversation into a prompt, streams the reply over
//! server-sent events and checks the finished reply for signs that the
//! model's safety guardrails refused or blocked it. Such exchanges are
//! flagged and left out of every later prompt, so refusal text does not bias
//! the model.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ondevice_chat::{ChatClient, Conversation, TurnOutcome};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::new()?;
//!     if !client.is_available().await {
//!         eprintln!("Start the server with: {}", ondevice_chat::SETUP_COMMAND);
//!         return Ok(());
//!     }
//!
//!     let mut conversation = Conversation::new();
//!     let outcome = client
//!         .send_message(&mut conversation, "What is 2+2?", CancellationToken::new(), |fragment| {
//!             print!("{}", fragment)
//!         })
//!         .await?;
//!
//!     match outcome {
//!         TurnOutcome::Completed(result) if result.filtered => println!("\n(filtered)"),
//!         TurnOutcome::Completed(_) => println!(),
//!         TurnOutcome::Cancelled { .. } => println!("\n(stopped)"),
//!         TurnOutcome::Failed(e) => eprintln!("\n{}", e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Custom Settings
//!
//! ```rust,no_run
//! use ondevice_chat::{AdvancedSettings, ChatClient, ChatConfig, SettingsStore};
//!
//! # fn main() -> Result<(), ondevice_chat::ChatError> {
//! let store = SettingsStore::new("settings.json");
//! let mut settings = store.load_or_default();
//! settings.enable();
//! settings.set_refusal_prefixes_from_text("I'm sorry, I\nAs an AI");
//! store.save(&settings)?;
//!
//! let client = ChatClient::with_config(
//!     ChatConfig::new()
//!         .prompt(settings.prompt_config())
//!         .guardrails(settings.guardrail_config()),
//! )?;
//! # Ok(())
//! # }
//! ```

mod client;
mod conversation;
mod error;
mod health;
mod prompt;
mod settings;
mod types;
pub mod guardrails;
pub mod stream;

pub use client::{ChatClient, ResponseStream, TurnOutcome};
pub use conversation::{Conversation, ConversationTurn, Role, TurnId};
pub use error::ChatError;
pub use guardrails::{classify, ClassificationResult, GuardrailConfig, BLOCKED_RESPONSE};
pub use health::{ConnectionState, HealthMonitor};
pub use prompt::{format_prompt, PromptConfig, DEFAULT_SYSTEM_PROMPT};
pub use settings::{AdvancedSettings, SettingsStore};
pub use stream::{ContentStream, StreamEnd};
pub use types::*;
